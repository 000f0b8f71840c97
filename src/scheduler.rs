use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::{SchedulerError, Result};
use crate::output::PacingProgress;
use crate::travis::CiService;

/// Build submissions of one owner pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerRunStats {
    pub endpoint: String,
    pub owner: String,
    pub attempted: usize,
    /// Slugs whose build request was rejected
    pub failed_slugs: Vec<String>,
}

impl OwnerRunStats {
    pub fn failed(&self) -> usize {
        self.failed_slugs.len()
    }

    /// Share of attempted submissions that failed, `0.0` when nothing was attempted.
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_ratio(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.failed() as f64 / self.attempted as f64
    }
}

/// Outcome of every owner pass that ran to completion.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub owners: Vec<OwnerRunStats>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            owners: Vec::new(),
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives owner passes: one cache deletion and one build request per active
/// repository, spaced out by `pacing`.
///
/// Progress lines go to `out`, which is stdout outside of tests.
pub struct Scheduler<W: Write> {
    out: W,
    pacing: Duration,
    failure_threshold: f64,
}

impl<W: Write> Scheduler<W> {
    pub fn new(out: W, pacing: Duration, failure_threshold: f64) -> Self {
        Self {
            out,
            pacing,
            failure_threshold,
        }
    }

    /// Writes the end-of-run marker.
    pub fn finish(&mut self) -> Result<()> {
        writeln!(self.out, "Done")?;
        Ok(())
    }

    /// Requests a build of the default branch of every active repository of `owner`.
    ///
    /// Rejected build requests are counted and the pass goes on; any other
    /// error, including a failed cache deletion, aborts the pass.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TooManyFailures`] once all repositories were
    /// processed if the failure ratio reached the threshold. The stats of the
    /// pass are carried in `report` either way.
    pub async fn schedule_owner<C>(
        &mut self,
        client: &mut C,
        endpoint: &str,
        owner: &str,
        report: &mut RunReport,
    ) -> Result<()>
    where
        C: CiService + ?Sized,
    {
        info!("Scheduling builds for {owner} on {endpoint}");

        let slugs = client.list_active_repo_slugs(owner).await?;
        let mut stats = OwnerRunStats {
            endpoint: endpoint.to_string(),
            owner: owner.to_string(),
            ..OwnerRunStats::default()
        };

        for slug in &slugs {
            writeln!(self.out, "Launching the build of: {slug}")?;

            client.delete_default_branch_cache(slug).await?;

            stats.attempted += 1;
            match client.request_default_branch_build(slug).await {
                Ok(_) => {}
                Err(err) if err.is_build_rejection() => {
                    writeln!(self.out, "  - FAILED! {err}")?;
                    warn!("Build request for {slug} failed: {err}");
                    stats.failed_slugs.push(slug.clone());
                }
                Err(err) => return Err(err),
            }

            self.pace().await;
        }

        let failures = stats.failed();
        let total = stats.attempted;
        let ratio = stats.failure_ratio();
        report.owners.push(stats);

        if total > 0 && ratio >= self.failure_threshold {
            return Err(SchedulerError::TooManyFailures {
                owner: owner.to_string(),
                failures,
                total,
            });
        }

        info!("Scheduled {total} builds for {owner} with {failures} failures");
        Ok(())
    }

    async fn pace(&self) {
        if self.pacing.is_zero() {
            return;
        }
        let progress = PacingProgress::start(self.pacing);
        tokio::time::sleep(self.pacing).await;
        progress.finish();
    }
}
