use anyhow::Result;
use clap::Parser;
use log::info;
use std::io::Write;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::Config;
use crate::error::SchedulerError;
use crate::output::print_summary;
use crate::scheduler::{RunReport, Scheduler};
use crate::travis::TravisClient;

#[derive(Parser)]
#[command(name = "travis-scheduler")]
#[command(author, version, about = "Nightly Travis CI build trigger", long_about = None)]
pub struct Cli {
    /// Configuration file overriding the built-in targets and settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

impl Cli {
    /// Runs the nightly schedule with the GitHub token taken from `GITHUB_TOKEN`.
    pub async fn execute(&self) -> Result<()> {
        self.execute_with_token(std::env::var(GITHUB_TOKEN_VAR).ok()).await
    }

    async fn execute_with_token(&self, github_token: Option<String>) -> Result<()> {
        let token = github_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(Token::from)
            .ok_or_else(|| {
                SchedulerError::Config(
                    "Mandatory environment variable GITHUB_TOKEN is missing!".to_string(),
                )
            })?;

        let config = Config::load(self.config.as_deref())?;
        let mut report = RunReport::new();

        let result = run_targets(&config, &token, &mut report, std::io::stdout()).await;
        print_summary(&report, config.failure_threshold);
        result?;

        Ok(())
    }
}

/// Runs every configured target in order, stopping at the first failure, and
/// writes `Done` to `out` once all of them succeeded.
///
/// Consecutive targets on the same host share one client, and therefore one
/// session token.
async fn run_targets<W: Write>(
    config: &Config,
    token: &Token,
    report: &mut RunReport,
    out: W,
) -> std::result::Result<(), SchedulerError> {
    let mut scheduler = Scheduler::new(out, config.pacing(), config.failure_threshold);
    let mut current: Option<TravisClient> = None;

    for target in &config.targets {
        let client = match current.take() {
            Some(client) if client.serves(&target.endpoint, target.discovery) => client,
            _ => {
                info!("Connecting to {}", target.endpoint);
                TravisClient::new(
                    &target.endpoint,
                    target.discovery,
                    token.clone(),
                    config.timeout(),
                )?
            }
        };
        let client = current.insert(client);

        scheduler
            .schedule_owner(client, &target.endpoint, &target.owner, report)
            .await?;
    }

    scheduler.finish()
}
