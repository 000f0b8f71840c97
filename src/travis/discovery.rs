use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{SchedulerError, Result};

use super::types::{LegacyRepository, V3Owner};

const V3_OWNER_INCLUDE: &str =
    "include=user.repositories,organization.repositories,repository.active";

/// How a Travis host lists the repositories of an owner.
///
/// Each client is bound to one shape when it is built; both shapes end up
/// as a plain list of active slugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryShape {
    /// `GET /repos?owner_name=<owner>&active=true`, answered with a JSON array.
    Legacy,
    /// `GET /v3/owner/<owner>?include=...`, answered with an owner object.
    V3,
}

impl DiscoveryShape {
    /// Builds the discovery URL for `owner` under `base`.
    pub fn owner_repositories_url(self, base: &Url, owner: &str) -> Result<Url> {
        match self {
            Self::Legacy => {
                let mut url = base
                    .join("repos")
                    .map_err(|e| SchedulerError::Config(format!("Invalid repos URL: {e}")))?;
                url.query_pairs_mut()
                    .append_pair("owner_name", owner)
                    .append_pair("active", "true");
                Ok(url)
            }
            Self::V3 => {
                let mut url = base.clone();
                url.path_segments_mut()
                    .map_err(|()| {
                        SchedulerError::Config(format!("Endpoint cannot be a base: {base}"))
                    })?
                    .pop_if_empty()
                    .extend(["v3", "owner", owner]);
                url.set_query(Some(V3_OWNER_INCLUDE));
                Ok(url)
            }
        }
    }

    /// Extracts the slugs of active repositories from a discovery response body.
    pub fn active_slugs(self, body: &str) -> Result<Vec<String>> {
        let slugs = match self {
            Self::Legacy => serde_json::from_str::<Vec<LegacyRepository>>(body)?
                .into_iter()
                .filter(|repo| repo.last_build_id.is_some())
                .map(|repo| repo.slug)
                .collect(),
            Self::V3 => serde_json::from_str::<V3Owner>(body)?
                .repositories
                .into_iter()
                .filter(|repo| repo.active)
                .map(|repo| repo.slug)
                .collect(),
        };

        Ok(slugs)
    }
}
