use serde::{Deserialize, Serialize};

/// Tag carried by a build request acknowledgement once the build is queued.
pub const PENDING: &str = "pending";

/// Body of `POST /auth/github`.
#[derive(Debug, Serialize)]
pub struct GithubTokenExchange<'a> {
    pub github_token: &'a str,
}

/// Response of `POST /auth/github`.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Repository as listed by the legacy `/repos` endpoint.
///
/// Activeness is inferred: a repository that never built has a null
/// `last_build_id`.
#[derive(Debug, Deserialize)]
pub struct LegacyRepository {
    pub slug: String,
    #[serde(default)]
    pub last_build_id: Option<u64>,
}

/// Response of `GET /v3/owner/<owner>`.
#[derive(Debug, Deserialize)]
pub struct V3Owner {
    #[serde(default)]
    pub repositories: Vec<V3Repository>,
}

/// Repository as embedded in a v3 owner response.
#[derive(Debug, Deserialize)]
pub struct V3Repository {
    pub slug: String,
    #[serde(default)]
    pub active: bool,
}

/// Body of `POST /repo/<slug>/requests`.
#[derive(Debug, Serialize)]
pub struct BuildRequestBody<'a> {
    pub request: BuildRequestParams<'a>,
}

#[derive(Debug, Serialize)]
pub struct BuildRequestParams<'a> {
    pub branch: &'a str,
    pub message: &'a str,
}

/// Immediate answer of the CI host to a build submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildRequestAck {
    #[serde(rename = "@type")]
    pub kind: String,
}

impl BuildRequestAck {
    pub fn is_pending(&self) -> bool {
        self.kind == PENDING
    }
}
