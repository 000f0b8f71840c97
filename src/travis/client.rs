use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use url::Url;

use crate::auth::Token;
use crate::error::{SchedulerError, Result};

use super::discovery::DiscoveryShape;
use super::http::HttpExecutor;
use super::types::{
    AccessTokenResponse, BuildRequestAck, BuildRequestBody, BuildRequestParams,
    GithubTokenExchange,
};
use super::CiService;

const USER_AGENT: &str = concat!("travis-scheduler/", env!("CARGO_PKG_VERSION"));
const JSON_UTF8: &str = "application/json; charset=utf-8";
const DEFAULT_BRANCH: &str = "master";
const BUILD_MESSAGE: &str = "Nightly build launched from the travis-scheduler job on AppVeyor";

/// Client for one Travis CI host.
///
/// The session token is obtained lazily on the first operation that needs it
/// and kept for the lifetime of the client. It is only ever sent to the host
/// that issued it.
pub struct TravisClient {
    http: HttpExecutor,
    endpoint: Url,
    discovery: DiscoveryShape,
    github_token: Token,
    session_token: Option<Token>,
}

impl TravisClient {
    /// Creates a client for `endpoint` (e.g. <https://api.travis-ci.com>).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint is not an absolute URL or
    /// the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        discovery: DiscoveryShape,
        github_token: Token,
        timeout: Duration,
    ) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| SchedulerError::Config(format!("Invalid endpoint URL: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(SchedulerError::Config(format!(
                "Endpoint cannot be a base: {endpoint}"
            )));
        }
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            http: HttpExecutor::new(USER_AGENT, timeout)?,
            endpoint,
            discovery,
            github_token,
            session_token: None,
        })
    }

    /// Whether this client talks to `endpoint` with the given discovery shape.
    pub fn serves(&self, endpoint: &str, discovery: DiscoveryShape) -> bool {
        self.discovery == discovery
            && self.endpoint.as_str().trim_end_matches('/') == endpoint.trim_end_matches('/')
    }

    /// Exchanges the GitHub token for a session token on this host.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, on any status other than 200, or when the
    /// response carries no `access_token`.
    pub async fn authenticate(&mut self) -> Result<()> {
        info!("Authenticating against {}", self.endpoint);

        let body = serde_json::to_string(&GithubTokenExchange {
            github_token: self.github_token.as_str(),
        })?;
        let request = self
            .request(Method::POST, self.url("auth/github")?)?
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body);

        let response = self.http.execute(request, &[200]).await?;
        let AccessTokenResponse { access_token } = serde_json::from_str(&response)?;
        self.session_token = Some(Token::from(access_token));

        Ok(())
    }

    async fn ensure_authenticated(&mut self) -> Result<()> {
        if self.session_token.is_none() {
            self.authenticate().await?;
        }
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| SchedulerError::Config(format!("Invalid API URL for {path}: {e}")))
    }

    /// URL of the build requests collection; the slug is a single, encoded segment.
    fn build_requests_url(&self, slug: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                SchedulerError::Config(format!("Endpoint cannot be a base: {}", self.endpoint))
            })?
            .pop_if_empty()
            .push("repo")
            .push(slug)
            .push("requests");
        Ok(url)
    }

    /// Helper to build requests carrying the common headers
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let request = self
            .http
            .client()
            .request(method, url)
            .header(ACCEPT, "application/json");

        match &self.session_token {
            Some(token) => Ok(request.header(AUTHORIZATION, authorization_value(token)?)),
            None => Ok(request),
        }
    }
}

fn authorization_value(token: &Token) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("token {}", token.as_str()))
        .map_err(|_| SchedulerError::Config("Session token is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait]
impl CiService for TravisClient {
    async fn list_active_repo_slugs(&mut self, owner: &str) -> Result<Vec<String>> {
        self.ensure_authenticated().await?;

        let url = self.discovery.owner_repositories_url(&self.endpoint, owner)?;
        let response = self
            .http
            .execute(self.request(Method::GET, url)?, &[200])
            .await?;

        let slugs = self.discovery.active_slugs(&response)?;
        info!("Found {} active repositories for {owner}", slugs.len());

        Ok(slugs)
    }

    async fn delete_default_branch_cache(&mut self, slug: &str) -> Result<()> {
        self.ensure_authenticated().await?;

        let mut url = self.url(&format!("repos/{slug}/caches"))?;
        url.query_pairs_mut().append_pair("branch", DEFAULT_BRANCH);

        self.http
            .execute(self.request(Method::DELETE, url)?, &[200])
            .await?;
        debug!("Deleted {DEFAULT_BRANCH} cache of {slug}");

        Ok(())
    }

    async fn request_default_branch_build(&mut self, slug: &str) -> Result<BuildRequestAck> {
        self.ensure_authenticated().await?;

        let body = serde_json::to_string(&BuildRequestBody {
            request: BuildRequestParams {
                branch: DEFAULT_BRANCH,
                message: BUILD_MESSAGE,
            },
        })?;
        let request = self
            .request(Method::POST, self.build_requests_url(slug)?)?
            .header("Travis-API-Version", "3")
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body);

        let response = self.http.execute(request, &[202, 403]).await?;

        match serde_json::from_str::<BuildRequestAck>(&response) {
            Ok(ack) if ack.is_pending() => {
                debug!("Build of {slug} is pending");
                Ok(ack)
            }
            _ => Err(SchedulerError::UnexpectedOutcome { body: response }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const BUILD_BODY: &str = r#"{"request":{"branch":"master","message":"Nightly build launched from the travis-scheduler job on AppVeyor"}}"#;

    fn client(server: &Server, discovery: DiscoveryShape) -> TravisClient {
        TravisClient::new(
            &server.url(),
            discovery,
            Token::from("gh-token"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn mock_auth(server: &mut Server, access_token: &str) -> mockito::Mock {
        server
            .mock("POST", "/auth/github")
            .match_header("authorization", Matcher::Missing)
            .match_header("accept", "application/json")
            .match_header("content-type", JSON_UTF8)
            .match_body(Matcher::JsonString(r#"{"github_token":"gh-token"}"#.to_string()))
            .with_status(200)
            .with_body(format!(r#"{{"access_token":"{access_token}"}}"#))
            .expect(1)
            .create_async()
            .await
    }

    #[test]
    fn test_build_requests_url_encodes_slug() {
        let client = TravisClient::new(
            "https://api.travis-ci.com",
            DiscoveryShape::V3,
            Token::from("t"),
            Duration::from_secs(1),
        )
        .unwrap();

        let url = client.build_requests_url("a/b").unwrap();

        assert_eq!(url.path(), "/repo/a%2Fb/requests");
    }

    #[test]
    fn test_serves_same_host_only() {
        let client = TravisClient::new(
            "https://api.travis-ci.org",
            DiscoveryShape::Legacy,
            Token::from("t"),
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(client.serves("https://api.travis-ci.org", DiscoveryShape::Legacy));
        assert!(client.serves("https://api.travis-ci.org/", DiscoveryShape::Legacy));
        assert!(!client.serves("https://api.travis-ci.org", DiscoveryShape::V3));
        assert!(!client.serves("https://api.travis-ci.com", DiscoveryShape::Legacy));
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = TravisClient::new(
            "not a url",
            DiscoveryShape::Legacy,
            Token::from("t"),
            Duration::from_secs(1),
        );

        assert!(matches!(result, Err(SchedulerError::Config(_))));
    }

    #[tokio::test]
    async fn test_v3_discovery_authenticates_lazily() {
        let mut server = Server::new_async().await;
        let auth = mock_auth(&mut server, "X").await;
        let discovery = server
            .mock("GET", "/v3/owner/Acme")
            .match_query(Matcher::Exact(
                "include=user.repositories,organization.repositories,repository.active"
                    .to_string(),
            ))
            .match_header("authorization", "token X")
            .with_status(200)
            .with_body(
                r#"{"repositories":[{"slug":"Acme/a","active":true},{"slug":"Acme/b","active":false}]}"#,
            )
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);
        let slugs = client.list_active_repo_slugs("Acme").await.unwrap();

        assert_eq!(slugs, vec!["Acme/a".to_string()]);
        auth.assert_async().await;
        discovery.assert_async().await;
    }

    #[tokio::test]
    async fn test_legacy_discovery() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server, "X").await;
        let _discovery = server
            .mock("GET", "/repos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("owner_name".into(), "Acme".into()),
                Matcher::UrlEncoded("active".into(), "true".into()),
            ]))
            .match_header("authorization", "token X")
            .with_status(200)
            .with_body(
                r#"[{"slug":"Acme/a","last_build_id":42},{"slug":"Acme/b","last_build_id":null}]"#,
            )
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::Legacy);
        let slugs = client.list_active_repo_slugs("Acme").await.unwrap();

        assert_eq!(slugs, vec!["Acme/a".to_string()]);
    }

    #[tokio::test]
    async fn test_authenticates_once_across_operations() {
        let mut server = Server::new_async().await;
        let auth = mock_auth(&mut server, "session-1").await;
        let _discovery = server
            .mock("GET", "/v3/owner/Acme")
            .match_query(Matcher::Any)
            .match_header("authorization", "token session-1")
            .with_status(200)
            .with_body(r#"{"repositories":[]}"#)
            .create_async()
            .await;
        let cache = server
            .mock("DELETE", "/repos/Acme/a/caches")
            .match_query(Matcher::UrlEncoded("branch".into(), "master".into()))
            .match_header("authorization", "token session-1")
            .with_status(200)
            .with_body(r#"{"caches":[]}"#)
            .expect(2)
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);
        client.list_active_repo_slugs("Acme").await.unwrap();
        client.delete_default_branch_cache("Acme/a").await.unwrap();
        client.delete_default_branch_cache("Acme/a").await.unwrap();

        auth.assert_async().await;
        cache.assert_async().await;
    }

    #[tokio::test]
    async fn test_build_request_pending() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server, "X").await;
        let build = server
            .mock("POST", "/repo/Acme%2Fa/requests")
            .match_header("authorization", "token X")
            .match_header("travis-api-version", "3")
            .match_header("content-type", JSON_UTF8)
            .match_body(BUILD_BODY)
            .with_status(202)
            .with_body(r#"{"@type":"pending","remaining_requests":10}"#)
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);
        let ack = client.request_default_branch_build("Acme/a").await.unwrap();

        assert!(ack.is_pending());
        build.assert_async().await;
    }

    #[tokio::test]
    async fn test_build_request_forbidden_but_pending() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server, "X").await;
        let _build = server
            .mock("POST", "/repo/Acme%2Fa/requests")
            .with_status(403)
            .with_body(r#"{"@type":"pending"}"#)
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);

        assert!(client.request_default_branch_build("Acme/a").await.is_ok());
    }

    #[tokio::test]
    async fn test_build_request_forbidden_error() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server, "X").await;
        let body = r#"{"@type":"error","error_message":"quota"}"#;
        let _build = server
            .mock("POST", "/repo/Acme%2Fa/requests")
            .with_status(403)
            .with_body(body)
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);
        let err = client
            .request_default_branch_build("Acme/a")
            .await
            .unwrap_err();

        match err {
            SchedulerError::UnexpectedOutcome { body: raw } => assert_eq!(raw, body),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_request_accepted_without_pending() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server, "X").await;
        let _build = server
            .mock("POST", "/repo/Acme%2Fa/requests")
            .with_status(202)
            .with_body("not json")
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);
        let err = client
            .request_default_branch_build("Acme/a")
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::UnexpectedOutcome { .. }));
    }

    #[tokio::test]
    async fn test_build_request_unexpected_status() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server, "X").await;
        let _build = server
            .mock("POST", "/repo/Acme%2Fa/requests")
            .with_status(500)
            .with_body("down")
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);
        let err = client
            .request_default_branch_build("Acme/a")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Expected HTTP response 202, 403, actual was 500: down"
        );
    }

    #[tokio::test]
    async fn test_cache_delete_failure_is_reported_verbatim() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server, "X").await;
        let _cache = server
            .mock("DELETE", "/repos/Acme/a/caches")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::V3);
        let err = client
            .delete_default_branch_cache("Acme/a")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            r#"Expected HTTP response 200, actual was 500: {"error":"boom"}"#
        );
    }

    #[tokio::test]
    async fn test_failed_authentication_is_fatal() {
        let mut server = Server::new_async().await;
        let _auth = server
            .mock("POST", "/auth/github")
            .with_status(403)
            .with_body("bad credentials")
            .create_async()
            .await;

        let mut client = client(&server, DiscoveryShape::Legacy);
        let err = client.list_active_repo_slugs("Acme").await.unwrap_err();

        assert!(matches!(
            err,
            SchedulerError::UnexpectedStatus { actual: 403, .. }
        ));
    }
}
