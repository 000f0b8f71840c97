use std::time::Duration;

use log::debug;
use reqwest::{Client, RequestBuilder};

use crate::error::{SchedulerError, Result};

const DEFAULT_EXPECTED: &[u16] = &[200];

/// Sends prepared requests and checks their status against an allow-list.
///
/// There is no retry at this layer: a transport failure or an unexpected
/// status is returned to the caller as is.
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    /// Creates an executor whose connect and read deadlines are both `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Executes `request` and returns the response body as text.
    ///
    /// `expected` lists the acceptable status codes in the order they are
    /// reported on mismatch; an empty slice means `200` only.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::Transport`] when sending or reading the body fails
    /// - [`SchedulerError::UnexpectedStatus`] when the status is not in `expected`
    pub async fn execute(&self, request: RequestBuilder, expected: &[u16]) -> Result<String> {
        let expected = if expected.is_empty() {
            DEFAULT_EXPECTED
        } else {
            expected
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        debug!("{} -> {status}", response.url().path());

        let body = response.text().await?;

        if !expected.contains(&status) {
            return Err(SchedulerError::UnexpectedStatus {
                expected: expected.to_vec(),
                actual: status,
                body,
            });
        }

        Ok(body)
    }
}
