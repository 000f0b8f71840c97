mod client;
mod discovery;
mod http;
mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::TravisClient;
pub use discovery::DiscoveryShape;
pub use types::BuildRequestAck;

/// Operations the nightly run needs from a CI host.
///
/// Every call is scoped to the host the implementor was built for.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CiService: Send {
    /// Slugs of the owner's active repositories, in the order the host lists them.
    async fn list_active_repo_slugs(&mut self, owner: &str) -> Result<Vec<String>>;

    /// Drops the build cache of the default branch of `slug`.
    async fn delete_default_branch_cache(&mut self, slug: &str) -> Result<()>;

    /// Asks the host to build the default branch of `slug`.
    ///
    /// Succeeds only when the acknowledgement reports the build as pending.
    async fn request_default_branch_build(&mut self, slug: &str) -> Result<BuildRequestAck>;
}
