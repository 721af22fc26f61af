use async_trait::async_trait;
use crate::error::Result;
use crate::types::{Candidate, DirectoryStatus, ProbeResult};

/// DirectorySource: anything that can hand out the current mirror directory
#[async_trait]
pub trait DirectorySource: Sync + Send {
    /// Fetch and decode the directory once. No retry.
    async fn fetch_directory(&self) -> Result<DirectoryStatus>;
}

/// Prober: measures one candidate
///
/// Implementations never fail: every error turns into
/// `ProbeResult::unusable`. They must be safe to call from many tasks at once.
#[async_trait]
pub trait Prober: Sync + Send {
    async fn probe(&self, candidate: Candidate) -> ProbeResult;
}
