use std::time::Duration;

use async_trait::async_trait;

use crate::errors::LimiterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request was counted.
    Allowed { remaining: u32 },
    /// The window is full; nothing was counted.
    Rejected { reset_in: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Per-client fixed-window counter consulted before any other intake work.
///
/// Implementations must treat compare-and-increment as one atomic step per
/// key so concurrent requests cannot both take the last slot.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Counts one request for `key` unless `limit` was already reached in
    /// the current window.
    async fn check(&self, limit: u32, key: &str) -> Result<RateDecision, LimiterError>;

    /// Short name reported by the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Reachability check used by the health endpoint.
    async fn ping(&self) -> Result<(), LimiterError> {
        Ok(())
    }
}
