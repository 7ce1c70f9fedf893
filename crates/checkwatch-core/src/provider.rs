//! Injectable collaborators of the poll session: where checks come from and
//! how the session waits between polls.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::{CheckSet, RevisionKey};

/// Injectable data source for the checks of a revision.
///
/// Implement this to plug in a CI API client, a file, or a test stub. Calls
/// may be slow, may fail, and may return checks in any order.
#[async_trait]
pub trait CheckProvider: Send + Sync {
    async fn fetch_checks(&self, revision: &RevisionKey) -> Result<CheckSet, FetchError>;
}

/// Waits between polls.
#[async_trait]
pub trait Timer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Timer`] backed by `tokio::time::sleep`; honours paused test time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
