//! Error types for check decoding, fetching, and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A check reported a status outside the closed set of known statuses.
///
/// Never fatal: the aggregator counts the check under `unknown` and hands the
/// error back so the caller can surface a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("check '{id}' reported unrecognized status '{status}'")]
pub struct DecodeError {
    pub id: String,
    pub status: String,
}

/// Failure to obtain the check list for a revision.
///
/// Treated as transient by the poll session: it is published to the sink and
/// retried according to the configured [`RetryPolicy`](crate::RetryPolicy).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The backend could not be reached.
    #[error("check provider unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("check fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a payload that could not be decoded.
    #[error("malformed check payload: {0}")]
    Malformed(String),

    /// Any other provider-specific failure.
    #[error("check provider error: {0}")]
    Provider(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

/// Invalid or unreadable poll configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A revision key string was not of the form `repo@sha`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid revision key '{input}': expected <repo>@<commit-sha>")]
pub struct RevisionKeyError {
    pub input: String,
}
