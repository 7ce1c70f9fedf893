//! Check model: the data shapes the aggregator and poll session operate on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, RevisionKeyError};

/// Status of a single check.
///
/// Declaration order is severity order, worst first, so the derived `Ord`
/// sorts by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Error,
    Failure,
    Killed,
    Running,
    Pending,
    Skipped,
    Success,
}

impl CheckStatus {
    /// Every status, most severe first.
    pub const ALL: [CheckStatus; 7] = [
        CheckStatus::Error,
        CheckStatus::Failure,
        CheckStatus::Killed,
        CheckStatus::Running,
        CheckStatus::Pending,
        CheckStatus::Skipped,
        CheckStatus::Success,
    ];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Error => "error",
            CheckStatus::Failure => "failure",
            CheckStatus::Killed => "killed",
            CheckStatus::Running => "running",
            CheckStatus::Pending => "pending",
            CheckStatus::Skipped => "skipped",
            CheckStatus::Success => "success",
        }
    }

    /// Parse a wire name, ignoring ASCII case.
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Anything other than `Running`/`Pending`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CheckStatus::Running | CheckStatus::Pending)
    }

    /// `Error`, `Failure` or `Killed`.
    pub fn is_failing(&self) -> bool {
        matches!(
            self,
            CheckStatus::Error | CheckStatus::Failure | CheckStatus::Killed
        )
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as reported on the wire.
///
/// Unknown values are kept verbatim instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportedStatus {
    Known(CheckStatus),
    Unrecognized(String),
}

impl From<String> for ReportedStatus {
    fn from(value: String) -> Self {
        match CheckStatus::from_wire(&value) {
            Some(status) => ReportedStatus::Known(status),
            None => ReportedStatus::Unrecognized(value),
        }
    }
}

impl From<ReportedStatus> for String {
    fn from(value: ReportedStatus) -> Self {
        match value {
            ReportedStatus::Known(status) => status.as_str().to_string(),
            ReportedStatus::Unrecognized(raw) => raw,
        }
    }
}

impl From<CheckStatus> for ReportedStatus {
    fn from(status: CheckStatus) -> Self {
        ReportedStatus::Known(status)
    }
}

/// A single CI check attached to a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Unique within the revision's check set.
    pub id: String,
    pub status: ReportedStatus,
    /// Free text; passed through untouched.
    #[serde(default)]
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Check {
    /// Build a check with a known status, stamped now.
    pub fn new(id: impl Into<String>, status: CheckStatus) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: ReportedStatus::Known(status),
            summary: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Resolve the reported status into the closed set.
    pub fn decode_status(&self) -> Result<CheckStatus, DecodeError> {
        match &self.status {
            ReportedStatus::Known(status) => Ok(*status),
            ReportedStatus::Unrecognized(raw) => Err(DecodeError {
                id: self.id.clone(),
                status: raw.clone(),
            }),
        }
    }
}

/// Provider payload for one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSet {
    #[serde(default)]
    pub checks: Vec<Check>,
}

impl CheckSet {
    pub fn new(checks: Vec<Check>) -> Self {
        Self { checks }
    }
}

/// Identity of the source state whose checks are polled, e.g. `org/app@3f2a9c1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionKey {
    pub repo: String,
    pub commit_sha: String,
}

impl RevisionKey {
    pub fn new(repo: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            commit_sha: commit_sha.into(),
        }
    }
}

impl fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repo, self.commit_sha)
    }
}

impl FromStr for RevisionKey {
    type Err = RevisionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RevisionKeyError {
            input: s.to_string(),
        };
        let (repo, sha) = s.rsplit_once('@').ok_or_else(invalid)?;
        let (repo, sha) = (repo.trim(), sha.trim());
        if repo.is_empty() || sha.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(repo, sha))
    }
}
