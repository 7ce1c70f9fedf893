//! Status aggregation: a list of checks to one consolidated verdict.
//!
//! [`aggregate`] is pure. It knows nothing about time, I/O or cancellation,
//! so the poll session can call it on every fetch and tests can call it on
//! literal arrays.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::model::{Check, CheckStatus};

/// Consolidated status of a revision's check set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Most severe known status present, `None` when nothing is known yet.
    pub overall_status: Option<CheckStatus>,
    /// One entry per status, zero-filled, in severity order.
    pub counts: BTreeMap<CheckStatus, usize>,
    /// Checks whose status was not recognized.
    pub unknown: usize,
    /// Every check, recognized or not.
    pub total: usize,
    /// No check is running or pending, and there is at least one check.
    pub is_complete: bool,
    /// One entry per unrecognized check, sorted by check id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decode_errors: Vec<DecodeError>,
}

impl AggregationResult {
    /// Number of checks at `status`.
    pub fn count(&self, status: CheckStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Checks in `Error`, `Failure` or `Killed`.
    pub fn failing_count(&self) -> usize {
        self.counts
            .iter()
            .filter(|(status, _)| status.is_failing())
            .map(|(_, n)| n)
            .sum()
    }

    /// Complete with nothing failing.
    pub fn is_passing(&self) -> bool {
        self.is_complete && self.failing_count() == 0
    }

    /// One-line human summary, e.g. `3 checks: 1 failure, 2 success`.
    pub fn summary_line(&self) -> String {
        if self.total == 0 {
            return "no checks reported".to_string();
        }
        let mut parts: Vec<String> = self
            .counts
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(status, n)| format!("{n} {status}"))
            .collect();
        if self.unknown > 0 {
            parts.push(format!("{} unknown", self.unknown));
        }
        let noun = if self.total == 1 { "check" } else { "checks" };
        format!("{} {}: {}", self.total, noun, parts.join(", "))
    }
}

/// Aggregate a check list into an [`AggregationResult`].
///
/// Order and timestamps never matter; only the multiset of statuses does.
pub fn aggregate(checks: &[Check]) -> AggregationResult {
    let mut counts: BTreeMap<CheckStatus, usize> =
        CheckStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    let mut decode_errors = Vec::new();

    for check in checks {
        match check.decode_status() {
            Ok(status) => *counts.entry(status).or_insert(0) += 1,
            Err(err) => decode_errors.push(err),
        }
    }

    decode_errors.sort_by(|a, b| (&a.id, &a.status).cmp(&(&b.id, &b.status)));

    // BTreeMap iterates in severity order.
    let overall_status = counts
        .iter()
        .find(|(_, n)| **n > 0)
        .map(|(status, _)| *status);

    let unknown = decode_errors.len();
    let total = counts.values().sum::<usize>() + unknown;
    let is_complete =
        total > 0 && counts[&CheckStatus::Running] == 0 && counts[&CheckStatus::Pending] == 0;

    AggregationResult {
        overall_status,
        counts,
        unknown,
        total,
        is_complete,
        decode_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReportedStatus;

    fn checks(statuses: &[CheckStatus]) -> Vec<Check> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Check::new(format!("check-{i}"), *s))
            .collect()
    }

    #[test]
    fn test_empty_set_is_never_complete() {
        let result = aggregate(&[]);
        assert_eq!(result.overall_status, None);
        assert!(!result.is_complete);
        assert_eq!(result.total, 0);
        assert_eq!(result.counts.len(), 7);
        assert!(result.counts.values().all(|n| *n == 0));
    }

    #[test]
    fn test_pending_running_success_is_running_and_incomplete() {
        let result = aggregate(&checks(&[
            CheckStatus::Pending,
            CheckStatus::Running,
            CheckStatus::Success,
        ]));
        assert_eq!(result.overall_status, Some(CheckStatus::Running));
        assert_eq!(result.count(CheckStatus::Running), 1);
        assert_eq!(result.count(CheckStatus::Pending), 1);
        assert_eq!(result.count(CheckStatus::Success), 1);
        assert_eq!(result.count(CheckStatus::Error), 0);
        assert_eq!(result.count(CheckStatus::Failure), 0);
        assert_eq!(result.count(CheckStatus::Killed), 0);
        assert_eq!(result.count(CheckStatus::Skipped), 0);
        assert!(!result.is_complete);
    }

    #[test]
    fn test_failure_with_successes_is_complete_failure() {
        let result = aggregate(&checks(&[
            CheckStatus::Failure,
            CheckStatus::Success,
            CheckStatus::Success,
        ]));
        assert_eq!(result.overall_status, Some(CheckStatus::Failure));
        assert!(result.is_complete);
        assert!(!result.is_passing());
        assert_eq!(result.failing_count(), 1);
    }

    #[test]
    fn test_skipped_and_success_pass() {
        let result = aggregate(&checks(&[CheckStatus::Skipped, CheckStatus::Success]));
        assert_eq!(result.overall_status, Some(CheckStatus::Skipped));
        assert!(result.is_passing());
    }

    #[test]
    fn test_unrecognized_status_counts_toward_total_only() {
        let mut list = checks(&[CheckStatus::Success]);
        list.push(Check {
            status: ReportedStatus::Unrecognized("queued".into()),
            ..Check::new("mystery", CheckStatus::Success)
        });

        let result = aggregate(&list);
        assert_eq!(result.total, 2);
        assert_eq!(result.unknown, 1);
        assert_eq!(result.counts.values().sum::<usize>(), 1);
        assert_eq!(result.overall_status, Some(CheckStatus::Success));
        assert_eq!(result.decode_errors.len(), 1);
        assert_eq!(result.decode_errors[0].id, "mystery");
        assert!(result.is_complete);
    }

    #[test]
    fn test_only_unrecognized_has_no_overall_status() {
        let list = vec![Check {
            status: ReportedStatus::Unrecognized("blocked".into()),
            ..Check::new("gate", CheckStatus::Pending)
        }];
        let result = aggregate(&list);
        assert_eq!(result.overall_status, None);
        assert_eq!(result.total, 1);
        // Nothing running or pending among the known statuses.
        assert!(result.is_complete);
    }

    #[test]
    fn test_summary_line_lists_nonzero_buckets_by_severity() {
        let result = aggregate(&checks(&[
            CheckStatus::Success,
            CheckStatus::Failure,
            CheckStatus::Success,
        ]));
        assert_eq!(result.summary_line(), "3 checks: 1 failure, 2 success");
        assert_eq!(aggregate(&[]).summary_line(), "no checks reported");
    }
}
