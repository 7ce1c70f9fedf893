//! Structured logging hooks for the poll session lifecycle.
//!
//! Every helper emits one `tracing` event carrying an `event` field so log
//! pipelines can filter on it, e.g. `event=poll.stale_discard`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::aggregate::AggregationResult;
use crate::error::{DecodeError, FetchError};
use crate::model::RevisionKey;

/// Span used to instrument a session's driver task.
pub fn span(revision: &RevisionKey, generation: u64) -> tracing::Span {
    tracing::info_span!("checkwatch.session", revision = %revision, generation = generation)
}

pub fn emit_session_started(revision: &RevisionKey, generation: u64) {
    info!(event = "session.started", revision = %revision, generation = generation);
}

pub fn emit_session_coalesced(revision: &RevisionKey, generation: u64) {
    debug!(event = "session.coalesced", revision = %revision, generation = generation);
}

pub fn emit_session_superseded(previous: u64, next: u64) {
    info!(event = "session.superseded", previous_generation = previous, generation = next);
}

pub fn emit_poll_published(generation: u64, result: &AggregationResult) {
    info!(
        event = "poll.published",
        generation = generation,
        overall = result.overall_status.map(|s| s.as_str()).unwrap_or("none"),
        total = result.total,
        complete = result.is_complete,
    );
}

pub fn emit_poll_failed(generation: u64, failures: u32, retry_in: Option<Duration>, error: &FetchError) {
    warn!(
        event = "poll.failed",
        generation = generation,
        consecutive_failures = failures,
        retry_in_ms = retry_in.map(|d| d.as_millis() as u64),
        error = %error,
    );
}

pub fn emit_decode_warning(generation: u64, warning: &DecodeError) {
    warn!(event = "poll.decode_warning", generation = generation, check_id = %warning.id, status = %warning.status);
}

pub fn emit_stale_discard(ticket_generation: u64, current_generation: u64) {
    debug!(
        event = "poll.stale_discard",
        ticket_generation = ticket_generation,
        current_generation = current_generation,
    );
}

pub fn emit_session_completed(generation: u64, result: &AggregationResult) {
    info!(
        event = "session.completed",
        generation = generation,
        passing = result.is_passing(),
        summary = %result.summary_line(),
    );
}

pub fn emit_session_exhausted(generation: u64, failures: u32) {
    warn!(event = "session.exhausted", generation = generation, consecutive_failures = failures);
}

pub fn emit_driver_lost(generation: u64) {
    warn!(event = "session.driver_lost", generation = generation);
}

pub fn emit_session_stopped(generation: u64) {
    info!(event = "session.stopped", generation = generation);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_span_create() {
        let span = span(&RevisionKey::new("org/app", "abc"), 3);
        let _guard = span.enter();
    }
}
