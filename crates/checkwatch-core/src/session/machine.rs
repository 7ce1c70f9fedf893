//! Generation-fenced poll state machine, free of I/O and timers.
//!
//! The machine owns the session record. Every fetch is issued under a
//! [`FetchTicket`] carrying the generation it was started for; a ticket whose
//! generation is no longer current settles as [`Settlement::Discarded`] and
//! has no effect. Last started generation wins, not last completed.

use std::time::Duration;

use serde::Serialize;

use crate::aggregate::{aggregate, AggregationResult};
use crate::config::PollConfig;
use crate::error::FetchError;
use crate::model::{CheckSet, RevisionKey};
use crate::sink::Origin;

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Never started.
    Idle,
    /// A fetch is in flight.
    Polling,
    /// Waiting for the timer before the next fetch.
    Waiting,
    /// Every check reached a terminal status.
    Complete,
    /// Stopped by the consumer.
    Cancelled,
    /// The retry policy gave up after consecutive fetch failures.
    Exhausted,
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Polling | SessionPhase::Waiting)
    }
}

/// Permission to fetch once under a specific generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub revision: RevisionKey,
    pub generation: u64,
}

impl FetchTicket {
    pub fn origin(&self) -> Origin {
        Origin {
            revision: self.revision.clone(),
            generation: self.generation,
        }
    }
}

/// Result of [`SessionMachine::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new generation began; the caller must fetch with `ticket`.
    Started {
        ticket: FetchTicket,
        /// Generation of the active session this start replaced.
        superseded: Option<u64>,
    },
    /// Already polling this revision; nothing new to issue.
    Coalesced { generation: u64 },
}

/// What the driver does after a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Sleep, then ask [`SessionMachine::timer_fired`] for the next ticket.
    PollAfter(Duration),
    /// The result is complete; the session is dormant.
    Finish,
    /// The retry policy is exhausted; the session is dormant.
    GiveUp,
}

/// Verdict on a settled fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The ticket belongs to a superseded generation. Publish nothing.
    Discarded {
        ticket_generation: u64,
        current_generation: u64,
    },
    Published {
        origin: Origin,
        result: AggregationResult,
        next: Directive,
    },
    Failed {
        origin: Origin,
        error: FetchError,
        consecutive_failures: u32,
        next: Directive,
    },
}

/// Point-in-time copy of the session record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub revision: Option<RevisionKey>,
    pub generation: u64,
    pub phase: SessionPhase,
    pub active: bool,
    pub last_result: Option<AggregationResult>,
    pub consecutive_failures: u32,
}

/// The session record and its transitions.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    config: PollConfig,
    revision: Option<RevisionKey>,
    generation: u64,
    phase: SessionPhase,
    last_result: Option<AggregationResult>,
    consecutive_failures: u32,
}

impl SessionMachine {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            revision: None,
            generation: 0,
            phase: SessionPhase::Idle,
            last_result: None,
            consecutive_failures: 0,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn revision(&self) -> Option<&RevisionKey> {
        self.revision.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    /// Whether `ticket` still permits a fetch: its generation is current and
    /// the session is polling.
    pub fn holds(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation && self.phase == SessionPhase::Polling
    }

    /// Begin watching `revision`.
    ///
    /// Idempotent while the same revision is actively polled. Any other case
    /// opens a new generation, superseding whatever was running.
    pub fn start(&mut self, revision: RevisionKey) -> StartOutcome {
        if self.is_active() && self.revision.as_ref() == Some(&revision) {
            return StartOutcome::Coalesced {
                generation: self.generation,
            };
        }

        let superseded = self.is_active().then_some(self.generation);
        self.generation += 1;
        self.revision = Some(revision.clone());
        self.phase = SessionPhase::Polling;
        self.last_result = None;
        self.consecutive_failures = 0;

        StartOutcome::Started {
            ticket: FetchTicket {
                revision,
                generation: self.generation,
            },
            superseded,
        }
    }

    /// Apply the outcome of the fetch issued under `ticket`.
    pub fn settle(
        &mut self,
        ticket: &FetchTicket,
        outcome: Result<CheckSet, FetchError>,
    ) -> Settlement {
        if !self.holds(ticket) {
            return Settlement::Discarded {
                ticket_generation: ticket.generation,
                current_generation: self.generation,
            };
        }

        let origin = ticket.origin();
        match outcome {
            Ok(set) => {
                let result = aggregate(&set.checks);
                self.consecutive_failures = 0;
                self.last_result = Some(result.clone());
                let next = if result.is_complete {
                    self.phase = SessionPhase::Complete;
                    Directive::Finish
                } else {
                    self.phase = SessionPhase::Waiting;
                    Directive::PollAfter(self.config.interval)
                };
                Settlement::Published {
                    origin,
                    result,
                    next,
                }
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let failures = self.consecutive_failures;
                let next = if self.config.retry.allows_retry(failures) {
                    self.phase = SessionPhase::Waiting;
                    Directive::PollAfter(
                        self.config.retry.delay_after(self.config.interval, failures),
                    )
                } else {
                    self.phase = SessionPhase::Exhausted;
                    Directive::GiveUp
                };
                Settlement::Failed {
                    origin,
                    error,
                    consecutive_failures: failures,
                    next,
                }
            }
        }
    }

    /// The wait scheduled under `generation` elapsed.
    ///
    /// Returns the ticket for the next fetch, or `None` if that generation
    /// was stopped or superseded in the meantime.
    pub fn timer_fired(&mut self, generation: u64) -> Option<FetchTicket> {
        if generation != self.generation || self.phase != SessionPhase::Waiting {
            return None;
        }
        let revision = self.revision.clone()?;
        self.phase = SessionPhase::Polling;
        Some(FetchTicket {
            revision,
            generation,
        })
    }

    /// Fence off the current generation. Returns the new generation.
    pub fn stop(&mut self) -> u64 {
        self.generation += 1;
        if self.phase != SessionPhase::Idle {
            self.phase = SessionPhase::Cancelled;
        }
        self.generation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            revision: self.revision.clone(),
            generation: self.generation,
            phase: self.phase,
            active: self.is_active(),
            last_result: self.last_result.clone(),
            consecutive_failures: self.consecutive_failures,
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}
