//! Async driver running a [`SessionMachine`] on the tokio runtime.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::PollConfig;
use crate::error::{ConfigError, FetchError};
use crate::metrics::SessionMetrics;
use crate::model::{CheckSet, RevisionKey};
use crate::obs;
use crate::provider::{CheckProvider, Timer, TokioTimer};
use crate::session::machine::{
    Directive, FetchTicket, SessionMachine, SessionPhase, SessionSnapshot, Settlement,
    StartOutcome,
};
use crate::sink::{NullSink, ResultSink};

/// Live view of one revision's checks, refreshed until they are all terminal.
///
/// `start` and `stop` must be called from within a tokio runtime. Dropping
/// the session stops it.
///
/// ```ignore
/// let session = PollSession::builder(provider)
///     .sink(Arc::new(CallbackSink::new().on_result(|r| println!("{}", r.summary_line()))))
///     .build()?;
/// session.start("org/app@3f2a9c1".parse()?);
/// ```
pub struct PollSession {
    shared: Arc<Shared>,
}

struct Shared {
    provider: Arc<dyn CheckProvider>,
    sink: Arc<dyn ResultSink>,
    timer: Arc<dyn Timer>,
    metrics: SessionMetrics,
    state: Mutex<State>,
}

struct State {
    machine: SessionMachine,
    task: Option<JoinHandle<()>>,
}

/// Builder for [`PollSession`].
pub struct PollSessionBuilder {
    provider: Arc<dyn CheckProvider>,
    sink: Arc<dyn ResultSink>,
    timer: Arc<dyn Timer>,
    config: PollConfig,
}

impl PollSessionBuilder {
    pub fn sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the config and build an idle session.
    pub fn build(self) -> Result<PollSession, ConfigError> {
        self.config.validate()?;
        Ok(PollSession {
            shared: Arc::new(Shared {
                provider: self.provider,
                sink: self.sink,
                timer: self.timer,
                metrics: SessionMetrics::new(),
                state: Mutex::new(State {
                    machine: SessionMachine::new(self.config),
                    task: None,
                }),
            }),
        })
    }
}

impl PollSession {
    /// Start building a session around `provider`.
    ///
    /// Defaults: [`NullSink`], [`TokioTimer`], [`PollConfig::default`].
    pub fn builder(provider: Arc<dyn CheckProvider>) -> PollSessionBuilder {
        PollSessionBuilder {
            provider,
            sink: Arc::new(NullSink),
            timer: Arc::new(TokioTimer),
            config: PollConfig::default(),
        }
    }

    /// Start watching `revision`. Returns the generation in effect.
    ///
    /// Calling again for the revision already being polled is a no-op. A
    /// different revision supersedes the current one: its pending timer is
    /// dropped, and a fetch it still has in flight settles as stale.
    pub fn start(&self, revision: RevisionKey) -> u64 {
        let mut state = self.shared.lock();
        let previous_phase = state.machine.phase();

        match state.machine.start(revision) {
            StartOutcome::Coalesced { generation } => {
                self.shared.metrics.inc_coalesced();
                if let Some(revision) = state.machine.revision() {
                    obs::emit_session_coalesced(revision, generation);
                }
                generation
            }
            StartOutcome::Started { ticket, superseded } => {
                if let Some(previous) = superseded {
                    obs::emit_session_superseded(previous, ticket.generation);
                }
                release_task(state.task.take(), previous_phase);

                let generation = ticket.generation;
                obs::emit_session_started(&ticket.revision, generation);
                let span = obs::span(&ticket.revision, generation);
                let shared = Arc::clone(&self.shared);
                state.task = Some(tokio::spawn(drive(shared, ticket).instrument(span)));
                generation
            }
        }
    }

    /// Stop watching. Effective immediately: nothing from the stopped
    /// generation is published afterwards. Returns the new generation.
    pub fn stop(&self) -> u64 {
        let mut state = self.shared.lock();
        let previous_phase = state.machine.phase();
        let generation = state.machine.stop();
        release_task(state.task.take(), previous_phase);
        if previous_phase != SessionPhase::Idle {
            obs::emit_session_stopped(generation);
            self.shared.metrics.flush();
        }
        generation
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().machine.generation()
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().machine.is_active()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().machine.snapshot()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.shared.metrics
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let previous_phase = state.machine.phase();
        if previous_phase.is_active() {
            state.machine.stop();
            release_task(state.task.take(), previous_phase);
        }
    }
}

impl fmt::Debug for PollSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSession")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl State {
    fn reap_dead_driver(&mut self) {
        let dead = self.machine.is_active()
            && self.task.as_ref().map_or(true, JoinHandle::is_finished);
        if dead {
            let generation = self.machine.stop();
            self.task = None;
            obs::emit_driver_lost(generation);
        }
    }
}

/// Drop the handle of a superseded driver task.
///
/// A task sleeping on its timer is aborted. A task with a fetch in flight is
/// left to finish; its settlement is discarded by the generation check.
fn release_task(task: Option<JoinHandle<()>>, phase: SessionPhase) {
    if let Some(task) = task {
        if phase == SessionPhase::Waiting {
            task.abort();
        }
    }
}

impl Shared {
    /// Lock the session state. A generation whose driver task has died
    /// (a panicking sink) is fenced off here, so the session reads as
    /// inactive and can be started again.
    fn lock(&self) -> MutexGuard<'_, State> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.reap_dead_driver();
        state
    }

    /// Settle a fetch and publish under the lock, so that a concurrent
    /// `stop`/`start` either happens before (and the settlement is stale) or
    /// after (and sees the publication).
    fn settle(&self, ticket: &FetchTicket, outcome: Result<CheckSet, FetchError>) -> Option<Directive> {
        let mut state = self.lock();
        match state.machine.settle(ticket, outcome) {
            Settlement::Discarded {
                ticket_generation,
                current_generation,
            } => {
                self.metrics.inc_stale_discards();
                obs::emit_stale_discard(ticket_generation, current_generation);
                None
            }
            Settlement::Published {
                origin,
                result,
                next,
            } => {
                for warning in &result.decode_errors {
                    obs::emit_decode_warning(origin.generation, warning);
                    self.sink.on_decode_warning(&origin, warning);
                }
                self.sink.on_result(&origin, &result);
                self.metrics.inc_published();
                obs::emit_poll_published(origin.generation, &result);
                if next == Directive::Finish {
                    obs::emit_session_completed(origin.generation, &result);
                    self.metrics.flush();
                }
                Some(next)
            }
            Settlement::Failed {
                origin,
                error,
                consecutive_failures,
                next,
            } => {
                self.sink.on_error(&origin, &error);
                self.metrics.inc_fetch_errors();
                let retry_in = match next {
                    Directive::PollAfter(delay) => Some(delay),
                    _ => None,
                };
                obs::emit_poll_failed(origin.generation, consecutive_failures, retry_in, &error);
                if next == Directive::GiveUp {
                    obs::emit_session_exhausted(origin.generation, consecutive_failures);
                    self.metrics.flush();
                }
                Some(next)
            }
        }
    }
}

/// Fetch, settle, sleep; repeat while the generation stays current.
async fn drive(shared: Arc<Shared>, mut ticket: FetchTicket) {
    loop {
        // Issue the fetch under the lock so a `stop` that returned first
        // always prevents it.
        let fetch = {
            let state = shared.lock();
            if !state.machine.holds(&ticket) {
                return;
            }
            shared.metrics.inc_fetches();
            let provider = Arc::clone(&shared.provider);
            let revision = ticket.revision.clone();
            tokio::spawn(
                async move { provider.fetch_checks(&revision).await }
                    .instrument(tracing::Span::current()),
            )
        };
        let outcome = match fetch.await {
            Ok(outcome) => outcome,
            Err(err) => Err(FetchError::Provider(format!("check provider task failed: {err}"))),
        };

        let delay = match shared.settle(&ticket, outcome) {
            Some(Directive::PollAfter(delay)) => delay,
            Some(Directive::Finish) | Some(Directive::GiveUp) | None => return,
        };

        shared.timer.sleep(delay).await;

        let next = shared.lock().machine.timer_fired(ticket.generation);
        match next {
            Some(next) => ticket = next,
            None => return,
        }
    }
}
