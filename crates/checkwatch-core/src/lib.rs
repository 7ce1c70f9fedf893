//! checkwatch core library
//!
//! Consolidates the asynchronous CI checks attached to a revision into one
//! pass/fail verdict and keeps that verdict live until every check is terminal:
//! - [`aggregate()`]: pure check list to [`AggregationResult`] reduction
//! - [`SessionMachine`]: generation-fenced poll state machine, no I/O
//! - [`PollSession`]: drives the machine with an injected [`CheckProvider`],
//!   [`Timer`] and [`ResultSink`]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod provider;
pub mod session;
pub mod sink;
pub mod telemetry;

pub use aggregate::{aggregate, AggregationResult};
pub use config::{PollConfig, RetryPolicy, DEFAULT_MAX_DELAY, DEFAULT_POLL_INTERVAL};
pub use error::{ConfigError, DecodeError, FetchError, RevisionKeyError};
pub use metrics::SessionMetrics;
pub use model::{Check, CheckSet, CheckStatus, ReportedStatus, RevisionKey};
pub use provider::{CheckProvider, Timer, TokioTimer};
pub use session::{
    Directive, FetchTicket, PollSession, PollSessionBuilder, SessionMachine, SessionPhase,
    SessionSnapshot, Settlement, StartOutcome,
};
pub use sink::{CallbackSink, ChannelSink, NullSink, Origin, ResultSink, SessionEvent};
pub use telemetry::{init_tracing, LogFormat};

/// checkwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
