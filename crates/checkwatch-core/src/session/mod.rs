//! Poll sessions.
//!
//! - [`machine::SessionMachine`]: the sans-IO, generation-fenced state machine
//! - [`driver::PollSession`]: runs the machine against a provider, a timer
//!   and a result sink on tokio

pub mod driver;
pub mod machine;

pub use driver::{PollSession, PollSessionBuilder};
pub use machine::{
    Directive, FetchTicket, SessionMachine, SessionPhase, SessionSnapshot, Settlement,
    StartOutcome,
};
