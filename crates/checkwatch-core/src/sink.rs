//! Result sinks: the boundary between the poll session and its consumer.
//!
//! The session calls a sink while it holds its own lock, which is what makes
//! publications for a superseded generation impossible. A sink must therefore
//! not call back into the same session synchronously; forward through a
//! [`ChannelSink`] when the consumer needs to react with `stop`/`start`.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::aggregate::AggregationResult;
use crate::error::{DecodeError, FetchError};
use crate::model::RevisionKey;

/// Which session generation produced a publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub revision: RevisionKey,
    pub generation: u64,
}

/// Receiver of poll session output.
pub trait ResultSink: Send + Sync {
    /// A fetch succeeded and was aggregated.
    fn on_result(&self, origin: &Origin, result: &AggregationResult);

    /// A fetch failed; the previous result, if any, still stands.
    fn on_error(&self, origin: &Origin, error: &FetchError);

    /// A check carried a status outside the known set.
    fn on_decode_warning(&self, _origin: &Origin, _warning: &DecodeError) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn on_result(&self, _origin: &Origin, _result: &AggregationResult) {}
    fn on_error(&self, _origin: &Origin, _error: &FetchError) {}
}

type ResultCallback = Box<dyn Fn(&AggregationResult) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&FetchError) + Send + Sync>;
type WarningCallback = Box<dyn Fn(&DecodeError) + Send + Sync>;

/// Sink built from closures.
///
/// ```ignore
/// let sink = CallbackSink::new()
///     .on_result(|r| println!("{}", r.summary_line()))
///     .on_error(|e| eprintln!("fetch failed: {e}"));
/// ```
#[derive(Default)]
pub struct CallbackSink {
    result: Option<ResultCallback>,
    error: Option<ErrorCallback>,
    warning: Option<WarningCallback>,
}

impl CallbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_result(mut self, callback: impl Fn(&AggregationResult) + Send + Sync + 'static) -> Self {
        self.result = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(callback));
        self
    }

    pub fn on_decode_warning(
        mut self,
        callback: impl Fn(&DecodeError) + Send + Sync + 'static,
    ) -> Self {
        self.warning = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink")
            .field("on_result", &self.result.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_decode_warning", &self.warning.is_some())
            .finish()
    }
}

impl ResultSink for CallbackSink {
    fn on_result(&self, _origin: &Origin, result: &AggregationResult) {
        if let Some(callback) = &self.result {
            callback(result);
        }
    }

    fn on_error(&self, _origin: &Origin, error: &FetchError) {
        if let Some(callback) = &self.error {
            callback(error);
        }
    }

    fn on_decode_warning(&self, _origin: &Origin, warning: &DecodeError) {
        if let Some(callback) = &self.warning {
            callback(warning);
        }
    }
}

/// Event forwarded by a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Result {
        origin: Origin,
        result: AggregationResult,
    },
    Error {
        origin: Origin,
        error: FetchError,
    },
}

impl SessionEvent {
    pub fn origin(&self) -> &Origin {
        match self {
            SessionEvent::Result { origin, .. } | SessionEvent::Error { origin, .. } => origin,
        }
    }
}

/// Forwards publications onto an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn on_result(&self, origin: &Origin, result: &AggregationResult) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(SessionEvent::Result {
            origin: origin.clone(),
            result: result.clone(),
        });
    }

    fn on_error(&self, origin: &Origin, error: &FetchError) {
        let _ = self.tx.send(SessionEvent::Error {
            origin: origin.clone(),
            error: error.clone(),
        });
    }
}
