use std::{
    fmt,
    io::{self, Write},
    sync::Arc,
    time::Duration,
};

use thiserror::Error;

/// Why a record could not be put on the aggregator queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("queue is full")]
    QueueFull,
    #[error("consumer is no longer receiving")]
    Disconnected,
    #[error("logging session is closed")]
    Closed,
}

/// Every failure mplog can observe.
///
/// Configuration variants are returned from constructors. The others are
/// produced while records flow and are handed to an [`ErrorHandler`];
/// they never reach the code that issued the log call.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("unknown level name `{0}`")]
    UnknownLevel(String),

    #[error("unknown encoding `{0}`")]
    UnknownEncoding(String),

    #[error("invalid template: {0}")]
    Template(String),

    #[error("cannot render message `{template}`: {reason}")]
    Format { template: String, reason: String },

    #[error("cannot encode {ch:?} as {encoding}")]
    Unencodable { ch: char, encoding: &'static str },

    #[error("cannot enqueue record: {0}")]
    Enqueue(#[from] EnqueueError),

    #[error("write to sink `{sink}` failed: {source}")]
    SinkWrite {
        sink: String,
        #[source]
        source: io::Error,
    },

    #[error("closing sink `{sink}` failed: {source}")]
    SinkClose {
        sink: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} is already attached to another session")]
    DuplicateAttachment(String),

    #[error("consumer did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("consumer thread panicked")]
    ConsumerPanicked,

    #[error("consumer cancelled with {0} records still queued")]
    Cancelled(usize),

    #[error("invalid wire record: {0}")]
    Wire(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    #[error("{0} is not supported by this session")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Callback receiving the errors raised while records are processed.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(&LogError) + Send + Sync>);

impl ErrorHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&LogError) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Discards every error.
    pub fn ignore() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, error: &LogError) {
        (self.0)(error)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(report_to_stderr)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler(..)")
    }
}

fn report_to_stderr(error: &LogError) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "--- Logging error ---\n{error}");
}
