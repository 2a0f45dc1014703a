use std::{
    error::Error,
    fmt::{self, Write},
    panic::Location,
    sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError},
    thread,
    time::Duration,
};

use mplog_core::{
    Aggregator, AggregatorState, Arg, Dispatcher, ErrorHandler, Level, LogError, Record,
    RecordSender, RemoteSender,
};

/// Attempts made by a panic hook to take a lock the panicking thread may hold.
const HOOK_LOCK_ATTEMPTS: usize = 100;

/// Where a session's records go.
pub(crate) enum Route {
    /// Single process: written on the calling thread.
    Direct(Mutex<Dispatcher>),
    /// Queued to the consumer thread of an aggregator.
    Queued(Aggregator),
    /// Sent to an aggregator in another process.
    Remote(Mutex<RemoteSender>),
}

struct Inner {
    name: Option<String>,
    route: Route,
    errors: ErrorHandler,
}

/// Handle issuing records into a session. Cheap to clone and shareable
/// across threads; every clone feeds the same sinks.
///
/// Records logged through the methods carry the logger's name (or `root`)
/// as `{source}`. The [`info!`](crate::info) family of macros records the
/// calling module instead.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let route = match self.inner.route {
            Route::Direct(_) => "direct",
            Route::Queued(_) => "queued",
            Route::Remote(_) => "remote",
        };
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("route", &route)
            .finish()
    }
}

impl Logger {
    pub(crate) fn new(name: Option<String>, route: Route, errors: ErrorHandler) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                route,
                errors,
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    #[track_caller]
    pub fn trace(&self, message: impl fmt::Display) {
        self.log(Level::Trace, message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl fmt::Display) {
        self.log(Level::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl fmt::Display) {
        self.log(Level::Critical, message);
    }

    /// Logs `message` with the call site as location. The source is the
    /// logger's name; use [`log_at!`](crate::log_at) for the module path.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl fmt::Display) {
        self.log_record(self.located(Record::new(level, message.to_string())));
    }

    /// Logs a percent-style template, e.g. `"%s took %d ms"`.
    ///
    /// The arguments are rendered before the record leaves this process.
    #[track_caller]
    pub fn log_args<I, A>(&self, level: Level, template: &str, args: I)
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.log_record(self.located(Record::new(level, template).with_args(args)));
    }

    /// Logs `message` at error level with the source chain of `error` as trailer.
    #[track_caller]
    pub fn exception(&self, message: impl fmt::Display, error: &(dyn Error + 'static)) {
        let record = Record::new(Level::Error, message.to_string()).with_exception(error_chain(error));
        self.log_record(self.located(record));
    }

    /// Routes a prepared record. A record without a name gets the logger's.
    pub fn log_record(&self, mut record: Record) {
        if record.name.is_none() {
            record.name = self.inner.name.clone();
        }
        match &self.inner.route {
            Route::Direct(dispatcher) => lock(dispatcher).emit(record),
            Route::Queued(aggregator) => aggregator.enqueue(record),
            Route::Remote(sender) => lock(sender).enqueue(record),
        }
    }

    /// In-process producer handle of a multi-process session.
    pub fn sender(&self) -> Option<RecordSender> {
        self.aggregator().map(Aggregator::sender)
    }

    pub fn is_closed(&self) -> bool {
        match &self.inner.route {
            Route::Direct(dispatcher) => lock(dispatcher).is_closed(),
            Route::Queued(aggregator) => matches!(
                aggregator.state(),
                AggregatorState::Draining | AggregatorState::Closed
            ),
            Route::Remote(sender) => lock(sender).is_closed(),
        }
    }

    pub(crate) fn aggregator(&self) -> Option<&Aggregator> {
        match &self.inner.route {
            Route::Queued(aggregator) => Some(aggregator),
            _ => None,
        }
    }

    pub(crate) fn errors(&self) -> &ErrorHandler {
        &self.inner.errors
    }

    pub(crate) fn shutdown(&self) -> Result<(), LogError> {
        match &self.inner.route {
            Route::Direct(dispatcher) => {
                lock(dispatcher).close();
                Ok(())
            }
            Route::Queued(aggregator) => aggregator.close(),
            Route::Remote(sender) => lock(sender).close(),
        }
    }

    /// Emits from inside a panic hook, where the panicking thread may
    /// already hold the route's lock.
    pub(crate) fn emit_from_hook(&self, mut record: Record) {
        if record.name.is_none() {
            record.name = self.inner.name.clone();
        }
        match &self.inner.route {
            Route::Direct(dispatcher) => match lock_from_hook(dispatcher) {
                Some(mut dispatcher) => dispatcher.emit(record),
                None => self.report_busy(),
            },
            Route::Queued(aggregator) => aggregator.enqueue(record),
            Route::Remote(sender) => match lock_from_hook(sender) {
                Some(mut sender) => sender.enqueue(record),
                None => self.report_busy(),
            },
        }
    }

    pub(crate) fn shutdown_from_hook(&self) -> Result<(), LogError> {
        match &self.inner.route {
            Route::Direct(dispatcher) => {
                if let Some(mut dispatcher) = lock_from_hook(dispatcher) {
                    dispatcher.close();
                }
                Ok(())
            }
            Route::Queued(aggregator) => aggregator.close(),
            Route::Remote(sender) => match lock_from_hook(sender) {
                Some(mut sender) => sender.close(),
                None => Ok(()),
            },
        }
    }

    fn report_busy(&self) {
        self.inner.errors.report(&LogError::Unsupported(
            "logging from a panic hook while the sinks are busy",
        ));
    }

    #[track_caller]
    fn located(&self, record: Record) -> Record {
        let location = Location::caller();
        record
            .with_location(location.file(), location.line())
            .with_source(self.inner.name.as_deref().unwrap_or("root"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_from_hook<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    for _ in 0..HOOK_LOCK_ATTEMPTS {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => thread::sleep(Duration::from_millis(1)),
        }
    }
    None
}

/// `Error: ..` followed by one `Caused by: ..` line per source.
pub(crate) fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut text = format!("Error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(text, "\nCaused by: {cause}");
        source = cause.source();
    }
    text
}
