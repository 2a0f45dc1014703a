use std::{
    mem,
    net::{SocketAddr, ToSocketAddrs},
    ops::Deref,
    sync::{Mutex, PoisonError},
};

use mplog_core::{Aggregator, Dispatcher, LogError, RecordSender, RemoteSender};

use crate::{
    config::LoggerConfig,
    facade::{self, FacadeAttachment},
    logger::{Logger, Route},
    panic_capture::{self, PanicCapture},
};

/// How records travel from the logging call to the sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Written synchronously on the calling thread.
    #[default]
    SingleProcess,
    /// Queued to one consumer thread that owns the sinks. Other processes
    /// join through [`Session::listen`] and [`connect`].
    MultiProcess,
}

/// Process-wide hooks held by a session.
#[derive(Default)]
struct Hooks {
    facade: Option<FacadeAttachment>,
    panic: Option<PanicCapture>,
}

/// An open logging session.
///
/// Dereferences to its [`Logger`]. The session closes when dropped, so
/// queued records are written on every exit path, unwinding included.
#[must_use = "the session closes when dropped. Do \"let session = mplog::open(..)?;\""]
pub struct Session {
    logger: Logger,
    hooks: Mutex<Hooks>,
}

impl Session {
    fn attach(logger: Logger, config: &LoggerConfig) -> Result<Self, LogError> {
        let mut hooks = Hooks::default();
        if config.capture_warnings {
            hooks.facade = Some(facade::attach(&logger)?);
        }
        if config.capture_exceptions {
            hooks.panic = Some(panic_capture::install(&logger)?);
        }
        Ok(Self {
            logger,
            hooks: Mutex::new(hooks),
        })
    }

    /// A handle sharing this session's sinks.
    pub fn logger(&self) -> Logger {
        self.logger.clone()
    }

    /// In-process producer handle; `None` unless the session is multi-process.
    pub fn sender(&self) -> Option<RecordSender> {
        self.logger.sender()
    }

    /// Accepts records from producer processes on `addr` until the session closes.
    pub fn listen<A: ToSocketAddrs>(&self, addr: A) -> Result<SocketAddr, LogError> {
        match self.logger.aggregator() {
            Some(aggregator) => aggregator.listen(addr),
            None => Err(LogError::Unsupported("accepting producer connections")),
        }
    }

    /// Detaches the hooks, then drains and closes the sinks. Calling it
    /// again does nothing.
    pub fn close(&self) -> Result<(), LogError> {
        let hooks = mem::take(&mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner));
        drop(hooks);
        self.logger.shutdown()
    }
}

impl Deref for Session {
    type Target = Logger;

    fn deref(&self) -> &Self::Target {
        &self.logger
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            self.logger.errors().report(&err);
        }
    }
}

/// Opens a session writing to the sinks described by `config`.
pub fn open(config: LoggerConfig, mode: Mode) -> Result<Session, LogError> {
    let sinks = config.build_sinks()?;
    let errors = config.error_handler.clone();
    let route = match mode {
        Mode::SingleProcess => Route::Direct(Mutex::new(Dispatcher::new(sinks, errors.clone()))),
        Mode::MultiProcess => Route::Queued(Aggregator::spawn(sinks, config.aggregator_options())?),
    };
    Session::attach(Logger::new(config.name.clone(), route, errors), &config)
}

/// Opens a producer session in this process feeding the aggregator
/// listening on `addr`. The config's sinks are not used.
pub fn connect<A: ToSocketAddrs>(config: LoggerConfig, addr: A) -> Result<Session, LogError> {
    let errors = config.error_handler.clone();
    let sender = RemoteSender::connect(addr, errors.clone())?;
    let route = Route::Remote(Mutex::new(sender));
    Session::attach(Logger::new(config.name.clone(), route, errors), &config)
}

/// Closes `session`, returning the drain error if any.
pub fn close(session: Session) -> Result<(), LogError> {
    session.close()
}
