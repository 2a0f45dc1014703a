//! Bridge from the `log` crate facade into a session.
//!
//! The facade accepts one logger per process, so the bridge is installed
//! once and forwards to whichever session is attached at the time.

use std::sync::{LazyLock, PoisonError, RwLock};

use log::{LevelFilter, Log};
use mplog_core::{LogError, Record};

use crate::logger::Logger;

static ATTACHED: RwLock<Option<Logger>> = RwLock::new(None);

static INSTALLED: LazyLock<bool> = LazyLock::new(|| {
    let installed = log::set_logger(&Bridge).is_ok();
    if installed {
        log::set_max_level(LevelFilter::Trace);
    }
    installed
});

struct Bridge;

impl Log for Bridge {
    fn enabled(&self, _: &log::Metadata) -> bool {
        attached().is_some()
    }

    fn log(&self, record: &log::Record) {
        if let Some(logger) = attached() {
            Log::log(&logger, record);
        }
    }

    fn flush(&self) {}
}

impl Log for Logger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        !self.is_closed()
    }

    fn log(&self, record: &log::Record) {
        self.log_record(from_facade(record));
    }

    fn flush(&self) {}
}

fn attached() -> Option<Logger> {
    ATTACHED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn from_facade(record: &log::Record) -> Record {
    Record::new(record.level().into(), record.args().to_string())
        .with_source(record.target())
        .with_location(
            record.file().unwrap_or("<unknown>"),
            record.line().unwrap_or(0),
        )
}

/// Keeps a session attached to the facade; detaches on drop.
pub(crate) struct FacadeAttachment(());

/// Makes `logger` the target of `log::info!` and friends.
///
/// Fails when another session is attached, or when a different `log`
/// implementation was installed first.
pub(crate) fn attach(logger: &Logger) -> Result<FacadeAttachment, LogError> {
    if !*INSTALLED {
        return Err(LogError::DuplicateAttachment("the `log` facade".into()));
    }
    let mut slot = ATTACHED.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(LogError::DuplicateAttachment("the `log` facade".into()));
    }
    *slot = Some(logger.clone());
    Ok(FacadeAttachment(()))
}

impl Drop for FacadeAttachment {
    fn drop(&mut self) {
        *ATTACHED.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use log::Level as FacadeLevel;
    use mplog_core::{Dispatcher, Encoding, ErrorHandler, Formatter, Level, SharedBuffer, Sink};

    use super::*;
    use crate::logger::Route;

    #[test]
    fn test_logger_implements_log() {
        let out = SharedBuffer::new();
        let sink = Sink::new(
            "buffer",
            Level::Trace,
            Formatter::new("{source} {file}:{line} {level} {message}").unwrap(),
            Encoding::Utf8,
            out.clone(),
            ErrorHandler::ignore(),
        );
        let logger = Logger::new(
            None,
            Route::Direct(Mutex::new(Dispatcher::new(vec![sink], ErrorHandler::ignore()))),
            ErrorHandler::ignore(),
        );
        Log::log(
            &logger,
            &log::Record::builder()
                .level(FacadeLevel::Warn)
                .target("deps::pool")
                .file(Some("src/pool.rs"))
                .line(Some(12))
                .args(format_args!("{} idle", 3))
                .build(),
        );
        assert!(Log::enabled(&logger, &log::Metadata::builder().build()));
        assert_eq!(out.lines(), vec!["deps::pool pool.rs:12 WARNING 3 idle"]);
    }
}
