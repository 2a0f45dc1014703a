//! Turns panics into one critical record while a session is open.

use std::{
    any::Any,
    backtrace::Backtrace,
    panic::{self, PanicHookInfo},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use mplog_core::{Level, LogError, Record};

use crate::logger::Logger;

type Hook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Panic payload that is never captured, for stopping the process the way a
/// user interrupt would: `std::panic::panic_any(mplog::Interrupted)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interrupted;

static ACTIVE: Mutex<bool> = Mutex::new(false);

/// Installed capture hook; restores the previous hook on drop.
///
/// A hook that cannot be replaced because its owner dropped while
/// unwinding is disarmed instead and only forwards to the previous hook.
pub(crate) struct PanicCapture {
    previous: Arc<Hook>,
    armed: Arc<AtomicBool>,
}

pub(crate) fn install(logger: &Logger) -> Result<PanicCapture, LogError> {
    let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
    if *active {
        return Err(LogError::DuplicateAttachment("the panic hook".into()));
    }
    let previous = Arc::new(panic::take_hook());
    let chained = Arc::clone(&previous);
    let armed = Arc::new(AtomicBool::new(true));
    let logger = logger.clone();
    panic::set_hook(Box::new({
        let armed = Arc::clone(&armed);
        move |info| {
            if armed.load(Ordering::Acquire) && !info.payload().is::<Interrupted>() {
                capture(&logger, info);
            }
            (**chained)(info);
        }
    }));
    *active = true;
    Ok(PanicCapture { previous, armed })
}

impl Drop for PanicCapture {
    fn drop(&mut self) {
        self.armed.store(false, Ordering::Release);
        // set_hook may not be called while unwinding
        if !thread::panicking() {
            let previous = Arc::clone(&self.previous);
            panic::set_hook(Box::new(move |info| (**previous)(info)));
        }
        *ACTIVE.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

fn capture(logger: &Logger, info: &PanicHookInfo<'_>) {
    let current = thread::current();
    let thread_name = current.name().unwrap_or("<unnamed>");
    let (file, line) = info
        .location()
        .map_or(("<unknown>", 0), |location| (location.file(), location.line()));
    let backtrace = Backtrace::force_capture().to_string();
    logger.emit_from_hook(panic_record(
        thread_name,
        file,
        line,
        payload_text(info.payload()),
        &backtrace,
    ));
    if thread_name == "main"
        && let Err(err) = logger.shutdown_from_hook()
    {
        logger.errors().report(&err);
    }
}

fn payload_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        *text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "Box<dyn Any>"
    }
}

pub(crate) fn panic_record(
    thread_name: &str,
    file: &str,
    line: u32,
    payload: &str,
    backtrace: &str,
) -> Record {
    let mut message = format!("thread '{thread_name}' panicked at {file}:{line}:\n{payload}");
    if !backtrace.trim().is_empty() {
        message.push_str("\nstack backtrace:\n");
        message.push_str(backtrace);
    }
    let message = message.trim_end_matches('\n');
    Record::new(Level::Critical, message)
        .with_source(thread_name)
        .with_location(file, line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_record() {
        let record = panic_record(
            "main",
            "src/main.rs",
            7,
            "attempt to divide by zero",
            "   0: app::main\n             at ./src/main.rs:7:5\n",
        );
        assert_eq!(record.level, Level::Critical);
        assert_eq!(record.source, "main");
        assert_eq!(record.file, "src/main.rs");
        assert_eq!(record.line, 7);
        assert_eq!(
            record.message,
            "thread 'main' panicked at src/main.rs:7:\nattempt to divide by zero\nstack backtrace:\n   0: app::main\n             at ./src/main.rs:7:5"
        );
    }

    #[test]
    fn test_panic_record_without_backtrace() {
        let record = panic_record("worker", "lib.rs", 1, "boom\n", "");
        assert_eq!(record.message, "thread 'worker' panicked at lib.rs:1:\nboom");
    }

    #[test]
    fn test_payload_text() {
        let text: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(payload_text(&*text), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(payload_text(&*owned), "owned");
        let other: Box<dyn Any + Send> = Box::new(Interrupted);
        assert_eq!(payload_text(&*other), "Box<dyn Any>");
    }
}
