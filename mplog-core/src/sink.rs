use std::{io, path::PathBuf};

use chrono::{DateTime, Local};

use crate::{
    error::{ErrorHandler, LogError},
    format::{Encoding, Formatter},
    level::Level,
    log_writer::{ConsoleTarget, LogConsole, LogFile, LogWriter},
    record::Record,
};

/// File name used when no log file is configured, e.g. `2024-03-09_14-05-06.log`.
pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// A leveled output destination.
///
/// Write failures are reported to the sink's [`ErrorHandler`] and never
/// propagate, so one broken sink cannot starve the others.
pub struct Sink {
    name: String,
    threshold: Level,
    formatter: Formatter,
    encoding: Encoding,
    writer: Box<dyn LogWriter>,
    errors: ErrorHandler,
    closed: bool,
}

impl Sink {
    pub fn new<W: LogWriter + 'static>(
        name: impl Into<String>,
        threshold: Level,
        formatter: Formatter,
        encoding: Encoding,
        writer: W,
        errors: ErrorHandler,
    ) -> Self {
        Self {
            name: name.into(),
            threshold,
            formatter,
            encoding,
            writer: Box::new(writer),
            errors,
            closed: false,
        }
    }

    pub fn console(
        target: ConsoleTarget,
        threshold: Level,
        formatter: Formatter,
        encoding: Encoding,
        errors: ErrorHandler,
    ) -> Self {
        Self::new(
            "console",
            threshold,
            formatter,
            encoding,
            LogConsole::new(target),
            errors,
        )
    }

    /// File sink; the file is only created when the first line is written.
    /// Lines written to files are never colored.
    pub fn file(
        path: impl Into<PathBuf>,
        threshold: Level,
        formatter: Formatter,
        encoding: Encoding,
        errors: ErrorHandler,
    ) -> Self {
        let path: PathBuf = path.into();
        let file = LogFile::new(path);
        Self::new(
            file.path().display().to_string(),
            threshold,
            formatter.with_colors(false),
            encoding,
            file,
            errors,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }

    pub fn admits(&self, level: Level) -> bool {
        level >= self.threshold
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn write(&mut self, record: &Record) {
        if self.closed || !self.admits(record.level) {
            return;
        }
        if let Err(source) = self.try_write(record) {
            self.report(LogError::SinkWrite {
                sink: self.name.clone(),
                source,
            });
        }
    }

    fn try_write(&mut self, record: &Record) -> io::Result<()> {
        let line = self.formatter.format(record);
        let bytes = self
            .encoding
            .encode(&line)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        self.writer.write_line(&bytes)
    }

    pub fn flush(&mut self) {
        if self.closed {
            return;
        }
        if let Err(source) = self.writer.flush() {
            self.report(LogError::SinkWrite {
                sink: self.name.clone(),
                source,
            });
        }
    }

    /// Flushes and releases the destination. Only the first call does anything.
    pub fn close(&mut self) -> Result<(), LogError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.close().map_err(|source| LogError::SinkClose {
            sink: self.name.clone(),
            source,
        })
    }

    fn report(&self, error: LogError) {
        self.errors.report(&error);
    }
}

/// Closes every sink in order, reporting failures without stopping.
pub(crate) fn close_all(sinks: &mut [Sink], errors: &ErrorHandler) {
    for sink in sinks {
        if let Err(err) = sink.close() {
            errors.report(&err);
        }
    }
}
