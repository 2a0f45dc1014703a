use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Local;
use mplog_core::{
    AggregatorOptions, ConsoleTarget, DEFAULT_TEMPLATE, Encoding, ErrorHandler, Formatter, Level,
    LogError, Sink, default_file_name,
};

/// Settings of a logging session, consumed by [`open`](crate::open).
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Name stamped on every record; `None` logs as `root`.
    pub name: Option<String>,
    /// Line template, see [`Formatter`].
    pub template: String,
    /// Color console lines by level when the console is a terminal.
    pub colored: bool,
    pub encoding: Encoding,
    /// Turn panics into a critical record while the session is open.
    pub capture_exceptions: bool,
    /// Route records of the `log` crate facade into the session.
    pub capture_warnings: bool,
    pub console_level: Level,
    /// `None` disables console output.
    pub console: Option<ConsoleTarget>,
    pub file_level: Level,
    /// Without a path the file is named after the time the session opens.
    pub file_path: Option<PathBuf>,
    /// Base of relative file paths, the current directory when `None`.
    pub file_dir: Option<PathBuf>,
    /// `false` disables file output.
    pub file: bool,
    /// Bound of the multi-process queue; unbounded when `None`.
    pub queue_capacity: Option<usize>,
    /// How long closing may wait for queued records; see `MPLOG_DRAIN_TIMEOUT_MS`.
    pub drain_timeout: Option<Duration>,
    pub error_handler: ErrorHandler,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: None,
            template: DEFAULT_TEMPLATE.to_string(),
            colored: true,
            encoding: Encoding::Utf8,
            capture_exceptions: false,
            capture_warnings: false,
            console_level: Level::Debug,
            console: Some(ConsoleTarget::Stderr),
            file_level: Level::Debug,
            file_path: None,
            file_dir: None,
            file: true,
            queue_capacity: None,
            drain_timeout: None,
            error_handler: ErrorHandler::default(),
        }
    }
}

impl LoggerConfig {
    /// Sets the logger name.
    pub fn with_name(self, name: &str) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }
    /// Maybe sets the logger name.
    pub fn maybe_with_name(self, name: Option<&str>) -> Self {
        Self {
            name: name.map(String::from),
            ..self
        }
    }
    /// Sets the line template. It is validated when the session opens.
    pub fn with_template(self, template: &str) -> Self {
        Self {
            template: template.into(),
            ..self
        }
    }
    pub fn with_colors(self, colored: bool) -> Self {
        Self { colored, ..self }
    }
    pub fn with_encoding(self, encoding: Encoding) -> Self {
        Self { encoding, ..self }
    }
    pub fn capture_exceptions(self, yes: bool) -> Self {
        Self {
            capture_exceptions: yes,
            ..self
        }
    }
    pub fn capture_warnings(self, yes: bool) -> Self {
        Self {
            capture_warnings: yes,
            ..self
        }
    }
    pub fn with_console_level(self, console_level: Level) -> Self {
        Self {
            console_level,
            ..self
        }
    }
    pub fn with_file_level(self, file_level: Level) -> Self {
        Self { file_level, ..self }
    }
    /// Sets where console lines go.
    pub fn with_console(self, target: ConsoleTarget) -> Self {
        Self {
            console: Some(target),
            ..self
        }
    }
    /// Ignore console logging
    pub fn no_stdout(self) -> Self {
        Self {
            console: None,
            ..self
        }
    }
    /// Sets a log file.
    pub fn with_log_file<P: AsRef<Path>>(self, path: P) -> Self {
        Self {
            file_path: Some(path.as_ref().to_path_buf()),
            file: true,
            ..self
        }
    }
    /// Maybe sets a log file.
    pub fn maybe_with_log_file<P: AsRef<Path>>(self, path: Option<P>) -> Self {
        Self {
            file_path: path.map(|p| p.as_ref().to_path_buf()),
            ..self
        }
    }
    /// Sets the directory relative log files are created in.
    pub fn with_file_dir<P: AsRef<Path>>(self, dir: P) -> Self {
        Self {
            file_dir: Some(dir.as_ref().to_path_buf()),
            ..self
        }
    }
    /// Ignore file logging
    pub fn no_file(self) -> Self {
        Self {
            file: false,
            ..self
        }
    }
    pub fn with_queue_capacity(self, capacity: usize) -> Self {
        Self {
            queue_capacity: Some(capacity),
            ..self
        }
    }
    pub fn with_drain_timeout(self, timeout: Duration) -> Self {
        Self {
            drain_timeout: Some(timeout),
            ..self
        }
    }
    pub fn with_error_handler(self, error_handler: ErrorHandler) -> Self {
        Self {
            error_handler,
            ..self
        }
    }

    /// Absolute path of the session's log file.
    pub fn resolve_file_path(&self) -> Result<PathBuf, LogError> {
        let path = match &self.file_path {
            Some(path) => path.clone(),
            None => PathBuf::from(default_file_name(Local::now())),
        };
        if path.is_absolute() {
            return Ok(path);
        }
        let dir = match &self.file_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(dir.join(path))
    }

    pub(crate) fn build_sinks(&self) -> Result<Vec<Sink>, LogError> {
        let formatter = Formatter::new(&self.template)?;
        let mut sinks = Vec::with_capacity(2);
        if let Some(target) = &self.console {
            let colored = self.colored && target.is_terminal();
            sinks.push(Sink::console(
                target.clone(),
                self.console_level,
                formatter.clone().with_colors(colored),
                self.encoding,
                self.error_handler.clone(),
            ));
        }
        if self.file {
            sinks.push(Sink::file(
                self.resolve_file_path()?,
                self.file_level,
                formatter,
                self.encoding,
                self.error_handler.clone(),
            ));
        }
        Ok(sinks)
    }

    pub(crate) fn aggregator_options(&self) -> AggregatorOptions {
        let defaults = AggregatorOptions::default();
        AggregatorOptions {
            capacity: self.queue_capacity,
            drain_timeout: self.drain_timeout.or(defaults.drain_timeout),
            errors: self.error_handler.clone(),
            ..defaults
        }
    }
}

/// Returns a default LoggerConfig for configuring a session.
pub fn logger_config() -> LoggerConfig {
    LoggerConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = logger_config();
        assert_eq!(config.name, None);
        assert_eq!(config.template, DEFAULT_TEMPLATE);
        assert!(config.colored);
        assert_eq!(config.encoding, Encoding::Utf8);
        assert_eq!(config.console_level, Level::Debug);
        assert_eq!(config.file_level, Level::Debug);
        assert!(!config.capture_exceptions);
        assert!(!config.capture_warnings);
        assert_eq!(config.build_sinks().unwrap().len(), 2);
    }

    #[test]
    fn test_default_file_is_timestamped_in_cwd() {
        let path = logger_config().resolve_file_path().unwrap();
        assert_eq!(path.parent().unwrap(), std::env::current_dir().unwrap());
        let name = path.file_name().unwrap().to_str().unwrap();
        // YYYY-MM-DD_HH-MM-SS.log
        assert_eq!(name.len(), 23);
        assert!(name.ends_with(".log"));
        assert_eq!(&name[10..11], "_");
    }

    #[test]
    fn test_relative_file_path() {
        let path = logger_config()
            .with_log_file("logs/app.log")
            .resolve_file_path()
            .unwrap();
        assert_eq!(path, std::env::current_dir().unwrap().join("logs/app.log"));
    }

    #[test]
    fn test_file_dir() {
        let config = logger_config().with_file_dir("/var/log/app");
        let path = config.resolve_file_path().unwrap();
        assert_eq!(path.parent().unwrap(), Path::new("/var/log/app"));
        let path = config.with_log_file("/tmp/direct.log").resolve_file_path().unwrap();
        assert_eq!(path, Path::new("/tmp/direct.log"));
    }

    #[test]
    fn test_builder_chain() {
        let config = logger_config()
            .with_name("worker")
            .with_console_level("warning".parse().unwrap())
            .with_file_level(Level::Info)
            .with_encoding("latin-1".parse().unwrap())
            .with_queue_capacity(64)
            .with_drain_timeout(Duration::from_secs(2))
            .no_stdout();
        assert_eq!(config.name.as_deref(), Some("worker"));
        assert_eq!(config.console_level, Level::Warning);
        assert_eq!(config.encoding, Encoding::Latin1);
        let options = config.aggregator_options();
        assert_eq!(options.capacity, Some(64));
        assert_eq!(options.drain_timeout, Some(Duration::from_secs(2)));
        let sinks = config.build_sinks().unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].threshold(), Level::Info);
    }

    #[test]
    fn test_invalid_template_rejected_at_build() {
        let config = logger_config().with_template("{when} {message}");
        assert!(matches!(config.build_sinks(), Err(LogError::Template(_))));
    }

    #[test]
    fn test_no_outputs() {
        assert!(logger_config().no_stdout().no_file().build_sinks().unwrap().is_empty());
    }
}
