/// Logs a `format!` message at `level`, with the calling module as source.
///
/// ```rust
/// use mplog::{Level, Mode, log_at, logger_config};
///
/// let session = mplog::open(logger_config().no_file(), Mode::SingleProcess).unwrap();
/// log_at!(session, Level::Info, "{} workers started", 4);
/// ```
#[macro_export]
macro_rules! log_at {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log_record(
            $crate::Record::new($level, ::std::format!($($arg)+))
                .with_source(::std::module_path!())
                .with_location(::std::file!(), ::std::line!()),
        )
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::Level::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::Level::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::Level::Critical, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use mplog_core::{ConsoleTarget, SharedBuffer};

    use crate::{Mode, logger_config, open};

    #[test]
    fn test_macros_record_module_and_line() {
        let out = SharedBuffer::new();
        let session = open(
            logger_config()
                .with_console(ConsoleTarget::Buffer(out.clone()))
                .with_template("{source} {file}:{line} {level} {message}")
                .no_file(),
            Mode::SingleProcess,
        )
        .unwrap();
        let line = line!() + 1;
        crate::info!(session, "{} + {}", 1, 2);
        crate::critical!(session.logger(), "done");
        drop(session);
        assert_eq!(
            out.lines(),
            vec![
                format!("mplog::macros::tests macros.rs:{line} INFO 1 + 2"),
                format!("mplog::macros::tests macros.rs:{} CRITICAL done", line + 1),
            ]
        );
    }
}
