//! # mplog
//! Logging sessions that funnel records from many threads or processes into
//! one set of sinks (console and file), with an orderly drain on close.
//!
//! ## Usage
//! ```toml
//! // Cargo.toml
//! ...
//! [dependencies]
//! mplog = "0.1.0"
//! ```
//!
//! ```rust
//! use mplog::{Mode, logger_config};
//!
//! let session = mplog::open(logger_config().no_file(), Mode::SingleProcess).unwrap();
//! session.info("Hello, world!");
//! // the session flushes and closes its sinks when dropped
//! ```
//!
//! The `{source}` field of a record is the logger's name when logged
//! through [`Logger`] methods, and the calling module when logged through
//! the [`info!`] family of macros.
//!
//! ## Many producers, one writer
//! In multi-process mode records are queued to a single consumer thread that
//! owns the sinks. Closing the session waits until every record queued
//! before the call has been written.
//!
//! ```rust
//! use mplog::{Level, Mode, logger_config};
//!
//! let session = mplog::open(
//!     logger_config().with_name("main").no_file(),
//!     Mode::MultiProcess,
//! )
//! .unwrap();
//!
//! let handles: Vec<_> = (0..5).map(|i| {
//!     let logger = session.logger();
//!     std::thread::spawn(move || {
//!         logger.log_args(Level::Warning, "Hello from thread %d!", [i]);
//!     })
//! }).collect();
//! for h in handles { h.join().unwrap(); }
//! mplog::close(session).unwrap();
//! ```
//!
//! Producers in other processes connect over TCP:
//!
//! ```rust
//! use mplog::{Mode, logger_config};
//!
//! let session = mplog::open(logger_config().no_file(), Mode::MultiProcess).unwrap();
//! let addr = session.listen("127.0.0.1:0").unwrap();
//!
//! // typically in the child process
//! let producer = mplog::connect(logger_config().with_name("child"), addr).unwrap();
//! mplog::info!(producer, "child {} ready", std::process::id());
//! drop(producer);
//! ```
//!
//! ## Logging to files
//! The log file is opened in append mode on the first write. Without an
//! explicit path it is named after the time the session opened.
//!
//! ```rust
//! use mplog::{Level, Mode, logger_config};
//!
//! let session = mplog::open(
//!     logger_config()
//!         .with_log_file("/tmp/mplog-app.log")
//!         .with_file_level(Level::Info)
//!         .no_stdout(), // disable console logging if needed
//!     Mode::SingleProcess,
//! )
//! .unwrap();
//!
//! session.info("Hello, world!");
//! drop(session); // ensure logs are flushed
//! assert!(std::fs::read_to_string("/tmp/mplog-app.log").unwrap().ends_with("Hello, world!\n"));
//! ```

mod config;
mod facade;
mod logger;
mod macros;
mod panic_capture;
mod session;

pub use config::{LoggerConfig, logger_config};
pub use logger::Logger;
pub use mplog_core::{
    AggregatorState, Arg, ConsoleTarget, DEFAULT_TEMPLATE, Encoding, EnqueueError, ErrorHandler,
    Level, LogError, Record, RecordSender, SharedBuffer,
};
pub use panic_capture::Interrupted;
pub use session::{Mode, Session, close, connect, open};
