//! # mplog-core
//! Core of mplog: records, sinks and the multi-producer log aggregator.

mod aggregator;
mod config;
mod dispatcher;
mod error;
mod format;
mod level;
mod log_writer;
mod record;
mod sink;
mod transport;

pub use aggregator::{Aggregator, AggregatorOptions, AggregatorState, RecordSender};
pub use config::{MPLOG_CONFIG, MPLogConfig};
pub use dispatcher::Dispatcher;
pub use error::{EnqueueError, ErrorHandler, LogError};
pub use format::{DEFAULT_TEMPLATE, Encoding, Formatter};
pub use level::Level;
pub use log_writer::{ConsoleTarget, LogConsole, LogFile, LogStream, LogWriter, SharedBuffer};
pub use record::{Arg, Record, render_percent};
pub use sink::{Sink, default_file_name};
pub use transport::RemoteSender;
