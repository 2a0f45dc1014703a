use std::{borrow::Cow, fmt, str::FromStr};

use colored::{ColoredString, Colorize, Styles};
use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Severity of a record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    fn style(&self) -> ColoredString {
        match self {
            Level::Trace => "".purple(),
            Level::Debug => "".bright_black().dimmed(),
            Level::Info => "".normal(),
            Level::Warning => "".yellow(),
            Level::Error => "".red(),
            Level::Critical => "".red().bold(),
        }
    }

    /// Wraps a rendered line in this level's terminal style.
    ///
    /// The escape codes are always written; whether the destination is a
    /// terminal is decided by the caller, not by `colored`'s stdout check.
    pub fn paint(&self, line: &str) -> String {
        let style = self.style();
        let mut codes: Vec<Cow<'static, str>> = [(Styles::Bold, "1"), (Styles::Dimmed, "2")]
            .into_iter()
            .filter(|(flag, _)| style.style.contains(*flag))
            .map(|(_, code)| Cow::Borrowed(code))
            .collect();
        codes.extend(style.fgcolor.map(|color| color.to_fg_str()));
        if codes.is_empty() {
            return line.to_string();
        }
        format!("\x1b[{}m{line}\x1b[0m", codes.join(";"))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" | "fatal" => Ok(Level::Critical),
            _ => Err(LogError::UnknownLevel(s.to_string())),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}
