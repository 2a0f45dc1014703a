use std::{fmt, path::Path};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{error::LogError, level::Level};

/// A pending argument of a percent-style message.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) => f.write_str(s),
            Arg::Int(i) => write!(f, "{i}"),
            Arg::Float(x) => write!(f, "{x:?}"),
            Arg::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

/// Renders `%s`, `%d`/`%i`, `%f`, `%r` and `%%` conversions.
///
/// A template without arguments is returned as is, so a literal `%` in a
/// plain message needs no escaping.
pub fn render_percent(template: &str, args: &[Arg]) -> Result<String, LogError> {
    if args.is_empty() {
        return Ok(template.to_string());
    }
    let fail = |reason: &str| LogError::Format {
        template: template.to_string(),
        reason: reason.to_string(),
    };
    let mut out = String::with_capacity(template.len() + 16 * args.len());
    let mut args = args.iter();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let conversion = chars.next().ok_or_else(|| fail("incomplete format"))?;
        if conversion == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| fail("not enough arguments for format string"))?;
        match (conversion, arg) {
            ('s', arg) => out.push_str(&arg.to_string()),
            ('d' | 'i', Arg::Int(i)) => out.push_str(&i.to_string()),
            ('d' | 'i', Arg::Float(x)) => out.push_str(&(x.trunc() as i64).to_string()),
            ('d' | 'i', Arg::Bool(b)) => out.push_str(if *b { "1" } else { "0" }),
            ('f', Arg::Float(x)) => out.push_str(&format!("{x:.6}")),
            ('f', Arg::Int(i)) => out.push_str(&format!("{:.6}", *i as f64)),
            ('r', Arg::Str(s)) => out.push_str(&format!("{s:?}")),
            ('r', arg) => out.push_str(&arg.to_string()),
            ('d' | 'i' | 'f', _) => return Err(fail("a number is required")),
            (other, _) => {
                return Err(fail(&format!("unsupported format character `{other}`")));
            }
        }
    }
    if args.next().is_some() {
        return Err(fail("not all arguments converted during formatting"));
    }
    Ok(out)
}

/// One structured log event.
///
/// Once a record leaves its producer it holds plain data only: pending
/// arguments are resolved into `message` and a failure trailer is already
/// text, so the record can be serialized for another process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub level: Level,
    /// Logger name of the session that produced the record.
    pub name: Option<String>,
    /// Module or function that issued the call.
    pub source: String,
    pub file: String,
    pub line: u32,
    pub message: String,
    #[serde(skip)]
    pub args: Vec<Arg>,
    /// Already formatted failure text appended to the message on output.
    pub exception: Option<String>,
    pub timestamp: DateTime<Local>,
    pub pid: u32,
    pub thread: Option<String>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            name: None,
            source: "unknown".into(),
            file: "<unknown>".into(),
            line: 0,
            message: message.into(),
            args: Vec::new(),
            exception: None,
            timestamp: Local::now(),
            pid: std::process::id(),
            thread: std::thread::current().name().map(String::from),
        }
    }

    pub fn with_name(self, name: Option<String>) -> Self {
        Self { name, ..self }
    }

    pub fn with_source(self, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..self
        }
    }

    pub fn with_location(self, file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            ..self
        }
    }

    pub fn with_args<I, A>(self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_exception(self, exception: impl Into<String>) -> Self {
        Self {
            exception: Some(exception.into()),
            ..self
        }
    }

    /// Renders pending arguments into the message and clears them.
    ///
    /// On a mismatch the message keeps the raw template followed by the
    /// argument list, and the error is returned for reporting.
    pub fn resolve_args(&mut self) -> Result<(), LogError> {
        if self.args.is_empty() {
            return Ok(());
        }
        let args = std::mem::take(&mut self.args);
        match render_percent(&self.message, &args) {
            Ok(message) => {
                self.message = message;
                Ok(())
            }
            Err(err) => {
                let rendered: Vec<String> = args.iter().map(Arg::to_string).collect();
                self.message = format!("{} [{}]", self.message, rendered.join(", "));
                Err(err)
            }
        }
    }

    /// Moves the failure trailer into the message body.
    pub fn fold_exception(&mut self) {
        if let Some(exception) = self.exception.take() {
            if !self.message.is_empty() && !self.message.ends_with('\n') {
                self.message.push('\n');
            }
            self.message.push_str(&exception);
        }
    }

    /// Last component of `file`.
    pub fn filename(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(self.file.as_str())
    }

    /// Serializes the record as one JSON line, without the trailing newline.
    pub fn to_wire(&self) -> Result<String, LogError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_wire(line: &str) -> Result<Self, LogError> {
        Ok(serde_json::from_str(line)?)
    }
}
