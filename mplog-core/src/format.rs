use std::{borrow::Cow, fmt::Write, str::FromStr};

use crate::{error::LogError, record::Record};

/// `[time file:line](pid) - LEVEL - message`, aligned like a classic log file.
pub const DEFAULT_TEMPLATE: &str =
    "[{time} {file:>24}:{line:>4}]({pid:>6}) - {level:<8} - {message}";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Time,
    File,
    Line,
    Pid,
    Level,
    Name,
    Source,
    Thread,
    Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    None,
    Left(usize),
    Right(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field, Align),
}

/// Renders records into lines from a template parsed once at construction.
///
/// Placeholders are `{time}`, `{file}`, `{line}`, `{pid}`, `{level}`,
/// `{name}`, `{source}`, `{thread}` and `{message}`, each optionally aligned
/// with `:<N` or `:>N`. `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    segments: Vec<Segment>,
    colored: bool,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE).expect("default template is valid")
    }
}

impl Formatter {
    pub fn new(template: &str) -> Result<Self, LogError> {
        Ok(Self {
            segments: parse_template(template)?,
            colored: false,
        })
    }

    /// Wraps each rendered line in its level's color.
    pub fn with_colors(self, colored: bool) -> Self {
        Self { colored, ..self }
    }

    pub fn format(&self, record: &Record) -> String {
        let mut line = String::with_capacity(128);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Field(field, align) => {
                    let value = field_value(*field, record);
                    let _ = match *align {
                        Align::None => write!(line, "{value}"),
                        Align::Left(width) => write!(line, "{value:<width$}"),
                        Align::Right(width) => write!(line, "{value:>width$}"),
                    };
                }
            }
        }
        if self.colored {
            record.level.paint(&line)
        } else {
            line
        }
    }
}

fn field_value(field: Field, record: &Record) -> Cow<'_, str> {
    match field {
        Field::Time => Cow::Owned(record.timestamp.format(TIME_FORMAT).to_string()),
        Field::File => Cow::Borrowed(record.filename()),
        Field::Line => Cow::Owned(record.line.to_string()),
        Field::Pid => Cow::Owned(record.pid.to_string()),
        Field::Level => Cow::Borrowed(record.level.as_str()),
        Field::Name => Cow::Borrowed(record.name.as_deref().unwrap_or("root")),
        Field::Source => Cow::Borrowed(&record.source),
        Field::Thread => Cow::Borrowed(record.thread.as_deref().unwrap_or("-")),
        Field::Message => Cow::Borrowed(&record.message),
    }
}

fn parse_template(template: &str) -> Result<Vec<Segment>, LogError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut spec = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(LogError::Template(format!(
                                "unclosed placeholder in `{template}`"
                            )));
                        }
                        Some(c) => spec.push(c),
                    }
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_placeholder(&spec)?);
            }
            '}' => {
                return Err(LogError::Template(format!(
                    "unmatched `}}` in `{template}`"
                )));
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_placeholder(spec: &str) -> Result<Segment, LogError> {
    let (name, align) = match spec.split_once(':') {
        Some((name, align)) => (name, parse_align(align)?),
        None => (spec, Align::None),
    };
    let field = match name.trim() {
        "time" => Field::Time,
        "file" => Field::File,
        "line" => Field::Line,
        "pid" => Field::Pid,
        "level" => Field::Level,
        "name" => Field::Name,
        "source" => Field::Source,
        "thread" => Field::Thread,
        "message" => Field::Message,
        other => {
            return Err(LogError::Template(format!("unknown placeholder `{other}`")));
        }
    };
    Ok(Segment::Field(field, align))
}

fn parse_align(spec: &str) -> Result<Align, LogError> {
    let (right, width) = if let Some(width) = spec.strip_prefix('>') {
        (true, width)
    } else {
        (false, spec.strip_prefix('<').unwrap_or(spec))
    };
    let width = width
        .parse::<usize>()
        .map_err(|_| LogError::Template(format!("invalid alignment `{spec}`")))?;
    Ok(if right {
        Align::Right(width)
    } else {
        Align::Left(width)
    })
}

/// Byte encoding applied to each rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin-1",
        }
    }

    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, LogError> {
        if *self == Encoding::Utf8 || text.is_ascii() {
            return Ok(Cow::Borrowed(text.as_bytes()));
        }
        let unencodable = |ch| LogError::Unencodable {
            ch,
            encoding: self.name(),
        };
        match self {
            Encoding::Ascii => {
                let ch = text.chars().find(|c| !c.is_ascii()).unwrap_or_default();
                Err(unencodable(ch))
            }
            _ => text
                .chars()
                .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| unencodable(ch)))
                .collect::<Result<Vec<u8>, _>>()
                .map(Cow::Owned),
        }
    }
}

impl FromStr for Encoding {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "utf8" => Ok(Encoding::Utf8),
            "ascii" | "usascii" => Ok(Encoding::Ascii),
            "latin1" | "iso88591" => Ok(Encoding::Latin1),
            _ => Err(LogError::UnknownEncoding(s.to_string())),
        }
    }
}
