//! Layouts turn a log entry into the bytes shipped as the event message
//!
//! - `PatternLayout`: conversion-pattern text (default `%m%n`)
//! - `JsonLayout`: one JSON object per entry

use super::error::{AppenderError, Result};
use super::log_entry::LogEntry;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

/// Renders a log entry to bytes
///
/// The shipper decodes the output as UTF-8 (lossily) for the outgoing message.
pub trait Layout: Send + Sync {
    fn render(&self, entry: &LogEntry) -> Vec<u8>;
}

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Date(String),
    Level,
    Logger,
    Thread,
    Message,
    Newline,
    Field(String),
}

/// Conversion-pattern layout
///
/// | conversion | output |
/// |------------|--------|
/// | `%d`, `%d{fmt}` | timestamp, strftime `fmt` (default `%Y-%m-%d %H:%M:%S%.3f`) |
/// | `%p` | level |
/// | `%c` | logger name |
/// | `%t` | thread name or id |
/// | `%m` | message |
/// | `%n` | newline |
/// | `%X{key}` | context field |
/// | `%%` | literal `%` |
///
/// # Example
///
/// ```
/// use cloudwatch_appender::core::{Layout, LogEntry, LogLevel, PatternLayout};
///
/// let layout = PatternLayout::new("%p %c - %m").unwrap();
/// let entry = LogEntry::new(LogLevel::Info, "started").with_logger("app");
/// assert_eq!(layout.render(&entry), b"INFO app - started");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternLayout {
    pattern: String,
    segments: Vec<Segment>,
}

impl PatternLayout {
    /// Message followed by a newline
    pub const DEFAULT_PATTERN: &'static str = "%m%n";

    /// Date, thread, level and logger in front of the message
    pub const SIMPLE_PATTERN: &'static str = "%d [%t] %p %c - %m%n";

    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            segments: Self::compile(pattern)?,
        })
    }

    pub fn simple() -> Self {
        Self {
            pattern: Self::SIMPLE_PATTERN.to_string(),
            segments: vec![
                Segment::Date(DEFAULT_DATE_FORMAT.to_string()),
                Segment::Literal(" [".to_string()),
                Segment::Thread,
                Segment::Literal("] ".to_string()),
                Segment::Level,
                Segment::Literal(" ".to_string()),
                Segment::Logger,
                Segment::Literal(" - ".to_string()),
                Segment::Message,
                Segment::Newline,
            ],
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn compile(pattern: &str) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            let conversion = chars
                .next()
                .ok_or_else(|| AppenderError::pattern(pattern, "dangling '%' at end of pattern"))?;

            if conversion == '%' {
                literal.push('%');
                continue;
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let option = if chars.peek() == Some(&'{') {
                chars.next();
                let mut option = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => option.push(ch),
                        None => {
                            return Err(AppenderError::pattern(
                                pattern,
                                format!("unterminated option for '%{}'", conversion),
                            ))
                        }
                    }
                }
                Some(option)
            } else {
                None
            };

            let segment = match (conversion, option) {
                ('d', None) => Segment::Date(DEFAULT_DATE_FORMAT.to_string()),
                ('d', Some(format)) => {
                    if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
                        return Err(AppenderError::pattern(
                            pattern,
                            format!("invalid date format '{}'", format),
                        ));
                    }
                    Segment::Date(format)
                }
                ('p', None) => Segment::Level,
                ('c', None) => Segment::Logger,
                ('t', None) => Segment::Thread,
                ('m', None) => Segment::Message,
                ('n', None) => Segment::Newline,
                ('X', Some(key)) if !key.is_empty() => Segment::Field(key),
                ('X', _) => {
                    return Err(AppenderError::pattern(pattern, "'%X' requires a {key} option"))
                }
                (other, Some(_)) => {
                    return Err(AppenderError::pattern(
                        pattern,
                        format!("'%{}' does not take an option", other),
                    ))
                }
                (other, None) => {
                    return Err(AppenderError::pattern(
                        pattern,
                        format!("unknown conversion '%{}'", other),
                    ))
                }
            };
            segments.push(segment);
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(segments)
    }
}

impl Default for PatternLayout {
    fn default() -> Self {
        Self {
            pattern: Self::DEFAULT_PATTERN.to_string(),
            segments: vec![Segment::Message, Segment::Newline],
        }
    }
}

impl Layout for PatternLayout {
    fn render(&self, entry: &LogEntry) -> Vec<u8> {
        let mut out = String::with_capacity(entry.message.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Date(format) => {
                    let _ = write!(out, "{}", entry.timestamp.format(format));
                }
                Segment::Level => out.push_str(entry.level.to_str()),
                Segment::Logger => out.push_str(entry.logger.as_deref().unwrap_or("")),
                Segment::Thread => out.push_str(entry.thread_label()),
                Segment::Message => out.push_str(&entry.message),
                Segment::Newline => out.push('\n'),
                Segment::Field(key) => {
                    if let Some(value) = entry.fields.get(key) {
                        out.push_str(value);
                    }
                }
            }
        }
        out.into_bytes()
    }
}

/// Structured layout emitting one JSON object per entry
#[derive(Debug, Clone)]
pub struct JsonLayout {
    include_thread: bool,
}

impl JsonLayout {
    pub fn new() -> Self {
        Self {
            include_thread: true,
        }
    }

    #[must_use]
    pub fn with_thread(mut self, include: bool) -> Self {
        self.include_thread = include;
        self
    }
}

impl Default for JsonLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout for JsonLayout {
    fn render(&self, entry: &LogEntry) -> Vec<u8> {
        let mut json_obj = serde_json::Map::new();

        json_obj.insert(
            "timestamp".to_string(),
            serde_json::Value::String(entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        );
        json_obj.insert(
            "level".to_string(),
            serde_json::Value::String(entry.level.to_str().to_string()),
        );
        if let Some(ref logger) = entry.logger {
            json_obj.insert("logger".to_string(), serde_json::Value::String(logger.clone()));
        }
        if self.include_thread {
            json_obj.insert(
                "thread".to_string(),
                serde_json::Value::String(entry.thread_label().to_string()),
            );
        }
        json_obj.insert(
            "message".to_string(),
            serde_json::Value::String(entry.message.clone()),
        );

        // Context fields never shadow the fixed keys
        for (key, value) in &entry.fields {
            json_obj
                .entry(key.clone())
                .or_insert_with(|| serde_json::Value::String(value.clone()));
        }

        serde_json::to_vec(&serde_json::Value::Object(json_obj)).unwrap_or_default()
    }
}

/// Serializable layout selection used by `AppenderConfig`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutConfig {
    Pattern {
        #[serde(default = "default_pattern")]
        pattern: String,
    },
    Json {
        #[serde(default = "default_true", rename = "includeThread")]
        include_thread: bool,
    },
}

fn default_pattern() -> String {
    PatternLayout::DEFAULT_PATTERN.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig::Pattern {
            pattern: default_pattern(),
        }
    }
}

impl LayoutConfig {
    pub fn build(&self) -> Result<Arc<dyn Layout>> {
        Ok(match self {
            LayoutConfig::Pattern { pattern } => Arc::new(PatternLayout::new(pattern)?),
            LayoutConfig::Json { include_thread } => {
                Arc::new(JsonLayout::new().with_thread(*include_thread))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use chrono::{TimeZone, Utc};

    fn entry() -> LogEntry {
        LogEntry::new(LogLevel::Warn, "cache miss")
            .with_logger("cache")
            .with_timestamp(Utc.with_ymd_and_hms(2017, 9, 1, 12, 30, 5).unwrap())
            .with_field("key", "user:42")
    }

    fn render(layout: &dyn Layout, entry: &LogEntry) -> String {
        String::from_utf8(layout.render(entry)).unwrap()
    }

    #[test]
    fn test_default_pattern_is_message_and_newline() {
        assert_eq!(render(&PatternLayout::default(), &entry()), "cache miss\n");
        assert_eq!(PatternLayout::default().pattern(), "%m%n");
    }

    #[test]
    fn test_simple_pattern_matches_compiled_form() {
        let compiled = PatternLayout::new(PatternLayout::SIMPLE_PATTERN).unwrap();
        assert_eq!(compiled, PatternLayout::simple());

        let mut e = entry();
        e.thread_name = Some("main".to_string());
        assert_eq!(
            render(&compiled, &e),
            "2017-09-01 12:30:05.000 [main] WARN cache - cache miss\n"
        );
    }

    #[test]
    fn test_custom_date_and_field_conversions() {
        let layout = PatternLayout::new("%d{%Y/%m/%d} %X{key} %X{absent}|100%%").unwrap();
        assert_eq!(render(&layout, &entry()), "2017/09/01 user:42 |100%");
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        for pattern in [
            "%q", "abc%", "%d{%Y", "%d{%Q}", "%d{%Y-%}", "%X", "%X{}", "%m{x}",
        ] {
            let err = PatternLayout::new(pattern).unwrap_err();
            assert!(
                matches!(err, AppenderError::InvalidPattern { .. }),
                "pattern {:?} gave {:?}",
                pattern,
                err
            );
        }
    }

    #[test]
    fn test_json_layout() {
        let parsed: serde_json::Value =
            serde_json::from_slice(&JsonLayout::new().render(&entry())).unwrap();
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["logger"], "cache");
        assert_eq!(parsed["message"], "cache miss");
        assert_eq!(parsed["key"], "user:42");
        assert_eq!(parsed["timestamp"], "2017-09-01T12:30:05.000Z");
        assert!(parsed["thread"].is_string());

        let parsed: serde_json::Value =
            serde_json::from_slice(&JsonLayout::new().with_thread(false).render(&entry())).unwrap();
        assert!(parsed.get("thread").is_none());
    }

    #[test]
    fn test_layout_config_deserialization() {
        let config: LayoutConfig = serde_json::from_str(r#"{"type":"pattern"}"#).unwrap();
        assert_eq!(config, LayoutConfig::default());

        let config: LayoutConfig =
            serde_json::from_str(r#"{"type":"json","includeThread":false}"#).unwrap();
        assert_eq!(config, LayoutConfig::Json { include_thread: false });

        let bad = LayoutConfig::Pattern {
            pattern: "%z".to_string(),
        };
        assert!(bad.build().is_err());
    }
}
