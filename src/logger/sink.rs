//! Structured log records and the sink capability handlers log through

use std::fmt;
use std::str::FromStr;

/// Log severity, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            other => Err(format!("Unknown log level: '{other}'")),
        }
    }
}

/// A single structured log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    #[must_use]
    pub fn with_field(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((key, value.into()));
        self
    }

    /// Look up a field value by key
    #[cfg(test)]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Render as `[LEVEL] message key=value ...`
    pub fn render(&self) -> String {
        let mut line = format!("[{}] {}", self.level, self.message);
        for (key, value) in &self.fields {
            line.push_str(&format!(" {key}={value}"));
        }
        line
    }
}

/// Logging capability injected into request handling
pub trait LogSink: Send + Sync {
    fn emit(&self, record: LogRecord);

    /// Write a preformatted access log line
    fn access(&self, line: &str);
}

/// Sink backed by the process-wide log writer
pub struct WriterSink {
    max_level: LogLevel,
}

impl WriterSink {
    pub const fn new(max_level: LogLevel) -> Self {
        Self { max_level }
    }
}

impl LogSink for WriterSink {
    fn emit(&self, record: LogRecord) {
        if record.level > self.max_level {
            return;
        }
        let line = record.render();
        match record.level {
            LogLevel::Error | LogLevel::Warn => super::write_error(&line),
            LogLevel::Info | LogLevel::Debug => super::write_info(&line),
        }
    }

    fn access(&self, line: &str) {
        super::write_info(line);
    }
}

/// Sink that keeps records in memory for assertions
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub records: std::sync::Mutex<Vec<LogRecord>>,
    pub access_lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn access_lines(&self) -> Vec<String> {
        self.access_lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl LogSink for MemorySink {
    fn emit(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
    }

    fn access(&self, line: &str) {
        self.access_lines.lock().unwrap().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!("info".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!(" WARNING ".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("Error".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_ordering_filters_less_severe() {
        assert!(LogLevel::Debug > LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Warn);
    }

    #[test]
    fn test_render_with_fields() {
        let record = LogRecord::info("Request from 1.2.3.4").with_field("ip", "1.2.3.4");
        assert_eq!(record.render(), "[INFO] Request from 1.2.3.4 ip=1.2.3.4");
        assert_eq!(record.field("ip"), Some("1.2.3.4"));
        assert_eq!(record.field("missing"), None);
    }
}
