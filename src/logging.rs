//! Logging configuration module
//!
//! Implements Redis-compatible logging with support for:
//! - Log levels (debug, verbose, notice, warning, nothing)
//! - File-based logging
//! - Redaction of credentials

use crate::config::WatchConfig;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

/// Keywords whose following argument is replaced by `[REDACTED]`
const SECRET_KEYWORDS: &[&str] = &["AUTH", "SENTINEL-AUTH-PASS"];

/// Redis-style log levels mapped to Rust log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisLogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
    Nothing,
}

impl RedisLogLevel {
    /// Parse Redis-style log level string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => Self::Debug,
            "verbose" => Self::Verbose,
            "notice" => Self::Notice,
            "warning" => Self::Warning,
            "nothing" => Self::Nothing,
            _ => Self::Notice,
        }
    }

    /// Convert to Rust log LevelFilter
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::Debug,
            Self::Verbose => LevelFilter::Info,
            Self::Notice => LevelFilter::Info,
            Self::Warning => LevelFilter::Warn,
            Self::Nothing => LevelFilter::Off,
        }
    }
}

/// Logger writing to a file or stderr
pub struct WatchLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
    hide_user_data: bool,
}

impl WatchLogger {
    pub fn new(config: &WatchConfig) -> Self {
        let level = RedisLogLevel::parse(&config.loglevel).to_level_filter();

        let file = if !config.logfile.is_empty() {
            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.logfile)
            {
                Ok(f) => Some(Mutex::new(f)),
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to open log file '{}': {}",
                        config.logfile, e
                    );
                    None
                }
            }
        } else {
            None
        };

        Self {
            level,
            file,
            hide_user_data: config.hide_user_data_from_log,
        }
    }

    /// Hide the argument following AUTH-like keywords
    fn sanitize_message(&self, msg: &str) -> String {
        if !self.hide_user_data {
            return msg.to_string();
        }

        let mut redact_next = false;
        let words: Vec<&str> = msg
            .split(' ')
            .map(|word| {
                if redact_next && !word.is_empty() {
                    redact_next = false;
                    return "[REDACTED]";
                }
                if SECRET_KEYWORDS
                    .iter()
                    .any(|keyword| word.eq_ignore_ascii_case(keyword))
                {
                    redact_next = true;
                }
                word
            })
            .collect();
        words.join(" ")
    }

    /// Format log record as Redis-style output
    fn format_record(&self, record: &Record) -> String {
        let level_char = match record.level() {
            log::Level::Error => '!',
            log::Level::Warn => '#',
            log::Level::Info => '*',
            log::Level::Debug => '-',
            log::Level::Trace => '.',
        };

        let msg = self.sanitize_message(&record.args().to_string());
        format!(
            "{}:W {} {} {}\n",
            std::process::id(),
            timestamp(),
            level_char,
            msg
        )
    }
}

impl Log for WatchLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let formatted = self.format_record(record);

        if let Some(ref file) = self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.write_all(formatted.as_bytes());
            }
        } else {
            eprint!("{}", formatted);
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.file
            && let Ok(mut f) = file.lock()
        {
            let _ = f.flush();
        }
    }
}

/// Seconds since the epoch with millisecond precision
fn timestamp() -> String {
    use std::time::SystemTime;

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}

/// Install the logger for the process
pub fn init_logging(config: &WatchConfig) -> Result<(), log::SetLoggerError> {
    let logger = Box::new(WatchLogger::new(config));
    let level = RedisLogLevel::parse(&config.loglevel).to_level_filter();

    log::set_boxed_logger(logger)?;
    log::set_max_level(level);

    Ok(())
}
