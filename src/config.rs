//! Watcher Configuration
//!
//! Parses sentinel-watch.conf files with Redis-style directives.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::redis::tcp::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HEARTBEAT_INTERVAL_MS};
use crate::sentinel::{ClientOptions, Credentials, Sentinel};
use crate::watcher::DEFAULT_RECONNECT_INTERVAL_MS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Sentinels to watch, in configuration order
    pub sentinels: Vec<Sentinel>,
    pub auth_user: Option<String>,
    pub auth_pass: Option<String>,

    // Logging
    pub loglevel: String,
    pub logfile: String,
    pub hide_user_data_from_log: bool,

    // Timing, in milliseconds
    pub reconnect_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            sentinels: Vec::new(),
            auth_user: None,
            auth_pass: None,
            loglevel: "notice".to_string(),
            logfile: String::new(),
            hide_user_data_from_log: true,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }
}

impl WatchConfig {
    /// Add a Sentinel unless it is already configured
    pub fn add_sentinel(&mut self, sentinel: Sentinel) {
        if !self.sentinels.contains(&sentinel) {
            self.sentinels.push(sentinel);
        }
    }

    /// Options for every Sentinel client; AUTH is only sent with a password
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            auth: self.auth_pass.as_ref().map(|password| Credentials {
                user: self.auth_user.clone(),
                password: password.clone(),
            }),
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Parse a configuration file
pub fn parse_config(path: &Path) -> Result<WatchConfig, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;
    Ok(parse_config_str(&content))
}

/// Parse configuration text; invalid lines are reported and skipped
pub fn parse_config_str(content: &str) -> WatchConfig {
    let mut config = WatchConfig::default();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(e) = parse_line(line, &mut config) {
            eprintln!("Warning: line {}: {}", line_num + 1, e);
        }
    }

    config
}

/// Parse a single configuration line
fn parse_line(line: &str, config: &mut WatchConfig) -> Result<(), String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(());
    }

    let directive = parts[0].to_lowercase();
    let value = |what: &str| {
        parts
            .get(1)
            .copied()
            .ok_or_else(|| format!("{} directive requires {}", directive, what))
    };

    match directive.as_str() {
        "sentinel" => {
            // sentinel <host> <port>
            if parts.len() < 3 {
                return Err("sentinel directive requires: host port".to_string());
            }
            let port: u16 = parts[2]
                .parse()
                .map_err(|_| "invalid port in sentinel directive".to_string())?;
            let sentinel = Sentinel::new(parts[1], port);
            sentinel.validate().map_err(|e| e.to_string())?;
            config.add_sentinel(sentinel);
        }
        "sentinel-auth-user" => {
            config.auth_user = Some(value("a user name")?.to_string());
        }
        "sentinel-auth-pass" => {
            config.auth_pass = Some(value("a password")?.to_string());
        }
        "loglevel" => {
            config.loglevel = value("a value")?.to_string();
        }
        "logfile" => {
            // logfile "" keeps logging on stderr
            config.logfile = value("a path")?.trim_matches('"').to_string();
        }
        "hide-user-data-from-log" => {
            config.hide_user_data_from_log = parse_bool(value("a value")?)?;
        }
        "reconnect-interval" => {
            config.reconnect_interval_ms = parse_millis(value("a value")?)?;
        }
        "connect-timeout" => {
            config.connect_timeout_ms = parse_millis(value("a value")?)?;
        }
        "heartbeat-interval" => {
            config.heartbeat_interval_ms = parse_millis(value("a value")?)?;
        }
        _ => {
            // Ignore unknown directives for compatibility
        }
    }

    Ok(())
}

pub fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(format!("invalid boolean value: {}", s)),
    }
}

fn parse_millis(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(format!("invalid interval in milliseconds: {}", s)),
    }
}
