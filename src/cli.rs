use crate::config::{WatchConfig, parse_bool, parse_config};
use crate::sentinel::Sentinel;
use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sentinel-watch")]
#[command(version)]
#[command(about = "Watches Redis Sentinels and reports failovers", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(value_name = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Sentinel to watch as host:port (repeatable)
    #[arg(long = "sentinel", value_name = "HOST:PORT")]
    pub sentinels: Vec<String>,

    /// Log level (debug, verbose, notice, warning, nothing)
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Log file path
    #[arg(long)]
    pub logfile: Option<String>,

    /// Redact AUTH arguments from logs (yes/no)
    #[arg(long)]
    pub hide_user_data_from_log: Option<String>,

    /// Password sent with AUTH
    #[arg(long)]
    pub auth_pass: Option<String>,

    /// ACL user sent with AUTH
    #[arg(long)]
    pub auth_user: Option<String>,

    /// Delay before reconnecting to a lost Sentinel, in milliseconds
    #[arg(long)]
    pub reconnect_interval: Option<u64>,

    /// Connect timeout, in milliseconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Idle time before a subscription is probed with PING, in milliseconds
    #[arg(long)]
    pub heartbeat_interval: Option<u64>,
}

impl Cli {
    /// Parse the command line and merge it over the config file
    pub fn load_config() -> Result<WatchConfig, String> {
        Cli::parse().into_config()
    }

    pub fn into_config(self) -> Result<WatchConfig, String> {
        let mut config = match &self.config_file {
            Some(path) => parse_config(path)?,
            None => WatchConfig::default(),
        };

        for addr in &self.sentinels {
            let sentinel = Sentinel::from_address(addr).map_err(|e| e.to_string())?;
            config.add_sentinel(sentinel);
        }
        if let Some(loglevel) = self.loglevel {
            config.loglevel = loglevel;
        }
        if let Some(logfile) = self.logfile {
            config.logfile = logfile;
        }
        if let Some(hide) = self.hide_user_data_from_log {
            config.hide_user_data_from_log = parse_bool(&hide)?;
        }
        if let Some(pass) = self.auth_pass {
            config.auth_pass = Some(pass);
        }
        if let Some(user) = self.auth_user {
            config.auth_user = Some(user);
        }
        if let Some(ms) = self.reconnect_interval {
            config.reconnect_interval_ms = ms.max(1);
        }
        if let Some(ms) = self.connect_timeout {
            config.connect_timeout_ms = ms.max(1);
        }
        if let Some(ms) = self.heartbeat_interval {
            config.heartbeat_interval_ms = ms.max(1);
        }

        if config.sentinels.is_empty() {
            return Err("No sentinels configured (use --sentinel or a config file)".to_string());
        }

        Ok(config)
    }
}
