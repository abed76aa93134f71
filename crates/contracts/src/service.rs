//! ServiceBlueprint - Config Loader output
//!
//! Describes the complete service configuration: HTTP listener, buffered
//! store timing, and the sink records are persisted to.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Buffered store settings
    #[serde(default)]
    pub store: StoreSettings,

    /// Persistence target
    #[serde(default)]
    pub sink: SinkConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (`host:port`)
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Log the `Referer` header of served requests
    #[serde(default = "default_true")]
    pub log_referer: bool,

    /// Log the `User-Agent` header of served requests
    #[serde(default = "default_true")]
    pub log_user_agent: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            max_body_bytes: default_max_body_bytes(),
            log_referer: true,
            log_user_agent: true,
        }
    }
}

fn default_server_addr() -> String {
    "0.0.0.0:80".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Buffered store timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Period of the background flush loop
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Upper bound on a single sink save
    #[serde(default = "default_save_timeout", with = "humantime_serde")]
    pub save_timeout: Duration,

    /// Pending length at which an advisory warning is logged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_water_mark: Option<usize>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
            save_timeout: default_save_timeout(),
            high_water_mark: None,
        }
    }
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_save_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Sink selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SinkConfig {
    /// ClickHouse bulk insert
    #[serde(rename = "clickhouse")]
    ClickHouse(ClickHouseSinkConfig),
    /// Log batch summaries only
    #[serde(rename = "log")]
    Log,
    /// Append JSON lines to local files
    #[serde(rename = "file")]
    File(FileSinkConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::ClickHouse(ClickHouseSinkConfig::default())
    }
}

impl SinkConfig {
    /// Short kind label (used for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClickHouse(_) => "clickhouse",
            Self::Log => "log",
            Self::File(_) => "file",
        }
    }
}

/// ClickHouse connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseSinkConfig {
    /// HTTP interface URL
    #[serde(default = "default_clickhouse_url")]
    pub url: String,

    /// Database name
    #[serde(default = "default_database")]
    pub database: String,

    /// Target table
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for ClickHouseSinkConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_database(),
            table: default_table(),
            user: None,
            password: None,
        }
    }
}

fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

fn default_table() -> String {
    "analytics".to_string()
}

/// Local JSON-lines output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    /// Output directory
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./output")
}
