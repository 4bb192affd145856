use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Listener and notification-channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the command listener binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Command port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Controller port the notification channel connects back to.
    #[serde(default = "default_notify_port")]
    pub notify_port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    744
}
fn default_notify_port() -> u16 {
    755
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            notify_port: default_notify_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Debug session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugConfig {
    /// How often the session polls the target for traps.
    #[serde(default = "default_interrupt_poll_ms")]
    pub interrupt_poll_ms: u64,
}

fn default_interrupt_poll_ms() -> u64 {
    50
}

impl DebugConfig {
    pub fn interrupt_poll(&self) -> Duration {
        Duration::from_millis(self.interrupt_poll_ms)
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            interrupt_poll_ms: default_interrupt_poll_ms(),
        }
    }
}

/// Memory scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Bytes read from the target per scan window.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page_size() -> u64 {
    0x4000
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub log: LogConfig,
}
