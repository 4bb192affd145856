pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{Config, DebugConfig, LogConfig, LogLevel, ScanConfig, ServerConfig};
pub use error::ConfigError;
pub use load::{default_config_dir, load_config, load_from_str};
