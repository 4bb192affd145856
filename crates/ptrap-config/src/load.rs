use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Content written into a newly created default config file.
pub const DEFAULT_CONFIG_CONTENT: &str = r#"# ptrap configuration
# Uncomment and edit settings below to override defaults.

# [server]
# bind = "0.0.0.0"
# port = 744
# notify_port = 755
# connect_timeout_ms = 5000

# [debug]
# interrupt_poll_ms = 50

# [scan]
# page_size = 16384

# [log]
# level = "info"
# file = "/var/log/ptrap.log"
"#;

/// The per-user config directory: `<config_dir>/ptrap`, falling back to
/// `$HOME/.config/ptrap`.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join("ptrap"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Load and merge configuration.
///
/// 1. Reads `config_dir/config.toml`, creating it with commented-out
///    defaults when it does not exist.
/// 2. Deep-merges the optional `overlay` file on top.
/// 3. Validates the merged result.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O failure, a missing overlay, parse
/// failure or the first validation failure.
pub fn load_config(config_dir: &Path, overlay: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }
    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("Created default config at {}", global_path.display());
    }

    let mut config = Config::default();

    let global_content = std::fs::read_to_string(&global_path)?;
    if has_non_comment_content(&global_content) {
        config = merge_configs(&config, &global_content)?;
    }

    if let Some(path) = overlay {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let overlay_content = std::fs::read_to_string(path)?;
        config = merge_configs(&config, &overlay_content)?;
        tracing::debug!("Applied config overlay {}", path.display());
    }

    first_violation(&config)?;
    Ok(config)
}

/// Parse a TOML string directly into a validated [`Config`].
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    first_violation(&config)?;
    Ok(config)
}

fn first_violation(config: &Config) -> Result<(), ConfigError> {
    validate(config).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })
}

/// Whether the content has at least one non-empty, non-comment line.
fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}
