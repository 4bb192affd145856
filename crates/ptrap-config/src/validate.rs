use crate::config::Config;
use crate::error::ConfigError;

const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
const MAX_INTERRUPT_POLL_MS: u64 = 10_000;
const MIN_PAGE_SIZE: u64 = 4096;
const MAX_PAGE_SIZE: u64 = 1 << 20;

fn violation(field: &str, message: String) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message,
    }
}

/// Validate a [`Config`], returning every violation found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(violation("server.port", "must not be 0".into()));
    }
    if config.server.notify_port == 0 {
        errors.push(violation("server.notify_port", "must not be 0".into()));
    }
    if config.server.connect_timeout_ms < MIN_CONNECT_TIMEOUT_MS {
        errors.push(violation(
            "server.connect_timeout_ms",
            format!(
                "must be at least {MIN_CONNECT_TIMEOUT_MS}, got {}",
                config.server.connect_timeout_ms
            ),
        ));
    }

    let poll = config.debug.interrupt_poll_ms;
    if poll == 0 || poll > MAX_INTERRUPT_POLL_MS {
        errors.push(violation(
            "debug.interrupt_poll_ms",
            format!("must be 1..={MAX_INTERRUPT_POLL_MS}, got {poll}"),
        ));
    }

    let page = config.scan.page_size;
    if !page.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page) {
        errors.push(violation(
            "scan.page_size",
            format!("must be a power of two in {MIN_PAGE_SIZE}..={MAX_PAGE_SIZE}, got {page}"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: &ConfigError) -> &str {
        match err {
            ConfigError::Validation { field, .. } => field,
            other => panic!("not a validation error: {other}"),
        }
    }

    #[test]
    fn default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_ports_rejected() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        cfg.server.notify_port = 0;
        let errs = validate(&cfg).unwrap_err();
        let fields: Vec<_> = errs.iter().map(field_of).collect();
        assert_eq!(fields, ["server.port", "server.notify_port"]);
    }

    #[test]
    fn short_connect_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.server.connect_timeout_ms = 99;
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(field_of(&errs[0]), "server.connect_timeout_ms");
        cfg.server.connect_timeout_ms = 100;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn interrupt_poll_bounds() {
        let mut cfg = Config::default();
        cfg.debug.interrupt_poll_ms = 0;
        assert!(validate(&cfg).is_err());
        cfg.debug.interrupt_poll_ms = 10_001;
        assert!(validate(&cfg).is_err());
        cfg.debug.interrupt_poll_ms = 1;
        assert!(validate(&cfg).is_ok());
        cfg.debug.interrupt_poll_ms = 10_000;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn page_size_must_be_bounded_power_of_two() {
        let mut cfg = Config::default();
        for bad in [0, 2048, 5000, 2 << 20] {
            cfg.scan.page_size = bad;
            let errs = validate(&cfg).unwrap_err();
            assert_eq!(field_of(&errs[0]), "scan.page_size", "page size {bad}");
        }
        for good in [4096, 0x4000, 1 << 20] {
            cfg.scan.page_size = good;
            assert!(validate(&cfg).is_ok(), "page size {good}");
        }
    }

    #[test]
    fn multiple_errors_returned() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        cfg.debug.interrupt_poll_ms = 0;
        cfg.scan.page_size = 3;
        assert_eq!(validate(&cfg).unwrap_err().len(), 3);
    }
}
