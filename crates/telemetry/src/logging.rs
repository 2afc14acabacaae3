use palaver_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::TelemetryError;

/// Install a global fmt subscriber.
///
/// `filter` is an `EnvFilter` directive string. A valid `RUST_LOG` takes
/// precedence over it. With `json` set, events are written as JSON lines.
pub fn init_tracing(filter: &str, json: bool) -> Result<(), TelemetryError> {
    let configured = EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(configured);

    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init()
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

/// [`init_tracing`] with the `[logging]` section of the configuration.
pub fn init_from_config(config: &LoggingConfig) -> Result<(), TelemetryError> {
    init_tracing(&config.filter, config.json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_rejected_before_install() {
        let err = init_tracing("palaver=loud", false).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }

    #[test]
    fn second_install_reports_already_initialized() {
        let config = LoggingConfig::default();
        // Whichever call installs first, the next one must fail.
        let _ = init_from_config(&config);
        let err = init_from_config(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::AlreadyInitialized(_)));
    }
}
