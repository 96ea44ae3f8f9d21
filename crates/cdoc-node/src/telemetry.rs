//! Tracing subscriber setup for hosts embedding the node.
//!
//! Libraries in this workspace only emit events; the host decides where they
//! go by calling [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;
use crate::error::ConfigError;

/// Install the global subscriber.
///
/// # Errors
///
/// `ConfigError::Invalid` if the filter directive does not parse or a global
/// subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::Invalid {
        field: "telemetry.filter",
        reason: e.to_string(),
    })?;
    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };
    installed.map_err(|e| ConfigError::Invalid {
        field: "telemetry",
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_rejected() {
        let config = TelemetryConfig {
            filter: "cdoc_node=loudest".into(),
            json: false,
        };
        assert!(matches!(
            init_tracing(&config),
            Err(ConfigError::Invalid { field: "telemetry.filter", .. })
        ));
    }
}
