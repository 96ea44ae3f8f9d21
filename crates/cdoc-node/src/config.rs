//! # Node Configuration
//!
//! Loaded from YAML or built in code, validated once, then passed by
//! reference into every service constructor. Every section has defaults so a
//! config file only needs to name what it changes.
//!
//! ```yaml
//! network:
//!   network_id: 2000
//!   protocol_version: "1.2.0"
//! anchoring:
//!   max_attempts: 5
//! accounts:
//!   - account_id: "0x…"
//!     webhook_url: "https://hooks.example/cdoc"
//! ```

use std::path::Path;
use std::time::Duration;

use cdoc_core::AccountId;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub jobs: JobsConfig,
    pub anchoring: AnchoringConfig,
    pub p2p: P2pConfig,
    pub telemetry: TelemetryConfig,
    pub accounts: Vec<AccountConfig>,
}

/// Which network the node belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Peers with another id are refused.
    pub network_id: u32,
    /// `MAJOR.MINOR.PATCH`; peers must share the major version.
    pub protocol_version: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: 1,
            protocol_version: "1.0.0".into(),
        }
    }
}

/// Job dispatcher sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub queue_capacity: usize,
    pub notification_capacity: usize,
    /// Finished jobs kept for status queries; older ones are evicted.
    pub finished_retention: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            notification_capacity: 256,
            finished_retention: 1024,
        }
    }
}

/// Ledger retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchoringConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AnchoringConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

/// Peer call limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            max_attempts: 3,
        }
    }
}

impl P2pConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `info,cdoc_node=debug`.
    pub filter: String,
    /// JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: false,
        }
    }
}

/// An account hosted by this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub account_id: AccountId,
    /// Where job completions for this account are posted.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// A parsed `MAJOR.MINOR.PATCH` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ProtocolVersion {
    /// Parse `MAJOR.MINOR.PATCH`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.').map(|p| p.parse::<u64>().ok());
        let version = Self {
            major: parts.next()??,
            minor: parts.next()??,
            patch: parts.next()??,
        };
        parts.next().is_none().then_some(version)
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl NodeConfig {
    /// Parse YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no service can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |field: &'static str, value: u64| {
            if value == 0 {
                Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".into(),
                })
            } else {
                Ok(())
            }
        };
        positive("jobs.queue_capacity", self.jobs.queue_capacity as u64)?;
        positive("jobs.notification_capacity", self.jobs.notification_capacity as u64)?;
        positive("anchoring.max_attempts", u64::from(self.anchoring.max_attempts))?;
        positive("p2p.max_attempts", u64::from(self.p2p.max_attempts))?;
        positive("p2p.request_timeout_ms", self.p2p.request_timeout_ms)?;
        if self.anchoring.initial_backoff_ms > self.anchoring.max_backoff_ms {
            return Err(ConfigError::Invalid {
                field: "anchoring.initial_backoff_ms",
                reason: "exceeds anchoring.max_backoff_ms".into(),
            });
        }
        self.protocol_version()?;
        for account in &self.accounts {
            account.webhook()?;
        }
        Ok(())
    }

    /// The configured protocol version.
    pub fn protocol_version(&self) -> Result<ProtocolVersion, ConfigError> {
        ProtocolVersion::parse(&self.network.protocol_version).ok_or_else(|| ConfigError::Invalid {
            field: "network.protocol_version",
            reason: format!("{:?} is not MAJOR.MINOR.PATCH", self.network.protocol_version),
        })
    }

    /// Configured webhook endpoints by account.
    pub fn webhook_endpoints(&self) -> Result<Vec<(AccountId, Url)>, ConfigError> {
        let mut out = Vec::new();
        for account in &self.accounts {
            if let Some(url) = account.webhook()? {
                out.push((account.account_id, url));
            }
        }
        Ok(out)
    }
}

impl AccountConfig {
    /// Parsed webhook URL, if configured.
    pub fn webhook(&self) -> Result<Option<Url>, ConfigError> {
        self.webhook_url
            .as_deref()
            .map(|raw| {
                let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
                    field: "accounts.webhook_url",
                    reason: format!("{raw}: {e}"),
                })?;
                match url.scheme() {
                    "http" | "https" => Ok(url),
                    other => Err(ConfigError::Invalid {
                        field: "accounts.webhook_url",
                        reason: format!("unsupported scheme {other}"),
                    }),
                }
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        NodeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let account = AccountId::random();
        let yaml = format!(
            "network:\n  network_id: 7\n  protocol_version: \"2.1.0\"\naccounts:\n  - account_id: \"{account}\"\n    webhook_url: \"https://hooks.example/cdoc\"\n"
        );
        let config = NodeConfig::from_yaml_str(&yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.network.network_id, 7);
        assert_eq!(config.jobs, JobsConfig::default());
        assert_eq!(config.protocol_version().unwrap().major, 2);
        let endpoints = config.webhook_endpoints().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].0, account);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = NodeConfig::default();
        config.jobs.queue_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "jobs.queue_capacity", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_versions_and_urls() {
        let mut config = NodeConfig::default();
        config.network.protocol_version = "1.0".into();
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.accounts.push(AccountConfig {
            account_id: AccountId::random(),
            webhook_url: Some("ftp://example.org".into()),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_protocol_version_parse() {
        assert_eq!(
            ProtocolVersion::parse("1.12.3"),
            Some(ProtocolVersion { major: 1, minor: 12, patch: 3 })
        );
        assert_eq!(ProtocolVersion::parse("1.2.3.4"), None);
        assert_eq!(ProtocolVersion::parse("a.b.c"), None);
    }
}
