//! Client configuration.
//!
//! Loaded from a TOML file (the CLI defaults to `tienda.toml`). Every section
//! and key is optional; missing values fall back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tienda_core::{Backoff, RetryPolicy};
use tienda_types::{OrderDirection, QuerySpec};

use crate::supervisor::SupervisorConfig;

/// Root configuration for the sync engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Connection supervision.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Manual retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Collection names and the inventory ordering.
    #[serde(default)]
    pub collections: CollectionsConfig,
    /// Profile guard behaviour.
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Connection supervision settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Health probe deadline in milliseconds (default: 10000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Pause between disabling and re-enabling the network (default: 1000).
    #[serde(default = "default_quiescence_ms")]
    pub quiescence_ms: u64,
    /// Background health check period; no monitor when absent.
    pub health_check_interval_ms: Option<u64>,
}

/// Backoff schedule kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Retry immediately.
    #[default]
    None,
    /// Exponential backoff with jitter.
    Exponential,
}

/// Manual retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Give up after this many consecutive failures; unlimited when absent.
    pub max_attempts: Option<u32>,
    /// Delay schedule (default: none).
    #[serde(default)]
    pub backoff: BackoffKind,
    /// First backoff delay in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound of random jitter in milliseconds (default: 0).
    #[serde(default)]
    pub jitter_ms: u64,
}

/// Collection layout.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionsConfig {
    /// Profile documents, keyed by uid (default: "users").
    #[serde(default = "default_profiles_collection")]
    pub profiles: String,
    /// Inventory items (default: "productos").
    #[serde(default = "default_inventory_collection")]
    pub inventory: String,
    /// Field the inventory is ordered by (default: "creado").
    #[serde(default = "default_inventory_order_key")]
    pub inventory_order_key: String,
    /// Inventory sort direction (default: "desc").
    #[serde(default = "default_inventory_direction")]
    pub inventory_direction: OrderDirection,
}

/// Profile guard settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Use the store's atomic create-if-absent when it has one (default: true).
    #[serde(default = "default_prefer_atomic_create")]
    pub prefer_atomic_create: bool,
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_quiescence_ms() -> u64 {
    1_000
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_profiles_collection() -> String {
    "users".to_string()
}

fn default_inventory_collection() -> String {
    "productos".to_string()
}

fn default_inventory_order_key() -> String {
    "creado".to_string()
}

fn default_inventory_direction() -> OrderDirection {
    OrderDirection::Descending
}

fn default_prefer_atomic_create() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            quiescence_ms: default_quiescence_ms(),
            health_check_interval_ms: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: BackoffKind::None,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: 0,
        }
    }
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles_collection(),
            inventory: default_inventory_collection(),
            inventory_order_key: default_inventory_order_key(),
            inventory_direction: default_inventory_direction(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            prefer_atomic_create: default_prefer_atomic_create(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or fails
    /// validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connection.probe_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.connection.health_check_interval_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "connection.health_check_interval_ms must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms exceeds retry.max_delay_ms".into(),
            ));
        }
        for (key, value) in [
            ("collections.profiles", &self.collections.profiles),
            ("collections.inventory", &self.collections.inventory),
            ("collections.inventory_order_key", &self.collections.inventory_order_key),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    /// Supervisor settings derived from `[connection]` and `[retry]`.
    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            probe_timeout: Duration::from_millis(self.connection.probe_timeout_ms),
            quiescence: Duration::from_millis(self.connection.quiescence_ms),
            retry: self.retry_policy(),
        }
    }

    /// The manual retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.retry.backoff {
            BackoffKind::None => Backoff::None,
            BackoffKind::Exponential => Backoff::Exponential {
                base: Duration::from_millis(self.retry.base_delay_ms),
                max: Duration::from_millis(self.retry.max_delay_ms),
                jitter: Duration::from_millis(self.retry.jitter_ms),
            },
        };
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff,
        }
    }

    /// Background health check period, if enabled.
    pub fn health_check_interval(&self) -> Option<Duration> {
        self.connection
            .health_check_interval_ms
            .map(Duration::from_millis)
    }

    /// The inventory live query.
    pub fn inventory_query(&self) -> QuerySpec {
        QuerySpec::new(
            self.collections.inventory.clone(),
            self.collections.inventory_order_key.clone(),
            self.collections.inventory_direction,
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = ClientConfig::default();
        let supervisor = config.supervisor();
        assert_eq!(supervisor.probe_timeout, Duration::from_secs(10));
        assert_eq!(supervisor.quiescence, Duration::from_secs(1));
        assert_eq!(supervisor.retry, RetryPolicy::unbounded());
        assert_eq!(config.collections.profiles, "users");
        assert!(config.health_check_interval().is_none());
        assert!(config.profile.prefer_atomic_create);
        config.validate().unwrap();
    }

    #[test]
    fn inventory_query_defaults_to_newest_first() {
        let query = ClientConfig::default().inventory_query();
        assert_eq!(query.to_string(), "productos order by creado desc");
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[connection]
probe_timeout_ms = 5000
health_check_interval_ms = 30000

[retry]
max_attempts = 3
backoff = "exponential"
base_delay_ms = 500
max_delay_ms = 4000
jitter_ms = 100

[collections]
inventory = "inventario"
inventory_direction = "asc"

[profile]
prefer_atomic_create = false
"#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.connection.probe_timeout_ms, 5000);
        assert_eq!(config.connection.quiescence_ms, 1000);
        assert_eq!(config.health_check_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.retry.max_attempts, Some(3));
        assert_eq!(
            config.retry_policy().backoff,
            Backoff::Exponential {
                base: Duration::from_millis(500),
                max: Duration::from_millis(4000),
                jitter: Duration::from_millis(100),
            }
        );
        assert_eq!(config.collections.profiles, "users");
        assert_eq!(
            config.inventory_query().to_string(),
            "inventario order by creado asc"
        );
        assert!(!config.profile.prefer_atomic_create);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.connection.probe_timeout_ms, 10_000);
        assert_eq!(config.collections.inventory, "productos");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = ClientConfig::default();
        config.connection.probe_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ClientConfig::default();
        config.retry.max_attempts = Some(0);
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.collections.inventory = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nquiescence_ms = 250").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.connection.quiescence_ms, 250);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let result = ClientConfig::from_file(Path::new("/nonexistent/tienda.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nprobe_timeout_ms = \"soon\"").unwrap();

        let result = ClientConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
