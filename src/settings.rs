//! The `Settings` module loads application configuration using the
//! `config` crate, supporting YAML, TOML, and JSON files. It provides
//! a strongly typed structure for accessing configuration values
//! throughout the application.
use std::time::Duration;

use config::{Case, Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// CORS (Cross-Origin Resource Sharing) configuration.
///
/// Controls how the server handles cross-origin HTTP requests.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Cors {
    /// Maximum cache age for CORS preflight requests (in seconds).
    pub max_age: Option<u32>,

    /// Indicates whether credentials are allowed.
    pub allow_credentials: Option<bool>,

    /// Allowed HTTP methods.
    pub allowed_methods: Option<String>,

    /// Allowed HTTP headers.
    pub allowed_headers: Option<String>,

    /// Allowed origin patterns.
    pub allowed_origins_pattern: Option<String>,
}

/// Server configuration.
///
/// Defines network, runtime, and deployment-related settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Server {
    /// Server host address.
    pub host: Option<String>,

    /// Main server port.
    pub port: u16,

    /// Port used for health check endpoints.
    pub health_check_port: u16,

    /// Number of worker threads.
    pub workers: Option<usize>,

    /// Number of worker threads for health checks.
    pub health_check_workers: Option<usize>,

    /// CORS configuration.
    pub cors: Option<Cors>,
}

/// Gateway configuration.
///
/// Tunes the container lifecycle engine: port allocation, idle reaping,
/// readiness probing, upstream forwarding, and container resource limits.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Gateway {
    /// First host port handed out to registered applications.
    pub base_port: Option<u16>,

    /// Seconds without traffic before a container is reaped.
    pub idle_timeout_secs: Option<u64>,

    /// Period of the idle reaper scan.
    pub reap_interval_secs: Option<u64>,

    /// Total deadline for the container readiness probe.
    pub probe_timeout_secs: Option<u64>,

    /// Delay between readiness probe attempts.
    pub probe_interval_ms: Option<u64>,

    /// Timeout applied to forwarded upstream requests.
    pub upstream_timeout_secs: Option<u64>,

    /// Grace period given to a container when stopping it.
    pub stop_grace_secs: Option<u64>,

    /// Memory cap applied to each container.
    pub memory_limit_bytes: Option<i64>,

    /// CPU quota applied to each container, in nano-CPUs.
    pub nano_cpus: Option<i64>,
}

impl Gateway {
    /// Resolves this section into a [`GatewayConfig`] with all defaults
    /// applied.
    pub fn config(&self) -> GatewayConfig {
        GatewayConfig {
            base_port: self.base_port.unwrap_or(3500),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.unwrap_or(15)),
            reap_interval: Duration::from_secs(self.reap_interval_secs.unwrap_or(5)),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs.unwrap_or(15)),
            probe_interval: Duration::from_millis(self.probe_interval_ms.unwrap_or(200)),
            probe_attempt_timeout: Duration::from_secs(1),
            upstream_timeout: Duration::from_secs(self.upstream_timeout_secs.unwrap_or(30)),
            stop_grace: Duration::from_secs(self.stop_grace_secs.unwrap_or(3)),
            memory_limit_bytes: self.memory_limit_bytes.unwrap_or(128 * 1024 * 1024),
            nano_cpus: self.nano_cpus.unwrap_or(500_000_000),
        }
    }
}

/// Resolved gateway tuning values shared by the lifecycle manager, the
/// reverse proxy, and the container runtime adapter.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// First host port handed out to registered applications.
    pub base_port: u16,

    /// Idle interval after which a container is reaped.
    pub idle_timeout: Duration,

    /// Period of the idle reaper scan.
    pub reap_interval: Duration,

    /// Total deadline for the container readiness probe.
    pub probe_timeout: Duration,

    /// Delay between readiness probe attempts.
    pub probe_interval: Duration,

    /// Timeout of a single readiness probe attempt.
    pub probe_attempt_timeout: Duration,

    /// Timeout applied to forwarded upstream requests.
    pub upstream_timeout: Duration,

    /// Grace period given to a container when stopping it.
    pub stop_grace: Duration,

    /// Memory cap applied to each container.
    pub memory_limit_bytes: i64,

    /// CPU quota applied to each container, in nano-CPUs.
    pub nano_cpus: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Gateway::default().config()
    }
}

/// Metrics configuration.
///
/// Controls application metrics exposure and identification.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Metrics {
    /// Enables or disables metrics collection.
    pub enabled: Option<bool>,

    /// Application name used in metrics labels.
    pub app_name: Option<String>,
}

/// Global application settings.
///
/// Root configuration structure that aggregates server, gateway, and
/// metrics configurations.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Server configuration.
    pub server: Option<Server>,

    /// Gateway configuration.
    pub gateway: Option<Gateway>,

    /// Metrics configuration.
    pub metrics: Option<Metrics>,
}

impl Settings {
    /// Loads the application settings from a configuration file.
    ///
    /// This function reads the configuration from the specified file path,
    /// deserializes it into the `Settings` structure, and returns it.
    ///
    /// # Arguments
    ///
    /// * `config_path` - A string slice that holds the path to the configuration file.
    ///
    /// # Returns
    ///
    /// * `Result<Settings, ConfigError>` - The loaded settings or an error if loading fails.
    pub fn new(config_path: &str) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::new(config_path, FileFormat::Yaml));

        builder =
            builder.add_source(Environment::with_convert_case(Case::UpperSnake).separator("_"));

        let config = builder.build()?;
        config.try_deserialize::<Settings>()
    }

    /// Returns the resolved gateway configuration, falling back to the
    /// built-in defaults when the section is absent.
    pub fn gateway_config(&self) -> GatewayConfig {
        self.gateway.clone().unwrap_or_default().config()
    }
}

/// A type alias for a `Result` with the `ConfigError` error type.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults_match_engine_constants() {
        let config = GatewayConfig::default();
        assert_eq!(config.base_port, 3500);
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.reap_interval, Duration::from_secs(5));
        assert_eq!(config.probe_timeout, Duration::from_secs(15));
        assert_eq!(config.probe_interval, Duration::from_millis(200));
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.stop_grace, Duration::from_secs(3));
        assert_eq!(config.memory_limit_bytes, 128 * 1024 * 1024);
        assert_eq!(config.nano_cpus, 500_000_000);
    }

    #[test]
    fn gateway_section_overrides_defaults() {
        let gateway = Gateway {
            base_port: Some(4000),
            idle_timeout_secs: Some(60),
            ..Gateway::default()
        };

        let config = gateway.config();
        assert_eq!(config.base_port, 4000);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.reap_interval, Duration::from_secs(5));
    }
}
