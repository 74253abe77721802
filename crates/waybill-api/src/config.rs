//! Configuration management for the waybill tracking service.

use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use waybill_core::{
    carrier::default_rules, CarrierResolver, CarrierRule, DiagnosticSink, HttpDiagnosticSink,
    IngestPolicy, MulticastDiagnosticSink, NoOpDiagnosticSink, TracingDiagnosticSink,
};

use crate::ServerLimits;

const CONFIG_FILE: &str = "config.toml";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// The carrier table can only be set from the file:
///
/// ```toml
/// [[carriers]]
/// name = "DHL"
/// url_fragment = "dhl."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Maximum webhook body size in bytes.
    ///
    /// Environment variable: `MAX_PAYLOAD_BYTES`
    #[serde(default = "default_max_payload_bytes", alias = "MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: usize,

    // Database
    /// PostgreSQL connection URL.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default = "default_database_url", alias = "DATABASE_URL")]
    pub database_url: String,
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,
    /// Minimum number of connections to maintain in the pool.
    ///
    /// Environment variable: `DATABASE_MIN_CONNECTIONS`
    #[serde(default = "default_min_connections", alias = "DATABASE_MIN_CONNECTIONS")]
    pub database_min_connections: u32,
    /// Database connection acquire timeout in seconds.
    ///
    /// Environment variable: `DATABASE_CONNECTION_TIMEOUT`
    #[serde(default = "default_acquire_timeout", alias = "DATABASE_CONNECTION_TIMEOUT")]
    pub database_connection_timeout: u64,

    // Ingestion
    /// Answer `200` to the provider for every rejected update.
    ///
    /// Environment variable: `ALWAYS_ACKNOWLEDGE`
    #[serde(default = "default_always_acknowledge", alias = "ALWAYS_ACKNOWLEDGE")]
    pub always_acknowledge: bool,
    /// Ordered carrier table. First matching rule wins.
    #[serde(default = "default_rules")]
    pub carriers: Vec<CarrierRule>,

    // Diagnostics
    /// Emit a diagnostic record for every webhook call.
    ///
    /// Environment variable: `DIAGNOSTICS_ENABLED`
    #[serde(default = "default_diagnostics_enabled", alias = "DIAGNOSTICS_ENABLED")]
    pub diagnostics_enabled: bool,
    /// Optional URL diagnostic records are posted to.
    ///
    /// Environment variable: `DIAGNOSTICS_URL`
    #[serde(default, alias = "DIAGNOSTICS_URL")]
    pub diagnostics_url: Option<String>,
    /// Timeout for posting a diagnostic record in seconds.
    ///
    /// Environment variable: `DIAGNOSTICS_TIMEOUT_SECONDS`
    #[serde(default = "default_diagnostics_timeout", alias = "DIAGNOSTICS_TIMEOUT_SECONDS")]
    pub diagnostics_timeout_seconds: u64,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::prefixed("")),
        )
    }

    /// Extracts and validates configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Get database URL with password masked for logging.
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let mut masked = self.database_url.clone();
                masked.replace_range(colon_pos + 1..at_pos, "***");
                return masked;
            }
        }
        self.database_url.clone()
    }

    /// Acknowledgement policy for the ingestor.
    pub fn ingest_policy(&self) -> IngestPolicy {
        IngestPolicy { always_acknowledge: self.always_acknowledge }
    }

    /// Carrier resolver over the configured table.
    pub fn carrier_resolver(&self) -> CarrierResolver {
        CarrierResolver::new(self.carriers.clone())
    }

    /// Router limits.
    pub fn server_limits(&self) -> ServerLimits {
        ServerLimits {
            request_timeout: Duration::from_secs(self.request_timeout),
            max_payload_bytes: self.max_payload_bytes,
        }
    }

    /// Builds the diagnostic sink chain.
    ///
    /// Disabled diagnostics yield a no-op sink. Otherwise records go to the
    /// log, and also to `diagnostics_url` when one is set.
    pub fn diagnostic_sink(&self) -> Result<Arc<dyn DiagnosticSink>> {
        if !self.diagnostics_enabled {
            return Ok(Arc::new(NoOpDiagnosticSink::new()));
        }

        let mut sink = MulticastDiagnosticSink::new();
        sink.add_subscriber(Arc::new(TracingDiagnosticSink::new()));

        if let Some(url) = self.diagnostics_url.as_deref().filter(|url| !url.is_empty()) {
            let http = HttpDiagnosticSink::new(
                url,
                Duration::from_secs(self.diagnostics_timeout_seconds),
            )
            .context("Failed to build diagnostics HTTP client")?;
            sink.add_subscriber(Arc::new(http));
        }

        Ok(Arc::new(sink))
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.max_payload_bytes == 0 {
            anyhow::bail!("max_payload_bytes must be greater than 0");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("database max_connections must be greater than 0");
        }

        if self.database_min_connections > self.database_max_connections {
            anyhow::bail!("database min_connections cannot exceed max_connections");
        }

        if let Some(rule) = self.carriers.iter().find(|rule| rule.url_fragment.is_empty()) {
            anyhow::bail!("carrier {:?} has an empty url_fragment", rule.name);
        }

        if let Some(url) = self.diagnostics_url.as_deref().filter(|url| !url.is_empty()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("diagnostics_url must be an http(s) URL");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_payload_bytes: default_max_payload_bytes(),
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            database_min_connections: default_min_connections(),
            database_connection_timeout: default_acquire_timeout(),
            always_acknowledge: default_always_acknowledge(),
            carriers: default_rules(),
            diagnostics_enabled: default_diagnostics_enabled(),
            diagnostics_url: None,
            diagnostics_timeout_seconds: default_diagnostics_timeout(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_payload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_database_url() -> String {
    "postgresql://localhost/waybill".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_always_acknowledge() -> bool {
    true
}

fn default_diagnostics_enabled() -> bool {
    true
}

fn default_diagnostics_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
