//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::registry::{BETTING_SERVICE, RISK_MANAGEMENT_SERVICE, WALLET_SERVICE};
use saga::{ServiceRegistry, SweeperConfig};

const DEFAULT_BETTING_URL: &str = "http://betting_service:8002";
const DEFAULT_RISK_URL: &str = "http://risk_management_service:8003";
const DEFAULT_WALLET_URL: &str = "http://wallet_service:8004";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT` (default `0.0.0.0:8008`)
/// - `RUST_LOG` tracing filter (default `info`), `LOG_FORMAT=json` for JSON lines
/// - `DATABASE_URL`; the in-memory store is used when unset
/// - `SAGA_WORKERS`, `SAGA_TIMEOUT_SWEEP_SECS`, `SAGA_RETRY_SWEEP_SECS`,
///   `SAGA_SERVICE_TIMEOUT_SECS`
/// - `BETTING_SERVICE_URL`, `WALLET_SERVICE_URL`, `RISK_SERVICE_URL`
/// - `SAGA_SERVICES`: extra `name=url` pairs, comma separated
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    pub database_url: Option<String>,
    pub workers: usize,
    pub timeout_sweep_interval: Duration,
    pub retry_sweep_interval: Duration,
    pub service_timeout: Duration,
    pub services: Vec<(String, String)>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let seconds = |key: &str, fallback: Duration| {
            parsed(key)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let mut services = vec![
            (
                BETTING_SERVICE.to_string(),
                lookup("BETTING_SERVICE_URL").unwrap_or_else(|| DEFAULT_BETTING_URL.to_string()),
            ),
            (
                WALLET_SERVICE.to_string(),
                lookup("WALLET_SERVICE_URL").unwrap_or_else(|| DEFAULT_WALLET_URL.to_string()),
            ),
            (
                RISK_MANAGEMENT_SERVICE.to_string(),
                lookup("RISK_SERVICE_URL").unwrap_or_else(|| DEFAULT_RISK_URL.to_string()),
            ),
        ];
        if let Some(extra) = lookup("SAGA_SERVICES") {
            services.extend(parse_services(&extra));
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            json_logs: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            workers: parsed("SAGA_WORKERS")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.workers),
            timeout_sweep_interval: seconds(
                "SAGA_TIMEOUT_SWEEP_SECS",
                defaults.timeout_sweep_interval,
            ),
            retry_sweep_interval: seconds("SAGA_RETRY_SWEEP_SECS", defaults.retry_sweep_interval),
            service_timeout: seconds("SAGA_SERVICE_TIMEOUT_SECS", defaults.service_timeout),
            services,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Service registry built from the configured URLs. Later entries win.
    pub fn registry(&self) -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        for (name, url) in &self.services {
            registry.insert(name.as_str(), url.as_str());
        }
        registry
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            timeout_interval: self.timeout_sweep_interval,
            retry_interval: self.retry_sweep_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let sweeps = SweeperConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8008,
            log_level: "info".to_string(),
            json_logs: false,
            database_url: None,
            workers: 4,
            timeout_sweep_interval: sweeps.timeout_interval,
            retry_sweep_interval: sweeps.retry_interval,
            service_timeout: Duration::from_secs(30),
            services: vec![
                (BETTING_SERVICE.to_string(), DEFAULT_BETTING_URL.to_string()),
                (WALLET_SERVICE.to_string(), DEFAULT_WALLET_URL.to_string()),
                (
                    RISK_MANAGEMENT_SERVICE.to_string(),
                    DEFAULT_RISK_URL.to_string(),
                ),
            ],
        }
    }
}

/// Parses `name=url,name=url`, skipping malformed pairs.
fn parse_services(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, url) = pair.split_once('=')?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                tracing::warn!(pair, "ignoring malformed SAGA_SERVICES entry");
                return None;
            }
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}
