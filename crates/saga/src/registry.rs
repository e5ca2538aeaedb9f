//! Service locator mapping logical service names to base URLs.

use std::collections::HashMap;

use crate::client::ServiceCallError;

/// Logical name of the betting service.
pub const BETTING_SERVICE: &str = "betting_service";
/// Logical name of the wallet service.
pub const WALLET_SERVICE: &str = "wallet_service";
/// Logical name of the risk management service.
pub const RISK_MANAGEMENT_SERVICE: &str = "risk_management_service";

/// Static registry of collaborating services, fixed at orchestrator construction.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service. A trailing slash on the base URL is dropped.
    pub fn with_service(mut self, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.insert(name, base_url);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, base_url: impl Into<String>) {
        let base_url = base_url.into();
        self.services
            .insert(name.into(), base_url.trim_end_matches('/').to_string());
    }

    pub fn base_url(&self, name: &str) -> Option<&str> {
        self.services.get(name).map(String::as_str)
    }

    /// Joins a service's base URL with `endpoint`.
    pub fn resolve(&self, name: &str, endpoint: &str) -> Result<String, ServiceCallError> {
        let base = self
            .base_url(name)
            .ok_or_else(|| ServiceCallError::UnknownService(name.to_string()))?;
        if endpoint.starts_with('/') {
            Ok(format!("{base}{endpoint}"))
        } else {
            Ok(format!("{base}/{endpoint}"))
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<N: Into<String>, U: Into<String>> FromIterator<(N, U)> for ServiceRegistry {
    fn from_iter<I: IntoIterator<Item = (N, U)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (name, url) in iter {
            registry.insert(name, url);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_joins_paths() {
        let registry = ServiceRegistry::new().with_service(WALLET_SERVICE, "http://wallet:8000/");

        assert_eq!(
            registry.resolve(WALLET_SERVICE, "/api/debit/").unwrap(),
            "http://wallet:8000/api/debit/"
        );
        assert_eq!(
            registry.resolve(WALLET_SERVICE, "api/debit/").unwrap(),
            "http://wallet:8000/api/debit/"
        );
    }

    #[test]
    fn test_unknown_service() {
        let registry = ServiceRegistry::new();
        let err = registry.resolve("nope", "/x").unwrap_err();
        assert!(matches!(err, ServiceCallError::UnknownService(name) if name == "nope"));
    }

    #[test]
    fn test_from_iter() {
        let registry: ServiceRegistry =
            [(BETTING_SERVICE, "http://betting"), (RISK_MANAGEMENT_SERVICE, "http://risk")]
                .into_iter()
                .collect();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.base_url(RISK_MANAGEMENT_SERVICE), Some("http://risk"));
    }
}
