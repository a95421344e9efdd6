use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::capabilities::{is_private_host, UrlPolicy, MAX_TIMEOUT_MS};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub const ENV_API_BASE_URL: &str = "AJALI_API_BASE_URL";
pub const ENV_API_BASE_URL_LEGACY: &str = "VITE_API_BASE_URL";
pub const ENV_MAP_API_KEY: &str = "AJALI_MAP_API_KEY";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "AJALI_REQUEST_TIMEOUT_MS";
pub const ENV_ALLOW_PRIVATE_NETWORK: &str = "AJALI_ALLOW_PRIVATE_NETWORK";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid request timeout '{value}': must be 1..={max} ms")]
    InvalidTimeout { value: String, max: u64 },

    #[error("invalid value '{value}' for {name}: expected true or false")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub map_api_key: Option<SecretString>,
    pub request_timeout_ms: u64,
    /// Lets requests reach loopback and private-range hosts.
    pub allow_private_network: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            map_api_key: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            allow_private_network: true,
        }
    }
}

impl AppConfig {
    /// Reads the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => debug!(error = %e, "ignoring unreadable .env"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = get(ENV_API_BASE_URL)
            .or_else(|| get(ENV_API_BASE_URL_LEGACY))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let request_timeout_ms = match get(ENV_REQUEST_TIMEOUT_MS) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidTimeout {
                value: raw.clone(),
                max: MAX_TIMEOUT_MS,
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        let allow_private_network = match get(ENV_ALLOW_PRIVATE_NETWORK) {
            Some(raw) => parse_flag(ENV_ALLOW_PRIVATE_NETWORK, &raw)?,
            None => base_url_is_local(&api_base_url),
        };

        let config = Self {
            api_base_url,
            map_api_key: get(ENV_MAP_API_KEY).map(SecretString::new),
            request_timeout_ms,
            allow_private_network,
        };
        config.validate()?;

        info!(
            api_base_url = %config.api_base_url,
            timeout_ms = config.request_timeout_ms,
            map_enabled = config.map_api_key.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: self.api_base_url.clone(),
            reason: reason.to_string(),
        };
        let parsed = url::Url::parse(&self.api_base_url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::InvalidTimeout {
                value: self.request_timeout_ms.to_string(),
                max: MAX_TIMEOUT_MS,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn url_policy(&self) -> UrlPolicy {
        if self.allow_private_network {
            UrlPolicy::AllowPrivate
        } else {
            UrlPolicy::PublicOnly
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_map_api_key(mut self, key: impl Into<String>) -> Self {
        self.map_api_key = Some(SecretString::new(key.into()));
        self
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: raw.to_string(),
        }),
    }
}

/// A backend on loopback or a private range is trusted by default.
fn base_url_is_local(base_url: &str) -> bool {
    url::Url::parse(base_url)
        .ok()
        .and_then(|parsed| parsed.host().map(|host| is_private_host(&host)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_target_local_backend() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert!(config.map_api_key.is_none());
        assert_eq!(config.url_policy(), UrlPolicy::AllowPrivate);
    }

    #[test]
    fn test_legacy_variable_and_trailing_slash() {
        let config = AppConfig::from_lookup(lookup(&[(
            ENV_API_BASE_URL_LEGACY,
            "https://ajali.example.org/api/v1/",
        )]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://ajali.example.org/api/v1");
        assert_eq!(config.url_policy(), UrlPolicy::PublicOnly);
    }

    #[test]
    fn test_primary_variable_wins() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_BASE_URL, "https://primary.example.org/api/v1"),
            (ENV_API_BASE_URL_LEGACY, "https://legacy.example.org/api/v1"),
            (ENV_MAP_API_KEY, "maps-key"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://primary.example.org/api/v1");
        assert_eq!(
            config.map_api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("maps-key")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(ENV_API_BASE_URL, "ftp://files.example.org")])),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_MS, "soon")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_MS, "0")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(ENV_ALLOW_PRIVATE_NETWORK, "maybe")])),
            Err(ConfigError::InvalidFlag { .. })
        ));
    }

    #[test]
    fn test_private_network_override() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_BASE_URL, "http://192.168.1.20:5000/api/v1"),
            (ENV_ALLOW_PRIVATE_NETWORK, "false"),
        ]))
        .unwrap();
        assert_eq!(config.url_policy(), UrlPolicy::PublicOnly);
        assert!(base_url_is_local("http://10.0.0.5/api"));
        assert!(base_url_is_local("http://localhost:5000"));
        assert!(!base_url_is_local("https://ajali.example.org"));
    }

    #[test]
    fn test_debug_redacts_map_key() {
        let config = AppConfig::default().with_map_api_key("very-secret-key");
        assert!(!format!("{config:?}").contains("very-secret-key"));
    }
}
