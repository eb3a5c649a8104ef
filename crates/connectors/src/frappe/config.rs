use crate::error::ConfigError;
use reqwest::Url;
use std::{collections::HashMap, fmt, time::Duration};

pub const URL_VAR: &str = "FRAPPE_URL";
pub const API_KEY_VAR: &str = "FRAPPE_API_KEY";
pub const API_SECRET_VAR: &str = "FRAPPE_API_SECRET";
pub const TIMEOUT_VAR: &str = "FRAPPE_TIMEOUT_SECS";
pub const METHOD_ROOT_VAR: &str = "FRAPPE_METHOD_ROOT";

pub const DEFAULT_METHOD_ROOT: &str =
    "custom_import_app.custom_import_app.doctype.data_import_custom.data_import_custom";
pub const DEFAULT_DOCTYPE: &str = "Data Import Custom";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings of one Frappe site.
#[derive(Clone)]
pub struct FrappeConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Deadline of every request.
    pub timeout: Duration,
    /// Dotted module path of the whitelisted import methods.
    pub method_root: String,
    pub doctype: String,
}

impl FrappeConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        Ok(FrappeConfig {
            base_url,
            api_key: None,
            api_secret: None,
            timeout: DEFAULT_TIMEOUT,
            method_root: DEFAULT_METHOD_ROOT.to_string(),
            doctype: DEFAULT_DOCTYPE.to_string(),
        })
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_method_root(mut self, method_root: impl Into<String>) -> Self {
        self.method_root = method_root.into();
        self
    }

    /// `Authorization` header value, when both halves of the key are set.
    pub fn auth_header(&self) -> Option<String> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(format!("token {key}:{secret}"))
            }
            _ => None,
        }
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let url = get(URL_VAR).ok_or(ConfigError::Missing(URL_VAR))?;
        let mut config = FrappeConfig::new(url)?;

        if let (Some(key), Some(secret)) = (get(API_KEY_VAR), get(API_SECRET_VAR)) {
            config = config.with_credentials(key, secret);
        }

        if let Some(raw) = get(TIMEOUT_VAR) {
            let secs = raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: TIMEOUT_VAR,
                    value: raw.to_string(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(root) = get(METHOD_ROOT_VAR) {
            config.method_root = root.to_string();
        }

        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }
}

impl fmt::Debug for FrappeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrappeConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("method_root", &self.method_root)
            .field("doctype", &self.doctype)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn loads_site_and_credentials() {
        let config = FrappeConfig::from_vars(&vars(&[
            (URL_VAR, "https://erp.example.com"),
            (API_KEY_VAR, "abc"),
            (API_SECRET_VAR, "xyz"),
            (TIMEOUT_VAR, "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.as_str(), "https://erp.example.com/");
        assert_eq!(config.auth_header().as_deref(), Some("token abc:xyz"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.method_root, DEFAULT_METHOD_ROOT);
        assert!(!format!("{config:?}").contains("xyz"));
    }

    #[test]
    fn url_is_required() {
        assert_eq!(
            FrappeConfig::from_vars(&HashMap::new()).unwrap_err(),
            ConfigError::Missing(URL_VAR)
        );
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = FrappeConfig::from_vars(&vars(&[
            (URL_VAR, "http://localhost:8000"),
            (TIMEOUT_VAR, "never"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Invalid {
                key: TIMEOUT_VAR,
                value: "never".into()
            }
        );
    }

    #[test]
    fn half_a_key_sends_no_auth() {
        let config = FrappeConfig::from_vars(&vars(&[
            (URL_VAR, "http://localhost:8000"),
            (API_KEY_VAR, "abc"),
        ]))
        .unwrap();
        assert_eq!(config.auth_header(), None);
    }
}
