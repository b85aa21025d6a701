use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Service configuration read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub crm_base_url: String,
    pub crm_api_key: String,
    pub crm_site_key: String,
    pub zoom_settings_path: PathBuf,
    pub zoom_accounts_path: PathBuf,
    pub api_auth_token: Option<String>,
    pub is_production: bool,
    pub port: u16,
    pub sentry_dsn: Option<String>,
}

/// Load `.env` if present, then read the environment
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenv::dotenv();
    Config::from_env()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let port = match optional("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 3000,
        };

        let is_production = optional("ENVIRONMENT")
            .map(|val| val.to_lowercase() == "production")
            .unwrap_or(false);

        Ok(Self {
            crm_base_url: required("CRM_BASE_URL")?,
            crm_api_key: required("CRM_API_KEY")?,
            crm_site_key: required("CRM_SITE_KEY")?,
            zoom_settings_path: optional("ZOOM_SETTINGS_PATH")
                .unwrap_or_else(|| "zoom_settings.json".to_string())
                .into(),
            zoom_accounts_path: optional("ZOOM_ACCOUNTS_PATH")
                .unwrap_or_else(|| "zoom_accounts.csv".to_string())
                .into(),
            api_auth_token: optional("API_AUTH_TOKEN"),
            is_production,
            port,
            sentry_dsn: optional("SENTRY_DSN"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("CRM_BASE_URL", "https://crm.example.org"),
        ("CRM_API_KEY", "api-key"),
        ("CRM_SITE_KEY", "site-key"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.port, 3000);
        assert!(!config.is_production);
        assert!(config.api_auth_token.is_none());
        assert_eq!(config.zoom_settings_path, PathBuf::from("zoom_settings.json"));
        assert_eq!(config.zoom_accounts_path, PathBuf::from("zoom_accounts.csv"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PORT", "8080"),
            ("ENVIRONMENT", "Production"),
            ("API_AUTH_TOKEN", "secret"),
            ("SENTRY_DSN", ""),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.is_production);
        assert_eq!(config.api_auth_token.as_deref(), Some("secret"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("CRM_SITE_KEY"));

        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }
}
