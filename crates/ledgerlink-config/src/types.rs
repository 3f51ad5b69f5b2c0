use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Application type, selecting which authorization flow is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    /// Direct flow: HMAC-SHA1 signed requests, full-access default scope.
    #[default]
    Public,
    /// Delegated/partner flow: RSA-SHA1 signed requests with a private key.
    Partner,
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Partner => write!(f, "partner"),
        }
    }
}

impl FromStr for AppType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "partner" => Ok(Self::Partner),
            other => Err(ConfigError::Invalid {
                message: format!("unknown app type '{other}', expected 'public' or 'partner'"),
            }),
        }
    }
}

/// Credential bundle for one application type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderCredentials {
    /// OAuth consumer key issued by the provider.
    pub consumer_key: String,
    /// OAuth consumer secret issued by the provider.
    pub consumer_secret: String,
    /// Callback URL the provider redirects to after user approval.
    pub authorize_callback_url: String,
    /// User-agent string sent on every provider call.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Path to a PEM private key file (partner flow signing).
    #[serde(default)]
    pub private_key_path: Option<String>,
    /// Resolved private key PEM. Populated by the loader from
    /// `private_key_path`; an unreadable path degrades to an empty key.
    #[serde(default)]
    pub private_key: String,
}

fn default_user_agent() -> String {
    "LedgerLink".to_string()
}

/// Provider endpoint URLs.
///
/// Defaults target the accounting provider's public API. Overridable so
/// tests can point at a local mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    /// Request-token issuance endpoint (first leg).
    pub request_token_url: String,
    /// User-facing authorize page (second leg).
    pub authorize_url: String,
    /// Verifier-to-access-token exchange endpoint (third leg).
    pub access_token_url: String,
    /// Base URL for authenticated resource calls.
    pub api_base_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            request_token_url: "https://api.xero.com/oauth/RequestToken".to_string(),
            authorize_url: "https://api.xero.com/oauth/Authorize".to_string(),
            access_token_url: "https://api.xero.com/oauth/AccessToken".to_string(),
            api_base_url: "https://api.xero.com/api.xro/2.0".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3100,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level, overridable via RUST_LOG.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Top-level application configuration.
///
/// Loaded once at startup and treated as immutable thereafter. Per-session
/// access tokens are never merged into this value; they travel with the
/// session and are combined with the credential bundle when a client handle
/// is constructed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Selected application type.
    #[serde(default)]
    pub app_type: AppType,
    /// Credentials for the public (direct) flow.
    #[serde(default)]
    pub public: Option<ProviderCredentials>,
    /// Credentials for the partner (delegated) flow.
    #[serde(default)]
    pub partner: Option<ProviderCredentials>,
    /// Provider endpoint URLs.
    #[serde(default)]
    pub endpoints: ProviderEndpoints,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Returns the credential bundle for the active application type.
    pub fn credentials(&self) -> Result<&ProviderCredentials, ConfigError> {
        let creds = match self.app_type {
            AppType::Public => self.public.as_ref(),
            AppType::Partner => self.partner.as_ref(),
        };
        creds.ok_or_else(|| ConfigError::Missing {
            app_type: self.app_type.to_string(),
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be > 0".to_string(),
            });
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!("logging.level must be one of {valid_levels:?}"),
            });
        }

        let creds = self.credentials()?;
        if creds.consumer_key.is_empty() || creds.consumer_secret.is_empty() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "credentials for app type '{}' must set consumer_key and consumer_secret",
                    self.app_type
                ),
            });
        }
        if creds.authorize_callback_url.is_empty() {
            return Err(ConfigError::Invalid {
                message: "authorize_callback_url must not be empty".to_string(),
            });
        }
        url::Url::parse(&creds.authorize_callback_url).map_err(|e| ConfigError::Invalid {
            message: format!("authorize_callback_url is not a valid URL: {e}"),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            app_type: AppType::Public,
            public: Some(ProviderCredentials {
                consumer_key: "ck".to_string(),
                consumer_secret: "cs".to_string(),
                authorize_callback_url: "http://localhost:3100/access".to_string(),
                user_agent: "LedgerLink".to_string(),
                private_key_path: None,
                private_key: String::new(),
            }),
            ..AppConfig::default()
        }
    }

    #[test]
    fn app_type_parses_case_insensitively() {
        assert_eq!("PUBLIC".parse::<AppType>().unwrap(), AppType::Public);
        assert_eq!("Partner".parse::<AppType>().unwrap(), AppType::Partner);
        assert!("internal".parse::<AppType>().is_err());
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let cfg = AppConfig {
            app_type: AppType::Partner,
            ..valid_config()
        };
        // Public credentials are set, but partner is the active type.
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn validate_rejects_empty_consumer_key() {
        let mut cfg = valid_config();
        cfg.public.as_mut().unwrap().consumer_key.clear();
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn validate_rejects_bad_callback_url() {
        let mut cfg = valid_config();
        cfg.public.as_mut().unwrap().authorize_callback_url = "not a url".to_string();
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn endpoints_default_to_provider_api() {
        let ep = ProviderEndpoints::default();
        assert!(ep.request_token_url.starts_with("https://"));
        assert!(ep.api_base_url.starts_with("https://"));
    }
}
