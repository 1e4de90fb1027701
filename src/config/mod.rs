use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use url::Url;

use crate::observability::LogFormat;

/// Longest session lifetime accepted (one year).
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Errors found while validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("session secret cannot be empty")]
    EmptySecret,

    #[error("session TTL must be greater than zero")]
    ZeroTtl,

    #[error("session TTL ({ttl_secs}s) exceeds the maximum of {max_secs}s")]
    TtlTooLong { ttl_secs: u64, max_secs: u64 },

    #[error("session refresh interval ({refresh_secs}s) must be shorter than the TTL ({ttl_secs}s)")]
    RefreshNotBeforeExpiry { refresh_secs: u64, ttl_secs: u64 },

    #[error("sign-in path must start with '/': {0}")]
    InvalidSigninPath(String),
}

/// Rule gate service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "rulegate")]
#[command(about = "Authenticated front-end for composing event validation rules")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:3000", env = "RULEGATE_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Full URL of the login endpoint
    #[arg(long, env = "RULEGATE_LOGIN_URL")]
    pub login_url: String,

    /// Full URL of the rule creation endpoint
    #[arg(long, env = "RULEGATE_CREATE_RULES_URL")]
    pub create_rules_url: String,

    /// Secret used to sign session tokens
    #[arg(long, env = "RULEGATE_SESSION_SECRET", hide_env_values = true)]
    pub session_secret: String,

    /// Session lifetime in seconds
    #[arg(long, default_value = "2592000", env = "RULEGATE_SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,

    /// Age in seconds after which a valid session token is re-issued
    #[arg(long, default_value = "180", env = "RULEGATE_SESSION_REFRESH_SECS")]
    pub session_refresh_secs: u64,

    /// Route unauthenticated visitors are redirected to
    #[arg(long, default_value = "/signin", env = "RULEGATE_SIGNIN_PATH")]
    pub signin_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "RULEGATE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "RULEGATE_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "RULEGATE_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

/// The two remote endpoints and the signing secret, validated together.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub login_url: Url,
    pub create_rules_url: Url,
    pub session_secret: String,
}

impl Config {
    /// Get session TTL as Duration.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Get session refresh interval as Duration.
    pub fn session_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.session_refresh_secs)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Check every option, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints()?;

        if self.session_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        if self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::TtlTooLong {
                ttl_secs: self.session_ttl_secs,
                max_secs: MAX_SESSION_TTL_SECS,
            });
        }
        if self.session_refresh_secs >= self.session_ttl_secs {
            return Err(ConfigError::RefreshNotBeforeExpiry {
                refresh_secs: self.session_refresh_secs,
                ttl_secs: self.session_ttl_secs,
            });
        }
        if !self.signin_path.starts_with('/') {
            return Err(ConfigError::InvalidSigninPath(self.signin_path.clone()));
        }

        Ok(())
    }

    /// Parse the endpoint URLs and check the secret.
    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        let login_url = Url::parse(&self.login_url).map_err(|source| ConfigError::InvalidUrl {
            name: "login URL",
            source,
        })?;
        let create_rules_url =
            Url::parse(&self.create_rules_url).map_err(|source| ConfigError::InvalidUrl {
                name: "create rules URL",
                source,
            })?;

        if self.session_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        Ok(Endpoints {
            login_url,
            create_rules_url,
            session_secret: self.session_secret.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:3000".to_string(),
            login_url: "http://localhost:8000/api/auth/login".to_string(),
            create_rules_url: "http://localhost:3001/api/create_rules".to_string(),
            session_secret: String::new(),
            session_ttl_secs: 2_592_000,
            session_refresh_secs: 180,
            signin_path: "/signin".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            graceful_shutdown: true,
            shutdown_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            session_secret: "test-secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.session_refresh_secs, 180);
        assert_eq!(config.signin_path, "/signin");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config {
            session_ttl_secs: 3600,
            session_refresh_secs: 60,
            shutdown_timeout_secs: 15,
            ..Default::default()
        };

        assert_eq!(config.session_ttl(), Duration::from_secs(3600));
        assert_eq!(config.session_refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(config.validate().is_ok());

        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.login_url.path(), "/api/auth/login");
        assert_eq!(endpoints.create_rules_url.port(), Some(3001));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::EmptySecret)));
    }

    #[test]
    fn test_bad_url_rejected() {
        let config = Config {
            create_rules_url: "not a url".to_string(),
            ..valid_config()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("create rules URL"));
    }

    #[test]
    fn test_refresh_must_precede_expiry() {
        let config = Config {
            session_ttl_secs: 60,
            session_refresh_secs: 60,
            ..valid_config()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::RefreshNotBeforeExpiry { .. })
        ));
    }

    #[test]
    fn test_ttl_upper_bound() {
        let at_limit = Config {
            session_ttl_secs: MAX_SESSION_TTL_SECS,
            ..valid_config()
        };
        assert!(at_limit.validate().is_ok());

        let config = Config {
            session_ttl_secs: u64::MAX,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TtlTooLong { ttl_secs: u64::MAX, .. })
        ));
    }

    #[test]
    fn test_signin_path_must_be_absolute() {
        let config = Config {
            signin_path: "signin".to_string(),
            ..valid_config()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSigninPath(_))
        ));
    }
}
