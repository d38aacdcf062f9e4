//! Process configuration read from the environment.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://inventory.db";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub admin_username: String,
    pub admin_password: String,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url)
            .field("token_ttl", &self.token_ttl)
            .field("admin_username", &self.admin_username)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match (get("BIND_ADDR"), get("PORT")) {
            (Some(addr), _) => addr.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: format!("{e}"),
            })?,
            (None, Some(port)) => {
                let port: u16 = port.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: "PORT",
                    reason: format!("{e}"),
                })?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let token_ttl = match get("TOKEN_TTL_MINUTES") {
            Some(raw) => {
                let minutes: i64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: "TOKEN_TTL_MINUTES",
                    reason: format!("{e}"),
                })?;
                if minutes <= 0 {
                    return Err(ConfigError::Invalid {
                        key: "TOKEN_TTL_MINUTES",
                        reason: "must be positive".to_string(),
                    });
                }
                Duration::try_minutes(minutes).ok_or_else(|| ConfigError::Invalid {
                    key: "TOKEN_TTL_MINUTES",
                    reason: format!("{minutes} minutes is out of range"),
                })?
            }
            None => Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            token_ttl,
            admin_username: get("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            admin_password: get("ADMIN_PASSWORD").unwrap_or_else(|| "admin123".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.token_ttl, Duration::hours(24));
        assert_eq!(cfg.admin_username, "admin");
        assert_eq!(cfg.admin_password, "admin123");
    }

    #[test]
    fn port_overrides_default_port_only() {
        let cfg = config(&[("PORT", "8081")]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8081");

        let cfg = config(&[("PORT", "8081"), ("BIND_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = config(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = config(&[("TOKEN_TTL_MINUTES", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOKEN_TTL_MINUTES", .. }));
    }

    #[test]
    fn oversized_ttl_is_an_error_not_a_panic() {
        let err = config(&[("TOKEN_TTL_MINUTES", "999999999999999")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOKEN_TTL_MINUTES", .. }));

        let cfg = config(&[("TOKEN_TTL_MINUTES", "90")]).unwrap();
        assert_eq!(cfg.token_ttl, Duration::minutes(90));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn debug_hides_secrets() {
        let cfg = config(&[("JWT_SECRET", "topsecret"), ("ADMIN_PASSWORD", "hunter2")]).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("hunter2"));
    }
}
