use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
    pub page_size: u32,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let config = Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 480)?,
            page_size: parse_or(&lookup, "PAGE_SIZE", 15)?,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", false)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "PAGE_SIZE",
                value: self.page_size.to_string(),
            });
        }
        if self.jwt_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_TTL_MINUTES",
                value: self.jwt_ttl_minutes.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
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
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/aportes"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.page_size, 15);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_missing_database_url() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "secret")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_page_size() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/aportes"),
            ("JWT_SECRET", "secret"),
            ("PAGE_SIZE", "zero"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PAGE_SIZE", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/aportes"),
            ("JWT_SECRET", "secret"),
            ("PAGE_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PAGE_SIZE", .. }));
    }
}
