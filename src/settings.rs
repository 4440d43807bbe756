//! Environment-driven settings. `.env` is honoured via dotenvy.

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(ConfigError::Settings(format!(
                "HOSPITAL_STORE must be postgres or memory, got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub store: StoreKind,
    pub db_schema: String,
    pub max_connections: u32,
    pub apply_schema: bool,
    pub bind: SocketAddr,
    pub body_limit: usize,
    pub session_capacity: usize,
    pub session_idle: Duration,
}

impl Settings {
    /// Load `.env` (if present) and read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| get(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string());

        let db_schema = var("HOSPITAL_DB_SCHEMA", "public");
        if !crate::sql::is_identifier(&db_schema) {
            return Err(ConfigError::Settings(format!("HOSPITAL_DB_SCHEMA is not an identifier: {}", db_schema)));
        }
        Ok(Settings {
            database_url: var("DATABASE_URL", "postgres://localhost/hospital"),
            store: var("HOSPITAL_STORE", "postgres").parse()?,
            db_schema,
            max_connections: parse("HOSPITAL_DB_MAX_CONNECTIONS", &var("HOSPITAL_DB_MAX_CONNECTIONS", "5"))?,
            apply_schema: parse_bool("HOSPITAL_APPLY_SCHEMA", &var("HOSPITAL_APPLY_SCHEMA", "false"))?,
            bind: parse("HOSPITAL_BIND", &var("HOSPITAL_BIND", "0.0.0.0:3000"))?,
            body_limit: parse("HOSPITAL_BODY_LIMIT", &var("HOSPITAL_BODY_LIMIT", "65536"))?,
            session_capacity: parse("HOSPITAL_SESSION_CAPACITY", &var("HOSPITAL_SESSION_CAPACITY", "1024"))?,
            session_idle: Duration::from_secs(parse(
                "HOSPITAL_SESSION_IDLE_SECS",
                &var("HOSPITAL_SESSION_IDLE_SECS", "1800"),
            )?),
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::Settings(format!("{}: {}", key, e)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Settings(format!("{}: expected a boolean, got '{}'", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, "postgres://localhost/hospital");
        assert_eq!(s.store, StoreKind::Postgres);
        assert_eq!(s.db_schema, "public");
        assert_eq!(s.max_connections, 5);
        assert!(!s.apply_schema);
        assert_eq!(s.bind.port(), 3000);
        assert_eq!(s.body_limit, 65536);
        assert_eq!(s.session_capacity, 1024);
        assert_eq!(s.session_idle, Duration::from_secs(1800));
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("HOSPITAL_STORE", "memory"),
            ("HOSPITAL_APPLY_SCHEMA", "yes"),
            ("HOSPITAL_BIND", "127.0.0.1:8080"),
        ])
        .unwrap();
        assert_eq!(s.store, StoreKind::Memory);
        assert!(s.apply_schema);
        assert_eq!(s.bind.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn invalid_values_are_settings_errors() {
        assert!(matches!(settings(&[("HOSPITAL_STORE", "sqlite")]), Err(ConfigError::Settings(_))));
        assert!(matches!(settings(&[("HOSPITAL_DB_MAX_CONNECTIONS", "many")]), Err(ConfigError::Settings(_))));
        assert!(matches!(settings(&[("HOSPITAL_DB_SCHEMA", "bad-schema")]), Err(ConfigError::Settings(_))));
        assert!(matches!(settings(&[("HOSPITAL_SESSION_IDLE_SECS", "-1")]), Err(ConfigError::Settings(_))));
    }
}
