//! Server settings from the environment (a `.env` file is honoured via dotenvy).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    /// Schema holding the entity tables.
    pub database_schema: String,
    pub max_connections: u32,
    pub bind: SocketAddr,
    pub body_limit_bytes: usize,
    /// Replaces the built-in entity catalog when set.
    pub catalog_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/tournament".into()),
            database_schema: get("DATABASE_SCHEMA").unwrap_or_else(|| "public".into()),
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 5)?,
            bind: parse_or("BIND_ADDR", get("BIND_ADDR"), SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            body_limit_bytes: parse_or("BODY_LIMIT_BYTES", get("BODY_LIMIT_BYTES"), 1024 * 1024)?,
            catalog_path: get("ENTITY_CATALOG_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.parse().map_err(|e: T::Err| ConfigError::Env {
            var,
            message: format!("'{}': {}", s, e),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, "postgres://localhost/tournament");
        assert_eq!(s.database_schema, "public");
        assert_eq!(s.max_connections, 5);
        assert_eq!(s.bind.port(), 3000);
        assert_eq!(s.body_limit_bytes, 1024 * 1024);
        assert!(s.catalog_path.is_none());
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("DATABASE_URL", "postgres://db/racing"),
            ("DATABASE_SCHEMA", "racing"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("ENTITY_CATALOG_PATH", "/etc/catalog.json"),
        ])
        .unwrap();
        assert_eq!(s.database_url, "postgres://db/racing");
        assert_eq!(s.database_schema, "racing");
        assert_eq!(s.max_connections, 12);
        assert_eq!(s.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(s.catalog_path, Some(PathBuf::from("/etc/catalog.json")));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let s = settings(&[("DATABASE_SCHEMA", "  ")]).unwrap();
        assert_eq!(s.database_schema, "public");
    }

    #[test]
    fn rejects_unparsable_numbers() {
        let err = settings(&[("DATABASE_MAX_CONNECTIONS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "DATABASE_MAX_CONNECTIONS", .. }));
    }
}
