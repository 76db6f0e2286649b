//! Server configuration loaded from the environment.

use std::net::SocketAddr;

use anyhow::Context;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HS256 secret shared with the hosted auth provider.
    pub jwt_secret: String,
    /// Postgres connection string; unset means an empty in-memory directory.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let raw_addr = get("GENERA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("GENERA_BIND_ADDR is not a socket address: {raw_addr:?}"))?;

        let max_connections = match get("GENERA_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("GENERA_DB_MAX_CONNECTIONS must be a positive integer, got {raw:?}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        anyhow::ensure!(max_connections > 0, "GENERA_DB_MAX_CONNECTIONS must be at least 1");

        Ok(Self {
            jwt_secret,
            database_url: get("DATABASE_URL"),
            bind_addr,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.database_url, None);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = ServerConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(" s3cret ".to_string()),
            "DATABASE_URL" => Some("postgres://localhost/genera".to_string()),
            "GENERA_BIND_ADDR" => Some("127.0.0.1:9000".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/genera"));
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let err = ServerConfig::from_lookup(|key| (key == "GENERA_BIND_ADDR").then(|| "nowhere".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("GENERA_BIND_ADDR"));
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = ServerConfig::from_lookup(|key| {
            (key == "GENERA_DB_MAX_CONNECTIONS").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("GENERA_DB_MAX_CONNECTIONS"));
    }
}
