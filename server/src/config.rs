use anyhow::{Context, Result};
use std::str::FromStr;

use crate::occ::DEFAULT_MAX_RETRIES;

/// Where the state document lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    /// Process-local; everything is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORE_BACKEND {other:?} (expected sqlite or memory)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when building short links, e.g. "https://go.example.com".
    /// Never has a trailing slash.
    pub base_url: String,

    pub store_backend: StoreBackend,

    /// SQLite connection string, e.g. "sqlite:./shortener.db"
    pub database_url: String,

    /// Key of the state document row
    pub document_key: String,

    /// Conditional-write retries allowed after the first attempt of a shrink
    pub max_conflict_retries: u32,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key -> value source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let base_url = var("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let store_backend = var("STORE_BACKEND")
            .map(|s| s.parse::<StoreBackend>())
            .transpose()?
            .unwrap_or(StoreBackend::Sqlite);

        let document_key = var("DOCUMENT_KEY").unwrap_or_else(|| "urls".into());
        if document_key.trim().is_empty() {
            anyhow::bail!("DOCUMENT_KEY must not be empty");
        }

        let max_conflict_retries = match var("MAX_CONFLICT_RETRIES") {
            Some(raw) => raw
                .parse::<u32>()
                .context("MAX_CONFLICT_RETRIES must be a non-negative integer")?,
            None => DEFAULT_MAX_RETRIES,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            base_url,
            store_backend,
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite:./shortener.db".into()),
            document_key,
            max_conflict_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.database_url, "sqlite:./shortener.db");
        assert_eq!(config.document_key, "urls");
        assert_eq!(config.max_conflict_retries, 3);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("BASE_URL", "https://go.example.com/"),
            ("STORE_BACKEND", "Memory"),
            ("MAX_CONFLICT_RETRIES", "7"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.base_url, "https://go.example.com");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.max_conflict_retries, 7);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[("PORT", "http")]).is_err());
        assert!(load(&[("STORE_BACKEND", "redis")]).is_err());
        assert!(load(&[("MAX_CONFLICT_RETRIES", "-1")]).is_err());
        assert!(load(&[("DOCUMENT_KEY", " ")]).is_err());
    }
}
