//! Runtime configuration read from the environment (and `.env`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::connection::ConnectionMode;

const DEFAULT_API_URL: &str = "http://localhost:54321";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub connection_mode: ConnectionMode,
    pub probe_timeout: Duration,
    pub probe_interval: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Load `.env` if present, then read `MES_*` variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match get("MES_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        };

        let bind = get("MES_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("MES_BIND_ADDR is not a socket address: {bind}"))?;

        let connection_mode = match get("MES_CONNECTION_MODE") {
            Some(mode) => ConnectionMode::from_str(&mode)
                .map_err(anyhow::Error::msg)
                .context("MES_CONNECTION_MODE must be manual or auto")?,
            None => ConnectionMode::default(),
        };

        Ok(Self {
            api_url: get("MES_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: get("MES_API_KEY").unwrap_or_default(),
            data_dir,
            bind_addr,
            connection_mode,
            probe_timeout: seconds(&get, "MES_PROBE_TIMEOUT_SECS", 10)?,
            probe_interval: seconds(&get, "MES_PROBE_INTERVAL_SECS", 30)?,
            request_timeout: seconds(&get, "MES_REQUEST_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn seconds(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds, got {raw:?}"))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("CapyMES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, "http://localhost:54321");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.connection_mode, ConnectionMode::Manual);
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.probe_interval, Duration::from_secs(30));
        assert!(config.data_dir.ends_with("CapyMES"));
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("MES_DATA_DIR", "/tmp/mes"),
            ("MES_CONNECTION_MODE", "auto"),
            ("MES_PROBE_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.connection_mode, ConnectionMode::Auto);
        assert_eq!(config.probe_timeout, Duration::from_secs(3));
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/mes/store"));
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(Config::from_lookup(lookup(&[("MES_PROBE_INTERVAL_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MES_BIND_ADDR", "localhost")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MES_CONNECTION_MODE", "sometimes")])).is_err());
    }
}
