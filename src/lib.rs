//! CapyMES Dashboard Library
//!
//! Offline-first data access for the MES back office: remote PostgREST
//! client, local mirror, connection monitor, session store and the
//! view-facing commands served over HTTP.

pub mod auth;
pub mod commands;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod logging;
pub mod models;
pub mod remote;
pub mod repo;
pub mod seed;
pub mod server;
pub mod storage;
pub mod validation;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use auth::AuthManager;
use config::Config;
use connection::ConnectionMonitor;
use remote::ApiClient;
use repo::DataSource;
use storage::LocalStore;

/// Application state shared across commands
pub struct AppState {
    pub auth: Mutex<AuthManager>,
    pub data: DataSource,
    pub connection: ConnectionMonitor,
}

impl AppState {
    /// Wire the store, remote client and monitor described by `config`.
    /// A session persisted by an earlier run is restored.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = LocalStore::new(config.store_dir())
            .with_context(|| format!("Failed to open local store in {}", config.store_dir().display()))?;
        let api = ApiClient::new(&config.api_url, &config.api_key, config.request_timeout, config.probe_timeout)
            .context("Failed to build the backend client")?;

        let connection = ConnectionMonitor::new(Arc::new(api.clone()), config.probe_timeout, config.probe_interval);
        let auth = AuthManager::restore(&store);

        Ok(Self::new(DataSource::new(api, store), connection, auth))
    }

    pub fn new(data: DataSource, connection: ConnectionMonitor, auth: AuthManager) -> Self {
        Self {
            auth: Mutex::new(auth),
            data,
            connection,
        }
    }
}
