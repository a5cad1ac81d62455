//! Connection Monitor
//!
//! Tracks whether the remote backend is reachable. Every attempt is a single
//! probe raced against a timeout; there is no backoff and no retry.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn, debug};

use crate::remote::{ApiClient, ApiError};

/// Table used for the reachability probe
const PROBE_TABLE: &str = "production_orders";

const FORCED_OFFLINE: &str = "offline mode forced by user";
const NO_NETWORK: &str = "no internet connection";

/// Reachability check against the backend
#[async_trait]
pub trait Probe: Send + Sync {
    /// Returns a short success message
    async fn probe(&self) -> Result<String, ApiError>;
}

#[async_trait]
impl Probe for ApiClient {
    async fn probe(&self) -> Result<String, ApiError> {
        let total = self.count(PROBE_TABLE).await?;
        Ok(format!("connected ({} records)", total))
    }
}

/// Whether the monitor probes on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Auto,
    #[default]
    Manual,
}

impl std::str::FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ConnectionMode::Auto),
            "manual" => Ok(ConnectionMode::Manual),
            other => Err(format!("unknown connection mode: {}", other)),
        }
    }
}

/// Snapshot of the monitor state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub is_online: bool,
    pub is_connecting: bool,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub mode: ConnectionMode,
}

struct Inner {
    probe: Arc<dyn Probe>,
    probe_timeout: Duration,
    probe_interval: Duration,
    status: RwLock<ConnectionStatus>,
    auto_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut task) = self.auto_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

struct ConnectingGuard<'a>(&'a ConnectionMonitor);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.update(|s| s.is_connecting = false);
    }
}

/// Online/offline state shared across the application
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<Inner>,
}

impl ConnectionMonitor {
    /// Create a monitor in manual mode, initially offline
    pub fn new(probe: Arc<dyn Probe>, probe_timeout: Duration, probe_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                probe,
                probe_timeout,
                probe_interval,
                status: RwLock::new(ConnectionStatus::default()),
                auto_task: Mutex::new(None),
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online
    }

    pub fn is_connecting(&self) -> bool {
        self.status().is_connecting
    }

    pub fn last_error(&self) -> Option<String> {
        self.status().last_error
    }

    pub fn mode(&self) -> ConnectionMode {
        self.status().mode
    }

    fn update<F: FnOnce(&mut ConnectionStatus)>(&self, f: F) {
        match self.inner.status.write() {
            Ok(mut status) => f(&mut status),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Probe the backend once and record the outcome
    pub async fn attempt_connection(&self) -> ConnectionStatus {
        self.update(|s| {
            s.is_connecting = true;
            s.last_error = None;
            s.last_attempt = Some(Utc::now());
        });

        // Clears `is_connecting` even when the auto task is aborted mid-probe
        let _connecting = ConnectingGuard(self);

        debug!("Probing backend (timeout {:?})", self.inner.probe_timeout);

        let outcome = match tokio::time::timeout(self.inner.probe_timeout, self.inner.probe.probe()).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("connection timeout ({}s)", self.inner.probe_timeout.as_secs())),
        };

        self.update(|s| {
            s.is_connecting = false;
            match &outcome {
                Ok(_) => {
                    s.is_online = true;
                    s.last_error = None;
                }
                Err(message) => {
                    s.is_online = false;
                    s.last_error = Some(message.clone());
                }
            }
        });

        match outcome {
            Ok(message) => info!("Backend reachable: {}", message),
            Err(message) => warn!("Backend unreachable: {}", message),
        }

        self.status()
    }

    /// Drop to offline and stop any automatic probing
    pub fn force_offline(&self) {
        self.stop_auto();
        self.update(|s| {
            s.is_online = false;
            s.last_error = Some(FORCED_OFFLINE.to_string());
            s.mode = ConnectionMode::Manual;
        });
        info!("Offline mode forced");
    }

    /// Switch between automatic and manual probing
    pub fn set_mode(&self, mode: ConnectionMode) {
        let previous = self.mode();
        self.update(|s| s.mode = mode);

        match mode {
            ConnectionMode::Auto if previous != ConnectionMode::Auto => self.start_auto(),
            ConnectionMode::Manual => self.stop_auto(),
            ConnectionMode::Auto => {}
        }

        info!("Connection mode set to {:?}", mode);
    }

    /// Host network went up or down
    pub async fn network_changed(&self, up: bool) {
        if up {
            if self.mode() == ConnectionMode::Auto {
                self.attempt_connection().await;
            }
        } else {
            self.update(|s| {
                s.is_online = false;
                s.last_error = Some(NO_NETWORK.to_string());
            });
            warn!("Network went down");
        }
    }

    fn start_auto(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.probe_interval;

        let handle = tokio::spawn(async move {
            // First tick fires immediately.
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                ConnectionMonitor { inner }.attempt_connection().await;
            }
        });

        if let Ok(mut task) = self.inner.auto_task.lock() {
            if let Some(old) = task.replace(handle) {
                old.abort();
            }
        }
    }

    fn stop_auto(&self) {
        if let Ok(mut task) = self.inner.auto_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                debug!("Automatic probing stopped");
            }
        }
    }
}
