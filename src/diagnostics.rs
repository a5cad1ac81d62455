//! Connection diagnostic: probe the backend, then check every table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::connection::Probe;
use crate::remote::ApiClient;

/// Tables the dashboard reads from
pub const TABLES: [&str; 9] = [
    "production_orders",
    "ai_alerts",
    "quality_inspections",
    "maintenance_orders",
    "equipment",
    "traceability_records",
    "users",
    "system_settings",
    "production_lines",
];

#[derive(Debug, Clone, Serialize)]
pub struct TableCheck {
    pub table: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub success: bool,
    pub message: String,
    pub api_url: String,
    pub host: String,
    /// Empty when the connection test failed
    pub tables: Vec<TableCheck>,
    pub checked_at: DateTime<Utc>,
}

pub async fn run(api: &ApiClient) -> DiagnosticReport {
    let host = whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string());
    let checked_at = Utc::now();

    let (success, message) = match api.probe().await {
        Ok(message) => (true, message),
        Err(e) => {
            warn!("Diagnostic connection test failed: {}", e);
            (false, e.to_string())
        }
    };

    let mut tables = Vec::new();
    if success {
        for table in TABLES {
            let check = match api.count(table).await {
                Ok(rows) => TableCheck { table, available: true, rows: Some(rows), error: None },
                Err(e) => TableCheck { table, available: false, rows: None, error: Some(e.to_string()) },
            };
            tables.push(check);
        }
        let available = tables.iter().filter(|t| t.available).count();
        info!("Diagnostic: {}/{} tables available", available, TABLES.len());
    }

    DiagnosticReport {
        success,
        message,
        api_url: api.base_url().to_string(),
        host,
        tables,
        checked_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(url: &str) -> ApiClient {
        ApiClient::new(url, "anon-key", Duration::from_secs(2), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn reports_missing_tables() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for table in TABLES {
            let present = matches!(table, "production_orders" | "ai_alerts" | "users");
            let mock = server
                .mock("HEAD", format!("/rest/v1/{table}").as_str())
                .match_query(mockito::Matcher::Any)
                .with_status(if present { 200 } else { 404 })
                .with_header("content-range", "*/4")
                .create_async()
                .await;
            mocks.push(mock);
        }

        let report = run(&client(&server.url())).await;
        assert!(report.success);
        assert_eq!(report.message, "connected (4 records)");
        assert_eq!(report.tables.len(), TABLES.len());

        let available: Vec<&str> = report.tables.iter().filter(|t| t.available).map(|t| t.table).collect();
        assert_eq!(available, vec!["production_orders", "ai_alerts", "users"]);
        assert!(report.tables.iter().all(|t| t.available || t.error.is_some()));
    }

    #[tokio::test]
    async fn failed_probe_skips_table_checks() {
        let report = run(&client("http://127.0.0.1:9")).await;
        assert!(!report.success);
        assert!(report.tables.is_empty());
    }
}
