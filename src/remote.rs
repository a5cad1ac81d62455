//! Remote Backend Module
//!
//! Handles HTTP communication with the hosted PostgREST API.

use std::future::Future;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, debug};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Sort clause for a select
#[derive(Debug, Clone, Copy)]
pub struct Order<'a> {
    pub column: &'a str,
    pub ascending: bool,
}

impl<'a> Order<'a> {
    pub fn asc(column: &'a str) -> Self {
        Self { column, ascending: true }
    }

    pub fn desc(column: &'a str) -> Self {
        Self { column, ascending: false }
    }

    fn param(&self) -> String {
        let dir = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, dir)
    }
}

/// API client for the hosted database
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    query_timeout: Duration,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// `request_timeout` bounds the underlying HTTP exchange, `query_timeout`
    /// is the race every public call runs against.
    pub fn new(
        base_url: &str,
        api_key: &str,
        request_timeout: Duration,
        query_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            query_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn race<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.query_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(self.query_timeout.as_secs())),
        }
    }

    /// Fetch every row of `table`, with `select` allowing embedded relations
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        order: Order<'_>,
    ) -> Result<Vec<T>, ApiError> {
        debug!("Selecting {} ordered by {}", table, order.param());

        self.race(async {
            let response = self
                .request(reqwest::Method::GET, table)
                .query(&[("select", select.to_string()), ("order", order.param())])
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            check(response).await?
                .json::<Vec<T>>()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))
        })
        .await
    }

    /// Insert one row and return the stored representation
    pub async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("Inserting into {}", table);

        self.race(async {
            let response = self
                .request(reqwest::Method::POST, table)
                .header("Prefer", "return=representation")
                .header("Accept", SINGLE_OBJECT)
                .json(body)
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            check(response).await?
                .json::<T>()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))
        })
        .await
    }

    /// Update the single row where `column` equals `value`
    pub async fn update<B, T>(
        &self,
        table: &str,
        column: &str,
        value: &str,
        patch: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("Updating {} where {} = {}", table, column, value);

        self.race(async {
            let response = self
                .request(reqwest::Method::PATCH, table)
                .query(&[(column, format!("eq.{}", value))])
                .header("Prefer", "return=representation")
                .header("Accept", SINGLE_OBJECT)
                .json(patch)
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            check(response).await?
                .json::<T>()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))
        })
        .await
    }

    /// Delete rows where `column` equals `value`
    pub async fn delete(&self, table: &str, column: &str, value: &str) -> Result<(), ApiError> {
        debug!("Deleting from {} where {} = {}", table, column, value);

        self.race(async {
            let response = self
                .request(reqwest::Method::DELETE, table)
                .query(&[(column, format!("eq.{}", value))])
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            check(response).await?;
            info!("Deleted {} row {}", table, value);
            Ok(())
        })
        .await
    }

    /// Exact row count of `table` without transferring rows
    pub async fn count(&self, table: &str) -> Result<u64, ApiError> {
        self.race(async {
            let response = self
                .request(reqwest::Method::HEAD, table)
                .query(&[("select", "*")])
                .header("Prefer", "count=exact")
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            let response = check(response).await?;
            let total = response
                .headers()
                .get("content-range")
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_range_total)
                .unwrap_or(0);

            Ok(total)
        })
        .await
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error: ErrorResponse = response.json().await
        .unwrap_or_else(|_| ErrorResponse { message: format!("Status: {}", status) });
    Err(ApiError::Server(error.message))
}

/// `0-24/57` and `*/57` both yield 57
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Query timeout ({0}s)")]
    Timeout(u64),
}
