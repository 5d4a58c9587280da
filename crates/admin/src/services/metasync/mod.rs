//! Metasync inventory API client.
//!
//! Every parameter travels as a request header; the body is always empty.
//!
//! # API Reference
//!
//! - Base URL: `METASYNC_API_URL` (default `https://apis.metasync.com/Almacen`)
//! - Authentication: `apikey` header
//! - Paging: `fecha` (`dd/MM/yyyy HH:mm:ss`), `lastid` and `offset` (batch
//!   size, at most 1000)
//! - Scope: `canal` and `idempresa`

pub mod batch;

pub use batch::{Feed, is_exhausted, items, next_last_id};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;

use desguace_core::ApiConfig;

/// Largest batch the API serves.
pub const MAX_BATCH_SIZE: u32 = 1000;

/// Attempts per request, the first included.
const MAX_ATTEMPTS: u32 = 3;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Wire format of the `fecha` header.
pub const FECHA_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Errors that can occur when calling Metasync.
#[derive(Debug, Error)]
pub enum MetasyncError {
    /// The stored API config cannot be used.
    #[error("API de Metasync no configurada")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A header value could not be encoded.
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
}

impl MetasyncError {
    /// Whether another attempt may succeed.
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured | Self::InvalidHeader(_) => false,
        }
    }
}

/// Format a timestamp for the `fecha` header.
#[must_use]
pub fn format_fecha(at: DateTime<Utc>) -> String {
    at.format(FECHA_FORMAT).to_string()
}

/// Request parameters for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub feed: Feed,
    pub since: DateTime<Utc>,
    pub last_id: i64,
    pub batch_size: u32,
}

/// Metasync API client.
#[derive(Clone)]
pub struct MetasyncClient {
    inner: Arc<MetasyncClientInner>,
}

struct MetasyncClientInner {
    http: reqwest::Client,
    base_url: String,
    config: ApiConfig,
}

impl MetasyncClient {
    /// Create a client for a usable API config.
    ///
    /// # Errors
    ///
    /// Returns `MetasyncError::NotConfigured` if the key is missing or still
    /// the placeholder, or the config is inactive.
    pub fn new(http: reqwest::Client, base_url: &str, config: ApiConfig) -> Result<Self, MetasyncError> {
        if !config.is_usable() {
            return Err(MetasyncError::NotConfigured);
        }
        Ok(Self {
            inner: Arc::new(MetasyncClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                config,
            }),
        })
    }

    /// Company the client imports for.
    #[must_use]
    pub fn company_id(&self) -> i32 {
        self.inner.config.company_id
    }

    fn headers(&self, page: &PageRequest) -> Result<HeaderMap, MetasyncError> {
        let config = &self.inner.config;
        let mut headers = HeaderMap::new();
        let mut put = |name: &'static str, value: String| -> Result<(), MetasyncError> {
            let value = HeaderValue::from_str(&value).map_err(|_| MetasyncError::InvalidHeader(name))?;
            headers.insert(HeaderName::from_static(name), value);
            Ok(())
        };
        put("apikey", config.api_key.clone())?;
        put("fecha", format_fecha(page.since))?;
        put("lastid", page.last_id.to_string())?;
        put("offset", page.batch_size.min(MAX_BATCH_SIZE).to_string())?;
        if !config.channel.is_empty() {
            put("canal", config.channel.clone())?;
        }
        put("idempresa", config.company_id.to_string())?;
        Ok(headers)
    }

    /// Fetch one page, retrying transient failures with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns the last error once every attempt has failed, or the first
    /// non-transient one.
    pub async fn fetch(&self, page: &PageRequest) -> Result<Value, MetasyncError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(page).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < MAX_ATTEMPTS && e.is_transient() => {
                    let delay = Duration::from_secs(1 << attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_secs = delay.as_secs(),
                        endpoint = page.feed.endpoint(),
                        "Metasync request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, page: &PageRequest) -> Result<Value, MetasyncError> {
        let url = format!("{}/{}", self.inner.base_url, page.feed.endpoint());
        let response = self
            .inner
            .http
            .get(&url)
            .headers(self.headers(page)?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(MetasyncError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for MetasyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetasyncClient")
            .field("base_url", &self.inner.base_url)
            .field("company_id", &self.inner.config.company_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            api_key: "k3y".into(),
            company_id: 42,
            channel: "MURCIA".into(),
            active: true,
        }
    }

    #[test]
    fn test_fecha_format() {
        let at = Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_fecha(at), "01/01/1900 00:00:00");
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_fecha(at), "09/03/2025 14:05:07");
    }

    #[test]
    fn test_placeholder_key_is_rejected() {
        let mut config = config();
        config.api_key = ApiConfig::PLACEHOLDER_KEY.into();
        assert!(matches!(
            MetasyncClient::new(reqwest::Client::new(), "http://x", config),
            Err(MetasyncError::NotConfigured)
        ));
    }

    #[test]
    fn test_headers_carry_paging() {
        let client = MetasyncClient::new(reqwest::Client::new(), "http://x/", config()).unwrap();
        let headers = client
            .headers(&PageRequest {
                feed: Feed::Parts,
                since: Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap(),
                last_id: 17,
                batch_size: 5000,
            })
            .unwrap();
        assert_eq!(headers["apikey"], "k3y");
        assert_eq!(headers["lastid"], "17");
        assert_eq!(headers["offset"], "1000");
        assert_eq!(headers["canal"], "MURCIA");
        assert_eq!(headers["idempresa"], "42");
        assert_eq!(client.inner.base_url, "http://x");
    }

    #[test]
    fn test_only_server_errors_are_retried() {
        let busy = MetasyncError::Api { status: 503, message: String::new() };
        let denied = MetasyncError::Api { status: 401, message: String::new() };
        assert!(busy.is_transient());
        assert!(!denied.is_transient());
    }
}
