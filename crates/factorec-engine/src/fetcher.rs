//! Factorec Engine - Interaction Fetcher
//!
//! Retrieves interaction records from the external interaction provider.
//! Fetching is fail-soft: every failure class (refused connection, timeout,
//! non-200 status, malformed payload) is reported as a typed
//! [`FetchOutcome::Unavailable`] and logged, never raised.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::{
    cmp::Reverse,
    fmt,
    path::PathBuf,
    time::Instant,
};

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, error, info, instrument, warn};

use crate::config::FetcherConfig;
use crate::interaction::InteractionRecord;
use factorec_common::{FactorecError, Result};

/// Number of payload characters quoted in diagnostics
const SNIPPET_LEN: usize = 200;

/// Why a fetch produced no data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailureKind {
    /// Provider refused or dropped the connection
    Connect,
    /// Connect or read timeout elapsed
    Timeout,
    /// Provider answered with a non-200 status
    Status(u16),
    /// Body was not a JSON array of interaction records
    Malformed,
    /// Local export file could not be read
    Io,
    /// Any other request failure
    Request,
}

/// Failure reason attached to an unavailable fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FetchFailureKind,
    pub message: String,
}

impl FetchFailure {
    fn new(kind: FetchFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FetchFailureKind::Connect => write!(f, "connection failed: {}", self.message),
            FetchFailureKind::Timeout => write!(f, "timed out: {}", self.message),
            FetchFailureKind::Status(code) => write!(f, "HTTP {}: {}", code, self.message),
            FetchFailureKind::Malformed => write!(f, "malformed payload: {}", self.message),
            FetchFailureKind::Io => write!(f, "read failed: {}", self.message),
            FetchFailureKind::Request => write!(f, "request failed: {}", self.message),
        }
    }
}

/// Result of one fetch: data, or the reason there is none
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(Vec<InteractionRecord>),
    Unavailable(FetchFailure),
}

impl FetchOutcome {
    /// Collapse to the fail-soft record list (empty when unavailable)
    pub fn into_records(self) -> Vec<InteractionRecord> {
        match self {
            FetchOutcome::Fetched(records) => records,
            FetchOutcome::Unavailable(_) => Vec::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_))
    }
}

/// Source of interaction records for training
#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Fetch at most `limit` records, most recent first when timestamps exist
    async fn fetch(&self, limit: usize) -> FetchOutcome;

    /// Human-readable location of the source, for logs and reports
    fn describe(&self) -> String;
}

/// Keep the `limit` most recent records.
///
/// Records are stably ordered by `created_at` descending; records without a
/// timestamp keep their relative order after all timestamped ones.
pub fn keep_most_recent(mut records: Vec<InteractionRecord>, limit: usize) -> Vec<InteractionRecord> {
    if records.len() <= limit {
        return records;
    }
    records.sort_by_key(|record| Reverse(record.created_at));
    records.truncate(limit);
    records
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(SNIPPET_LEN).collect()
}

fn parse_payload(body: &[u8]) -> std::result::Result<Vec<InteractionRecord>, FetchFailure> {
    serde_json::from_slice::<Vec<InteractionRecord>>(body).map_err(|e| {
        FetchFailure::new(
            FetchFailureKind::Malformed,
            format!("{} (payload starts with: {:?})", e, snippet(body)),
        )
    })
}

fn classify(err: &reqwest::Error) -> FetchFailureKind {
    if err.is_timeout() {
        FetchFailureKind::Timeout
    } else if err.is_connect() {
        FetchFailureKind::Connect
    } else if err.is_decode() {
        FetchFailureKind::Malformed
    } else {
        FetchFailureKind::Request
    }
}

/// Interaction source backed by the provider's JSON export endpoint
#[derive(Debug, Clone)]
pub struct HttpInteractionSource {
    client: Client,
    url: String,
}

impl HttpInteractionSource {
    /// Create a new HTTP interaction source
    #[instrument(level = "debug")]
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        // reqwest 0.11 has no separate read timeout; the overall request
        // timeout is bounded by connect + read.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.connect_timeout() + config.read_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| FactorecError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.export_url(),
        })
    }

    async fn try_fetch(&self) -> std::result::Result<Vec<InteractionRecord>, FetchFailure> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchFailure::new(classify(&e), e.to_string()))?;

        let status = response.status();
        debug!("📡 Provider responded with status {}", status);

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchFailure::new(classify(&e), e.to_string()))?;

        if status != StatusCode::OK {
            return Err(FetchFailure::new(
                FetchFailureKind::Status(status.as_u16()),
                snippet(&body),
            ));
        }

        parse_payload(&body)
    }
}

#[async_trait]
impl InteractionSource for HttpInteractionSource {
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        let start = Instant::now();
        info!("📡 Fetching interactions from {}", self.url);

        match self.try_fetch().await {
            Ok(records) => {
                let total = records.len();
                let records = keep_most_recent(records, limit);
                if records.len() < total {
                    warn!("⚠️ Provider returned {} records, keeping the {} most recent", total, limit);
                }
                info!("✅ Fetched {} interactions in {:?}", records.len(), start.elapsed());
                FetchOutcome::Fetched(records)
            }
            Err(failure) => {
                error!("❌ Interaction fetch from {} failed: {}", self.url, failure);
                FetchOutcome::Unavailable(failure)
            }
        }
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Interaction source backed by a JSON export file on disk
#[derive(Debug, Clone)]
pub struct FileInteractionSource {
    path: PathBuf,
}

impl FileInteractionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InteractionSource for FileInteractionSource {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        info!("📁 Reading interactions from {}", self.path.display());

        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) => {
                let failure = FetchFailure::new(
                    FetchFailureKind::Io,
                    format!("{}: {}", self.path.display(), e),
                );
                error!("❌ Interaction export unreadable: {}", failure);
                return FetchOutcome::Unavailable(failure);
            }
        };

        match parse_payload(&body) {
            Ok(records) => FetchOutcome::Fetched(keep_most_recent(records, limit)),
            Err(failure) => {
                error!("❌ Interaction export rejected: {}", failure);
                FetchOutcome::Unavailable(failure)
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, Router};
    use chrono::{TimeZone, Utc};
    use std::net::SocketAddr;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    async fn spawn_provider(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn config_for(addr: SocketAddr) -> FetcherConfig {
        FetcherConfig {
            base_url: format!("http://{}", addr),
            connect_timeout_secs: 1,
            read_timeout_secs: 2,
            ..FetcherConfig::default()
        }
    }

    #[test]
    fn test_keep_most_recent_orders_by_timestamp() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let records = vec![
            InteractionRecord::rating(1, 1, 1.0),
            InteractionRecord::rating(1, 2, 2.0).with_created_at(base),
            InteractionRecord::rating(1, 3, 3.0).with_created_at(base + chrono::Duration::days(2)),
            InteractionRecord::rating(1, 4, 4.0).with_created_at(base + chrono::Duration::days(1)),
        ];
        let kept = keep_most_recent(records, 2);
        let items: Vec<_> = kept.iter().map(|r| r.item_id.unwrap()).collect();
        assert_eq!(items, vec![3, 4]);
    }

    #[test]
    fn test_keep_most_recent_without_timestamps_is_stable_prefix() {
        let records: Vec<_> = (0..5).map(|i| InteractionRecord::rating(1, i, 3.0)).collect();
        let kept = keep_most_recent(records, 3);
        let items: Vec<_> = kept.iter().map(|r| r.item_id.unwrap()).collect();
        assert_eq!(items, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_http_fetch_success() {
        let router = Router::new().route(
            "/api/interactions/export-json",
            get(|| async {
                r#"[{"user_id":1,"item_id":10,"rating":5,"interaction_type":"rating","created_at":"2025-11-09 00:38:41"},
                   {"user_id":2,"item_id":30,"rating":4,"interaction_type":"rating","created_at":"2025-11-10 00:38:41"}]"#
            }),
        );
        let addr = spawn_provider(router).await;
        let source = HttpInteractionSource::new(&config_for(addr)).unwrap();

        match source.fetch(1).await {
            FetchOutcome::Fetched(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].item_id, Some(30));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_fetch_non_200_is_unavailable() {
        let router = Router::new().route(
            "/api/interactions/export-json",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let addr = spawn_provider(router).await;
        let source = HttpInteractionSource::new(&config_for(addr)).unwrap();

        match source.fetch(100).await {
            FetchOutcome::Unavailable(failure) => {
                assert_eq!(failure.kind, FetchFailureKind::Status(500));
                assert!(failure.message.contains("boom"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_fetch_malformed_is_unavailable() {
        let router = Router::new().route(
            "/api/interactions/export-json",
            get(|| async { "<html>not json</html>" }),
        );
        let addr = spawn_provider(router).await;
        let source = HttpInteractionSource::new(&config_for(addr)).unwrap();

        let outcome = source.fetch(100).await;
        assert!(!outcome.is_available());
        match outcome {
            FetchOutcome::Unavailable(failure) => {
                assert_eq!(failure.kind, FetchFailureKind::Malformed)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_http_fetch_refused_connection_is_empty() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpInteractionSource::new(&config_for(addr)).unwrap();
        let outcome = source.fetch(100).await;
        assert!(!outcome.is_available());
        assert!(outcome.into_records().is_empty());
        assert!(logs_contain("Interaction fetch from"));
    }

    #[tokio::test]
    async fn test_file_source_reads_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("interactions.json");
        tokio::fs::write(&path, r#"[{"user_id":1,"item_id":2,"rating":3}]"#)
            .await
            .unwrap();

        let records = FileInteractionSource::new(&path).fetch(10).await.into_records();
        assert_eq!(records, vec![InteractionRecord {
            interaction_type: None,
            ..InteractionRecord::rating(1, 2, 3.0)
        }]);
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let source = FileInteractionSource::new(dir.path().join("missing.json"));
        match source.fetch(10).await {
            FetchOutcome::Unavailable(failure) => assert_eq!(failure.kind, FetchFailureKind::Io),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
