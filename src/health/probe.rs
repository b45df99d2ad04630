use super::models::{FeedExpectation, ServiceDescriptor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on how much of a body is inspected for content checks.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Tls,
    Other,
}

/// Network-level failure, normalized from whatever the HTTP client reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            message: format!("Request timeout after {} ms", after.as_millis()),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TransportErrorKind::Timeout => write!(f, "Timeout: {}", self.message),
            TransportErrorKind::Connect => write!(f, "Connection failed: {}", self.message),
            TransportErrorKind::Tls => write!(f, "TLS failure: {}", self.message),
            TransportErrorKind::Other => write!(f, "HTTP error: {}", self.message),
        }
    }
}

impl From<&reqwest::Error> for TransportError {
    fn from(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if mentions_tls(err) {
            TransportErrorKind::Tls
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };

        Self {
            kind,
            message: err.to_string(),
        }
    }
}

// reqwest has no TLS predicate; the handshake error only shows up in the source chain.
fn mentions_tls(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        let text = current.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return true;
        }
        source = current.source();
    }
    false
}

/// What the body of a data-feed endpoint looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSignal {
    Fresh,
    Empty,
    MissingMarker(String),
    Stale { age_secs: u64 },
    Unreadable(String),
}

impl ContentSignal {
    /// Inspects `body` against the feed expectation, `now` anchoring the staleness check.
    pub fn inspect(body: &str, feed: &FeedExpectation, now: DateTime<Utc>) -> Self {
        if body.trim().is_empty() {
            return ContentSignal::Empty;
        }

        if let Some(marker) = &feed.contains {
            if !body.contains(marker.as_str()) {
                return ContentSignal::MissingMarker(marker.clone());
            }
        }

        if let Some(pointer) = &feed.timestamp_pointer {
            let value: serde_json::Value = match serde_json::from_str(body) {
                Ok(value) => value,
                Err(e) => return ContentSignal::Unreadable(format!("invalid JSON: {}", e)),
            };
            let payload = value.pointer(pointer);
            if payload.map_or(true, |v| v.is_null() || v == &serde_json::json!([])) {
                return ContentSignal::Empty;
            }
            let Some(published) = payload.and_then(parse_timestamp) else {
                return ContentSignal::Unreadable(format!("no timestamp at {}", pointer));
            };
            if let Some(max_age) = feed.max_age_secs {
                let age_secs = (now - published).num_seconds().max(0) as u64;
                if age_secs > max_age {
                    return ContentSignal::Stale { age_secs };
                }
            }
        }

        ContentSignal::Fresh
    }
}

fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        serde_json::Value::Number(number) => number
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Unclassified outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub elapsed: Duration,
    pub status_code: Option<u16>,
    pub transport_error: Option<TransportError>,
    pub content: Option<ContentSignal>,
    /// Body kept for adapters that classify on payload
    pub body: Option<String>,
}

impl RawResult {
    pub fn response(status_code: u16, elapsed: Duration) -> Self {
        Self {
            elapsed,
            status_code: Some(status_code),
            transport_error: None,
            content: None,
            body: None,
        }
    }

    pub fn failed(error: TransportError, elapsed: Duration) -> Self {
        Self {
            elapsed,
            status_code: None,
            transport_error: Some(error),
            content: None,
            body: None,
        }
    }

    pub fn with_content(mut self, content: ContentSignal) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Latency worth recording; a request that never got an answer is not a measurement.
    pub fn latency_ms(&self) -> u64 {
        if self.status_code.is_some() {
            (self.elapsed.as_millis() as u64).max(1)
        } else {
            0
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid URL for {service_id}: {url}")]
    InvalidUrl { service_id: String, url: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Issues one network check against one endpoint.
///
/// Ordinary network failures are data, not errors: they come back inside [`RawResult`].
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, descriptor: &ServiceDescriptor) -> Result<RawResult, ProbeError>;
}

/// HTTP(S) GET probe over a shared connection pool.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("statuswatch/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client })
    }

    /// Sends the GET and reads the body only when `keep_body` is set.
    pub(crate) async fn fetch(
        &self,
        service_id: &str,
        url: &str,
        keep_body: bool,
    ) -> Result<RawResult, ProbeError> {
        let url = reqwest::Url::parse(url).map_err(|_| ProbeError::InvalidUrl {
            service_id: service_id.to_string(),
            url: url.to_string(),
        })?;

        let start = Instant::now();
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(service_id, "Probe request failed: {:?}", e);
                return Ok(RawResult::failed(TransportError::from(&e), start.elapsed()));
            }
        };

        let status_code = response.status().as_u16();
        let elapsed = start.elapsed();
        let mut raw = RawResult::response(status_code, elapsed);

        if keep_body {
            match read_body(response).await {
                Ok(body) => raw = raw.with_body(body),
                Err(e) => {
                    tracing::warn!(service_id, "Failed to read probe body: {:?}", e);
                    raw = raw.with_content(ContentSignal::Unreadable(e.to_string()));
                }
            }
        }

        Ok(raw)
    }
}

async fn read_body(mut response: reqwest::Response) -> Result<String, reqwest::Error> {
    let mut buffer = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = MAX_BODY_BYTES.saturating_sub(buffer.len());
        buffer.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
        if buffer.len() >= MAX_BODY_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[async_trait]
impl HealthProbe for HttpProbe {
    #[tracing::instrument(name = "Probe service", skip(self, descriptor), fields(service_id = %descriptor.id))]
    async fn probe(&self, descriptor: &ServiceDescriptor) -> Result<RawResult, ProbeError> {
        let feed = descriptor.feed.as_ref();
        let mut raw = self
            .fetch(&descriptor.id, &descriptor.url, feed.is_some())
            .await?;

        if let (Some(feed), Some(body)) = (feed, raw.body.take()) {
            raw = raw.with_content(ContentSignal::inspect(&body, feed, Utc::now()));
        }

        Ok(raw)
    }
}
