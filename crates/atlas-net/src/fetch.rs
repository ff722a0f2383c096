//! Descriptor fetchers.
//!
//! [`HttpFetcher`] handles `http`, `https`, and `file` URLs. Bodies are
//! capped at [`MAX_DESCRIPTOR_SIZE`] and must be UTF-8.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use url::Url;

use atlas_types::error::{AtlasError, LoadError, Result};

/// Maximum descriptor size (4 MB).
pub const MAX_DESCRIPTOR_SIZE: usize = 4 * 1024 * 1024;

/// Retrieves the raw text of a module descriptor.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the document at `url`.
    ///
    /// Every failure is reported as [`LoadError::Fetch`].
    async fn fetch(&self, url: &Url) -> Result<String>;
}

fn fetch_error(url: &Url, reason: impl Into<String>) -> AtlasError {
    AtlasError::Load(LoadError::Fetch {
        url: url.to_string(),
        reason: reason.into(),
    })
}

fn too_large(url: &Url) -> AtlasError {
    fetch_error(url, format!("descriptor exceeds {MAX_DESCRIPTOR_SIZE} bytes"))
}

fn into_text(url: &Url, body: Vec<u8>) -> Result<String> {
    if body.len() > MAX_DESCRIPTOR_SIZE {
        return Err(too_large(url));
    }
    String::from_utf8(body).map_err(|_| fetch_error(url, "descriptor is not valid UTF-8"))
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Fetcher backed by `reqwest` for network URLs and `tokio::fs` for
/// `file://` URLs.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher. `timeout` bounds each request; `None` leaves requests
    /// unbounded.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "atlas-shell/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AtlasError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &Url) -> Result<String> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(url, format!("HTTP {status}")));
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_DESCRIPTOR_SIZE as u64)
        {
            return Err(too_large(url));
        }

        // Chunked bodies carry no length, so the cap is enforced while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?
        {
            if body.len() + chunk.len() > MAX_DESCRIPTOR_SIZE {
                return Err(too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        into_text(url, body)
    }

    async fn fetch_file(&self, url: &Url) -> Result<String> {
        let path = url
            .to_file_path()
            .map_err(|()| fetch_error(url, "not a local file path"))?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;
        // One byte past the cap is enough to tell an oversized file apart.
        let mut body = Vec::new();
        file.take(MAX_DESCRIPTOR_SIZE as u64 + 1)
            .read_to_end(&mut body)
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;
        into_text(url, body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        log::debug!("Fetching descriptor {url}");
        let result = match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => self.fetch_file(url).await,
            other => Err(fetch_error(url, format!("unsupported scheme: {other}"))),
        };
        if let Err(ref e) = result {
            log::warn!("{e}");
        }
        result
    }
}

// ---------------------------------------------------------------------------
// MemoryFetcher
// ---------------------------------------------------------------------------

/// In-memory fetcher serving fixed documents and recording every request.
#[derive(Default)]
pub struct MemoryFetcher {
    documents: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<Url>>,
}

impl MemoryFetcher {
    /// Create a fetcher with no documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`, replacing any previous document.
    pub fn insert(&self, url: &str, body: &str) {
        self.documents
            .lock()
            .insert(url.to_string(), body.to_string());
    }

    /// Every URL requested so far, in request order.
    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.requests.lock().push(url.clone());
        let body = self.documents.lock().get(url.as_str()).cloned();
        body.ok_or_else(|| fetch_error(url, "HTTP 404 Not Found"))
    }
}
