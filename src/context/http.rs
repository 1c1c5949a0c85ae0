use super::{DocumentFetcher, SourceDocument};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

static DRIVE_FILE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([^/]+)/view").expect("static regex is valid"));
static DRIVE_BARE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{20,}$").expect("static regex is valid"));

/// Rewrites a Google Drive share link (`/file/d/<id>/view...`) or a bare file
/// id into its direct download form. Other URLs are returned unchanged.
pub fn drive_download_url(url: &str) -> String {
    let url = url.trim();
    let id = match DRIVE_FILE_LINK.captures(url).and_then(|c| c.get(1)) {
        Some(id) => id.as_str(),
        None if DRIVE_BARE_ID.is_match(url) => url,
        None => return url.to_string(),
    };
    format!("https://drive.google.com/uc?export=download&id={}", id)
}

/// Fetches documents over HTTP(S). Any failure is reported as "absent".
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new() -> Result<Self> {
        // Env-overridable.
        let timeout_secs = env::var("QUIZGEN_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Self::with_timeout(Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::configuration_with_context(
                    "failed to build HTTP client",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("http_document_fetcher"),
                )
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, document: &SourceDocument) -> Option<Bytes> {
        let Some(url) = document.url.as_deref().map(drive_download_url) else {
            debug!(document = %document.id, "document has no url");
            return None;
        };
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(document = %document.id, error = %e, "document fetch failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!(document = %document.id, status = resp.status().as_u16(), "document fetch rejected");
            return None;
        }
        match resp.bytes().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(document = %document.id, error = %e, "document body read failed");
                None
            }
        }
    }
}
