//! Context assembly: turns course documents into the grounding text for one request.
//!
//! # Context Module
//!
//! The assembler runs a cached two-hop pipeline:
//!
//! 1. Extracted fragments per document, cached in the raw-content tier under
//!    the document id. Missing documents and empty extractions are cached as
//!    negative entries so known-unavailable sources are not re-fetched.
//! 2. Ranked, budgeted fragments combined across documents, cached in the
//!    derived-context tier under `(course, material, topic)`.
//!
//! Nothing here fails outward: a broken document is skipped, and the worst
//! case is an empty [`DerivedContext`].
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ContextAssembler`] | Runs the pipeline above |
//! | [`SourceCatalog`] / [`StaticCatalog`] | Picks candidate documents for a request |
//! | [`DocumentFetcher`] / [`HttpDocumentFetcher`] | Retrieves raw document bytes |
//! | [`FragmentExtractor`] / [`PlainTextExtractor`] | Splits bytes into text fragments |
//! | [`RelevanceScorer`] / [`KeywordScorer`] | Ranks fragments against the topic |

mod catalog;
mod http;
mod scorer;

pub use catalog::StaticCatalog;
pub use http::{drive_download_url, HttpDocumentFetcher};
pub use scorer::KeywordScorer;

use crate::cache::{CacheKey, CachedValue, StoreStats, TtlStore};
use crate::config::{ContextBudget, ServiceConfig};
use crate::types::GenerationRequest;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const SOURCE_LABEL: &str = "Fuente";

/// A course document that may ground a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable identifier; also the raw-content cache key.
    pub id: String,
    pub title: String,
    pub subject: String,
    pub course: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SourceDocument {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        subject: impl Into<String>,
        course: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subject: subject.into(),
            course: course.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Grounding text handed to the generator, with the titles it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedContext {
    pub text: String,
    pub references: Vec<String>,
}

impl DerivedContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Position of a fragment in the extractor's output and its relevance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedFragment {
    pub index: usize,
    pub score: f64,
}

pub trait SourceCatalog: Send + Sync {
    fn candidates(&self, request: &GenerationRequest) -> Vec<SourceDocument>;
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Raw document bytes, or `None` when the document is unavailable for any reason.
    async fn fetch(&self, document: &SourceDocument) -> Option<Bytes>;
}

pub trait FragmentExtractor: Send + Sync {
    /// Text fragments (usually pages). An empty list is a valid answer.
    fn extract(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

pub trait RelevanceScorer: Send + Sync {
    /// Fragments ordered best first. Must be deterministic for equal inputs.
    fn rank(&self, fragments: &[String], topic: &str, hint: Option<&str>) -> Result<Vec<RankedFragment>>;
}

/// Extractor for documents already converted to text; pages are separated by form feeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl FragmentExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            Error::extraction_with_context(
                "document is not valid UTF-8",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("plain_text_extractor"),
            )
        })?;
        Ok(text
            .split('\u{c}')
            .map(str::trim)
            .filter(|page| !page.is_empty())
            .map(str::to_string)
            .collect())
    }
}

pub struct ContextAssembler {
    catalog: Arc<dyn SourceCatalog>,
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: Arc<dyn FragmentExtractor>,
    scorer: Arc<dyn RelevanceScorer>,
    raw: TtlStore<Arc<Vec<String>>>,
    derived: TtlStore<DerivedContext>,
    budget: ContextBudget,
}

impl ContextAssembler {
    pub fn new(
        config: &ServiceConfig,
        catalog: Arc<dyn SourceCatalog>,
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: Arc<dyn FragmentExtractor>,
        scorer: Arc<dyn RelevanceScorer>,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            extractor,
            scorer,
            raw: TtlStore::new(&config.cache.raw_content),
            derived: TtlStore::new(&config.cache.derived_context),
            budget: config.context.clone(),
        }
    }

    /// Builds (or recalls) the context for `request`. Never fails.
    pub async fn assemble(&self, request: &GenerationRequest) -> DerivedContext {
        let key = request.context_key();
        match self.derived.get(&key) {
            Some(CachedValue::Positive(ctx)) => {
                debug!(topic = %request.topic, "context cache hit");
                return ctx;
            }
            Some(CachedValue::Negative) => {
                debug!(topic = %request.topic, "context negative cache hit");
                return DerivedContext::empty();
            }
            None => {}
        }

        let mut context = DerivedContext::empty();
        for document in self.catalog.candidates(request) {
            if context.text.chars().count() >= self.budget.max_total_chars {
                break;
            }
            let Some(fragments) = self.load_fragments(&document).await else {
                continue;
            };
            let ranked = match self.scorer.rank(&fragments, &request.topic, Some(document.subject.as_str())) {
                Ok(ranked) => ranked,
                Err(e) => {
                    warn!(document = %document.id, error = %e, "relevance scoring failed, skipping document");
                    continue;
                }
            };
            let section = self.select(&fragments, &ranked);
            if section.is_empty() {
                continue;
            }
            if !context.text.is_empty() {
                context.text.push_str("\n\n");
            }
            // Language is not part of the key, so the label must not depend on it.
            context.text.push_str(&format!(
                "{}: {} ({})\n{}",
                SOURCE_LABEL, document.title, document.subject, section
            ));
            context.references.push(document.title.clone());
        }
        truncate_chars(&mut context.text, self.budget.max_total_chars);

        if context.is_empty() {
            debug!(topic = %request.topic, "no relevant context, caching negative");
            self.derived.set_negative(key);
        } else {
            self.derived.set_positive(key, context.clone());
        }
        context
    }

    async fn load_fragments(&self, document: &SourceDocument) -> Option<Arc<Vec<String>>> {
        let key = CacheKey::builder().field(&document.id).build();
        match self.raw.get(&key) {
            Some(CachedValue::Positive(fragments)) => return Some(fragments),
            Some(CachedValue::Negative) => {
                debug!(document = %document.id, "document known unavailable");
                return None;
            }
            None => {}
        }

        let fragments = match self.fetcher.fetch(document).await {
            Some(bytes) => match self.extractor.extract(&bytes) {
                Ok(fragments) => fragments,
                Err(e) => {
                    warn!(document = %document.id, error = %e, "fragment extraction failed");
                    Vec::new()
                }
            },
            None => {
                warn!(document = %document.id, "document fetch returned nothing");
                Vec::new()
            }
        };

        if fragments.is_empty() {
            self.raw.set_negative(key);
            None
        } else {
            let fragments = Arc::new(fragments);
            self.raw.set_positive(key, Arc::clone(&fragments));
            Some(fragments)
        }
    }

    /// Takes ranked fragments until the per-document budget is spent.
    fn select(&self, fragments: &[String], ranked: &[RankedFragment]) -> String {
        let mut chunks = Vec::new();
        let mut used_chars = 0usize;
        for candidate in ranked {
            let Some(text) = fragments.get(candidate.index) else {
                continue;
            };
            let len = text.chars().count();
            if len < self.budget.min_fragment_chars {
                continue;
            }
            chunks.push(format!("(p.{}) {}", candidate.index + 1, text));
            used_chars += len;
            if used_chars >= self.budget.max_chars_per_document
                || chunks.len() >= self.budget.max_fragments_per_document
            {
                break;
            }
        }
        chunks.join("\n\n")
    }

    pub fn raw_stats(&self) -> StoreStats {
        self.raw.stats()
    }

    pub fn context_stats(&self) -> StoreStats {
        self.derived.stats()
    }
}

fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_extractor_splits_pages() {
        let pages = PlainTextExtractor
            .extract("first page\u{c}\u{c}  second page \u{c}".as_bytes())
            .unwrap();
        assert_eq!(pages, vec!["first page", "second page"]);
    }

    #[test]
    fn test_plain_text_extractor_rejects_binary() {
        let err = PlainTextExtractor.extract(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let mut s = "ñandú".to_string();
        truncate_chars(&mut s, 3);
        assert_eq!(s, "ñan");
        let mut short = "abc".to_string();
        truncate_chars(&mut short, 10);
        assert_eq!(short, "abc");
    }
}
