//! Generation orchestration: the single entry point upstream callers use.
//!
//! # Generation Module
//!
//! [`Orchestrator::generate`] always returns a well-formed
//! [`GenerationResult`]. In order, it tries:
//!
//! 1. the output tier (a fresh positive entry is returned as-is);
//! 2. an in-flight computation for the same key (joined, not repeated);
//! 3. context assembly followed by the [`PrimaryGenerator`];
//! 4. the [`FallbackBuilder`], whenever step 3 fails for any reason.
//!
//! Fallback results are never stored as positive entries. Only rate-limited
//! failures leave a negative entry behind, which turns requests for the same
//! key into immediate fallbacks until the output tier's negative TTL lapses.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quizgen_cache::generation::{GeneratedQuiz, Orchestrator, PrimaryGenerator};
//! use quizgen_cache::{DerivedContext, GenerationRequest, Result};
//! use std::sync::Arc;
//!
//! struct Backend;
//!
//! #[async_trait::async_trait]
//! impl PrimaryGenerator for Backend {
//!     async fn generate(&self, _: &GenerationRequest, _: &DerivedContext) -> Result<GeneratedQuiz> {
//!         unimplemented!()
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let orchestrator = Orchestrator::builder().with_primary(Arc::new(Backend)).build()?;
//! let result = orchestrator
//!     .generate(&GenerationRequest::new("es", "5A", "Ciencias", "Fotosíntesis"))
//!     .await;
//! println!("{}", result.document);
//! # Ok(())
//! # }
//! ```

mod classify;
mod fallback;
mod render;

pub use classify::{classify, is_rate_limit_message, FailureClass};
pub use fallback::TemplateFallback;
pub use render::render_quiz;

use crate::cache::{CacheKey, CachedValue, Singleflight, StoreStats, TtlStore};
use crate::config::ServiceConfig;
use crate::context::{
    ContextAssembler, DerivedContext, DocumentFetcher, FragmentExtractor, HttpDocumentFetcher,
    KeywordScorer, PlainTextExtractor, RelevanceScorer, SourceCatalog, StaticCatalog,
};
use crate::types::{GenerationRequest, GenerationResult};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub expected_answer: String,
}

impl QuizQuestion {
    pub fn new(question: impl Into<String>, expected_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expected_answer: expected_answer.into(),
        }
    }
}

/// Structured payload returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuiz {
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

impl GeneratedQuiz {
    /// Rejects payloads that would render into an unusable document.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation_with_context(
                "quiz title is empty",
                ErrorContext::new()
                    .with_field_path("quiz.title")
                    .with_source("payload_validator"),
            ));
        }
        if self.questions.is_empty() {
            return Err(Error::validation_with_context(
                "quiz has no questions",
                ErrorContext::new()
                    .with_field_path("quiz.questions")
                    .with_source("payload_validator"),
            ));
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.question.trim().is_empty() || q.expected_answer.trim().is_empty() {
                return Err(Error::validation_with_context(
                    "quiz question is incomplete",
                    ErrorContext::new()
                        .with_field_path(format!("quiz.questions[{}]", i))
                        .with_source("payload_validator"),
                ));
            }
        }
        Ok(())
    }
}

/// The expensive external call. May fail, including with rate limits.
#[async_trait]
pub trait PrimaryGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest, context: &DerivedContext) -> Result<GeneratedQuiz>;
}

/// Local synthesis that always succeeds and makes no external calls.
pub trait FallbackBuilder: Send + Sync {
    fn build(&self, request: &GenerationRequest, context: &DerivedContext) -> GenerationResult;
}

/// How a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from the output tier.
    Cached,
    /// Produced by the primary generator (and now cached).
    Generated,
    /// Primary path failed; a fallback was synthesized.
    Fallback { reason: FailureClass },
    /// A recent rate limit for this key is still in its backoff window.
    BackedOff,
}

impl Outcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback { .. } | Outcome::BackedOff)
    }
}

#[derive(Debug, Clone)]
struct Settled {
    result: GenerationResult,
    outcome: Outcome,
}

/// Facts about the cache tiers, for dashboards and tests.
#[derive(Debug, Clone, Default)]
pub struct CacheSignals {
    pub raw_content: StoreStats,
    pub derived_context: StoreStats,
    pub output: StoreStats,
    pub output_entries: usize,
    pub in_flight: usize,
}

struct Inner {
    output: TtlStore<GenerationResult>,
    flights: Singleflight<Settled>,
    assembler: ContextAssembler,
    primary: Arc<dyn PrimaryGenerator>,
    fallback: Arc<dyn FallbackBuilder>,
}

/// Cheap to clone; clones share caches and the in-flight registry.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.generate_with_outcome(request).await.0
    }

    pub async fn generate_with_outcome(&self, request: &GenerationRequest) -> (GenerationResult, Outcome) {
        let key = request.cache_key();
        match self.inner.output.get(&key) {
            Some(CachedValue::Positive(result)) => {
                debug!(key = %key, topic = %request.topic, "output cache hit");
                return (result, Outcome::Cached);
            }
            Some(CachedValue::Negative) => {
                let settled = self.inner.backed_off(request).await;
                return (settled.result, settled.outcome);
            }
            None => {}
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let owned_request = request.clone();
        let flight = self
            .inner
            .flights
            .run_exclusive(&key, move || async move { inner.work(&owned_key, &owned_request).await })
            .await;

        match flight {
            Ok(settled) => (settled.result, settled.outcome),
            Err(e) => {
                error!(key = %key, topic = %request.topic, error = %e, "generation flight failed, using fallback");
                (
                    self.inner.fallback.build(request, &DerivedContext::empty()),
                    Outcome::Fallback {
                        reason: FailureClass::Unexpected,
                    },
                )
            }
        }
    }

    pub fn signals(&self) -> CacheSignals {
        CacheSignals {
            raw_content: self.inner.assembler.raw_stats(),
            derived_context: self.inner.assembler.context_stats(),
            output: self.inner.output.stats(),
            output_entries: self.inner.output.len(),
            in_flight: self.inner.flights.in_flight(),
        }
    }
}

impl Inner {
    async fn work(&self, key: &CacheKey, request: &GenerationRequest) -> Settled {
        // A flight that finished between our cache check and registration already stored its result.
        match self.output.get(key) {
            Some(CachedValue::Positive(result)) => {
                return Settled {
                    result,
                    outcome: Outcome::Cached,
                }
            }
            Some(CachedValue::Negative) => return self.backed_off(request).await,
            None => {}
        }

        let context = self.assembler.assemble(request).await;
        let attempt = match self.primary.generate(request, &context).await {
            Ok(quiz) => quiz.validate().map(|()| quiz),
            Err(e) => Err(e),
        };

        match attempt {
            Ok(quiz) => {
                let result = render_quiz(request, &quiz, &context.references);
                self.output.set_positive(key.clone(), result.clone());
                info!(
                    key = %key,
                    topic = %request.topic,
                    questions = quiz.questions.len(),
                    grounded = !context.is_empty(),
                    "quiz generated"
                );
                Settled {
                    result,
                    outcome: Outcome::Generated,
                }
            }
            Err(e) => {
                let reason = classify(&e);
                if reason.backs_off() {
                    warn!(key = %key, topic = %request.topic, rate_limited = true, error = %e, "primary generation rate limited, using fallback");
                    self.output.set_negative(key.clone());
                } else {
                    warn!(key = %key, topic = %request.topic, reason = %reason, error = %e, "primary generation failed, using fallback");
                }
                Settled {
                    result: self.fallback.build(request, &context),
                    outcome: Outcome::Fallback { reason },
                }
            }
        }
    }

    async fn backed_off(&self, request: &GenerationRequest) -> Settled {
        debug!(topic = %request.topic, "rate-limit backoff active, using fallback");
        let context = self.assembler.assemble(request).await;
        Settled {
            result: self.fallback.build(request, &context),
            outcome: Outcome::BackedOff,
        }
    }
}

/// Builder for [`Orchestrator`]. Only the primary generator is required.
///
/// Defaults: empty [`StaticCatalog`], [`HttpDocumentFetcher`],
/// [`PlainTextExtractor`], [`KeywordScorer`], [`TemplateFallback`] and
/// [`ServiceConfig::default`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: ServiceConfig,
    catalog: Option<Arc<dyn SourceCatalog>>,
    fetcher: Option<Arc<dyn DocumentFetcher>>,
    extractor: Option<Arc<dyn FragmentExtractor>>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    primary: Option<Arc<dyn PrimaryGenerator>>,
    fallback: Option<Arc<dyn FallbackBuilder>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn SourceCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FragmentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_primary(mut self, primary: Arc<dyn PrimaryGenerator>) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackBuilder>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        let primary = self.primary.ok_or_else(|| {
            Error::configuration_with_context(
                "a primary generator is required",
                ErrorContext::new()
                    .with_field_path("primary")
                    .with_source("orchestrator_builder"),
            )
        })?;
        let fetcher: Arc<dyn DocumentFetcher> = match self.fetcher {
            Some(f) => f,
            None => Arc::new(HttpDocumentFetcher::new()?),
        };
        let assembler = ContextAssembler::new(
            &self.config,
            self.catalog.unwrap_or_else(|| Arc::new(StaticCatalog::default())),
            fetcher,
            self.extractor.unwrap_or_else(|| Arc::new(PlainTextExtractor)),
            self.scorer.unwrap_or_else(|| Arc::new(KeywordScorer)),
        );
        Ok(Orchestrator {
            inner: Arc::new(Inner {
                output: TtlStore::new(&self.config.cache.output),
                flights: Singleflight::new(),
                assembler,
                primary,
                fallback: self.fallback.unwrap_or_else(|| Arc::new(TemplateFallback)),
            }),
        })
    }
}
