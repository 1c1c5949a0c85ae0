//! # quizgen-cache
//!
//! Request caching, coalescing and fallback core for a grounded quiz-generation service.
//!
//! ## Overview
//!
//! Generating a quiz means fetching course documents, extracting and ranking
//! their fragments, and calling a slow, rate-limited text-generation backend.
//! This crate sits in front of all of that and guarantees three things:
//!
//! - **Reuse**: identical requests inside a freshness window are served from cache
//! - **Coalescing**: concurrent identical requests trigger exactly one computation
//! - **Totality**: every request gets a well-formed result, falling back to a
//!   locally synthesized quiz when the primary path fails
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizgen_cache::generation::{GeneratedQuiz, PrimaryGenerator, QuizQuestion};
//! use quizgen_cache::{DerivedContext, GenerationRequest, Orchestrator, ServiceConfig};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl PrimaryGenerator for Echo {
//!     async fn generate(
//!         &self,
//!         request: &GenerationRequest,
//!         _context: &DerivedContext,
//!     ) -> quizgen_cache::Result<GeneratedQuiz> {
//!         Ok(GeneratedQuiz {
//!             title: request.topic.to_uppercase(),
//!             questions: vec![QuizQuestion::new("?", "!")],
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> quizgen_cache::Result<()> {
//!     let orchestrator = Orchestrator::builder()
//!         .with_config(ServiceConfig::from_path("quizgen.yaml")?)
//!         .with_primary(Arc::new(Echo))
//!         .build()?;
//!
//!     let request = GenerationRequest::new("es", "5A", "Ciencias", "Fotosíntesis");
//!     let (result, outcome) = orchestrator.generate_with_outcome(&request).await;
//!     println!("{:?}: {} bytes", outcome, result.document.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Cache keys, TTL stores with negative entries, in-flight coalescing |
//! | [`config`] | Tier TTLs, capacities and context budgets |
//! | [`context`] | Document retrieval, fragment ranking and context assembly |
//! | [`generation`] | Orchestrator, failure classification and fallback synthesis |
//! | [`types`] | Request and result value types |

pub mod cache;
pub mod config;
pub mod context;
pub mod generation;
pub mod types;

// Re-export main types for convenience
pub use config::ServiceConfig;
pub use context::{ContextAssembler, DerivedContext, SourceDocument};
pub use generation::{CacheSignals, Orchestrator, OrchestratorBuilder, Outcome};
pub use types::{GenerationRequest, GenerationResult};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
