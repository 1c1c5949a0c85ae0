//! Coalescing Demo
//!
//! Fires a burst of identical requests at an orchestrator backed by a slow,
//! in-memory generator, then a rate-limited one, and prints what each caller got.
//!
//! Run with `RUST_LOG=quizgen_cache=debug cargo run --example coalescing`.

use async_trait::async_trait;
use quizgen_cache::context::{DocumentFetcher, SourceDocument, StaticCatalog};
use quizgen_cache::generation::{GeneratedQuiz, PrimaryGenerator, QuizQuestion};
use quizgen_cache::{DerivedContext, Error, GenerationRequest, Orchestrator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct SlowBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl PrimaryGenerator for SlowBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        context: &DerivedContext,
    ) -> quizgen_cache::Result<GeneratedQuiz> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(GeneratedQuiz {
            title: format!("CUESTIONARIO - {}", request.topic.to_uppercase()),
            questions: vec![QuizQuestion::new(
                format!("¿Qué aprendiste sobre {}?", request.topic),
                format!("Según {} fuentes, bastante.", context.references.len()),
            )],
        })
    }
}

struct Throttled;

#[async_trait]
impl PrimaryGenerator for Throttled {
    async fn generate(&self, _: &GenerationRequest, _: &DerivedContext) -> quizgen_cache::Result<GeneratedQuiz> {
        Err(Error::remote(429, "Too Many Requests"))
    }
}

struct Shelf;

#[async_trait]
impl DocumentFetcher for Shelf {
    async fn fetch(&self, _document: &SourceDocument) -> Option<bytes::Bytes> {
        Some(bytes::Bytes::from_static(
            "La fotosíntesis ocurre en los cloroplastos de las hojas. Las plantas captan la luz \
             solar y la transforman en energía química almacenada como glucosa."
                .as_bytes(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quizgen_cache=info")))
        .init();

    let catalog = StaticCatalog::new(vec![SourceDocument::new(
        "cn-5a",
        "Ciencias Naturales 5",
        "Ciencias",
        "5A",
    )]);
    let backend = Arc::new(SlowBackend {
        calls: AtomicUsize::new(0),
    });
    let orch = Orchestrator::builder()
        .with_catalog(Arc::new(catalog))
        .with_fetcher(Arc::new(Shelf))
        .with_primary(backend.clone())
        .build()?;

    let request = GenerationRequest::new("es", "5A", "Ciencias", "Fotosíntesis");
    let mut handles = Vec::new();
    for _ in 0..10 {
        let orch = orch.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move { orch.generate_with_outcome(&request).await }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let (result, outcome) = handle.await?;
        println!("caller {:>2}: {:?}, {} bytes", i, outcome, result.document.len());
    }
    println!("backend calls: {}", backend.calls.load(Ordering::SeqCst));

    let (_, outcome) = orch.generate_with_outcome(&request).await;
    println!("repeat: {:?}", outcome);
    println!("signals: {:?}", orch.signals());

    let throttled = Orchestrator::builder().with_primary(Arc::new(Throttled)).build()?;
    for attempt in 1..=2 {
        let (_, outcome) = throttled.generate_with_outcome(&request).await;
        println!("throttled attempt {}: {:?}", attempt, outcome);
    }

    Ok(())
}
