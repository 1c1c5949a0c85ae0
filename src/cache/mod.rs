//! Cache primitives: key derivation, TTL stores and request coalescing.
//!
//! # Caching Module
//!
//! Every expensive step on the generation path (document fetch + extraction,
//! context selection, the backend call) sits behind these primitives.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheKey`] | Opaque key derived from an ordered tuple of request fields |
//! | [`CacheKeyBuilder`] | Trims fields and case-folds topic text before hashing |
//! | [`TtlStore`] | Bounded FIFO store with separate positive and negative TTLs |
//! | [`CachedValue`] | `Positive(V)` or `Negative` (a remembered failure) |
//! | [`Singleflight`] | At most one in-flight computation per key |
//!
//! ## Example
//!
//! ```rust
//! use quizgen_cache::cache::{CacheKey, CachedValue, TtlStore};
//! use quizgen_cache::config::TierConfig;
//! use std::time::Duration;
//!
//! let store = TtlStore::new(&TierConfig::new(
//!     Duration::from_secs(600),
//!     Duration::from_secs(30),
//!     128,
//! ));
//! let key = CacheKey::builder().field("es").folded("Fotosíntesis").build();
//! store.set_positive(key.clone(), "quiz".to_string());
//! assert_eq!(store.get(&key), Some(CachedValue::Positive("quiz".to_string())));
//! ```

mod key;
mod singleflight;
mod store;

pub use key::{CacheKey, CacheKeyBuilder};
pub use singleflight::{FlightError, Singleflight};
pub use store::{CachedValue, StoreStats, TtlStore};
