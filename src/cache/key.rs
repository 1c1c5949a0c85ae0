//! Cache key generation.

use sha2::{Digest, Sha256};

/// Opaque, immutable cache key.
///
/// The string form is the hex SHA-256 of the canonical field tuple, so keys
/// are fixed-length regardless of topic length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn builder() -> CacheKeyBuilder {
        CacheKeyBuilder::new()
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Order-stable key derivation from a request's semantic fields.
///
/// Every field is trimmed. Fields added with [`CacheKeyBuilder::folded`] are
/// also lower-cased; the rest are compared verbatim. Missing fields count as
/// the empty string, so building never fails.
///
/// ```rust
/// use quizgen_cache::cache::CacheKey;
///
/// let a = CacheKey::builder().field("es").field(" 5A ").folded("Fotosíntesis").build();
/// let b = CacheKey::builder().field("es").field("5A").folded("  fotosíntesis").build();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    parts: Vec<String>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn field(mut self, value: &str) -> Self {
        self.parts.push(value.trim().to_string());
        self
    }

    pub fn field_opt(self, value: Option<&str>) -> Self {
        self.field(value.unwrap_or_default())
    }

    /// Adds a free-text field compared case-insensitively (topic text).
    pub fn folded(mut self, value: &str) -> Self {
        self.parts.push(value.trim().to_lowercase());
        self
    }

    pub fn build(&self) -> CacheKey {
        // A JSON array keeps field boundaries unambiguous: ["a|b", ""] and ["a", "b"] differ.
        let canonical = serde_json::to_string(&self.parts).unwrap_or_else(|_| self.parts.join("\u{1f}"));
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey { hash }
    }
}
