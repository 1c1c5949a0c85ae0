//! Request and result value types.

use crate::cache::CacheKey;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// What the caller asks for. Two requests are equal when they derive the same
/// cache key: surrounding whitespace and topic case do not matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Output language tag, e.g. `"es"` or `"en"`.
    pub language: String,
    pub course: String,
    /// Book title or subject the quiz is drawn from.
    pub material: String,
    pub topic: String,
}

impl GenerationRequest {
    pub fn new(
        language: impl Into<String>,
        course: impl Into<String>,
        material: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            course: course.into(),
            material: material.into(),
            topic: topic.into(),
        }
    }

    /// Key of the final output for this request.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::builder()
            .field(&self.language)
            .field(&self.course)
            .field(&self.material)
            .folded(&self.topic)
            .build()
    }

    /// Key of the derived context. Language does not change which fragments are relevant.
    pub fn context_key(&self) -> CacheKey {
        CacheKey::builder()
            .field(&self.course)
            .field(&self.material)
            .folded(&self.topic)
            .build()
    }

    pub fn is_spanish(&self) -> bool {
        self.language.trim().eq_ignore_ascii_case("es")
    }
}

impl PartialEq for GenerationRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cache_key() == other.cache_key()
    }
}

impl Eq for GenerationRequest {}

impl Hash for GenerationRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cache_key().hash(state);
    }
}

/// A finished, well-formed document plus the sources it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Rendered quiz (HTML fragment).
    pub document: String,
    #[serde(default)]
    pub references: Vec<String>,
}

impl GenerationResult {
    pub fn new(document: impl Into<String>, references: Vec<String>) -> Self {
        Self {
            document: document.into(),
            references,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_equality_follows_key() {
        let a = GenerationRequest::new("es", "5A", "Ciencias", "Fotosíntesis");
        let b = GenerationRequest::new("es ", " 5A", "Ciencias", "fotosíntesis ");
        assert_eq!(a, b);
        assert_ne!(a, GenerationRequest::new("en", "5A", "Ciencias", "Fotosíntesis"));
    }

    #[test]
    fn test_context_key_ignores_language() {
        let es = GenerationRequest::new("es", "5A", "Ciencias", "Agua");
        let en = GenerationRequest::new("en", "5A", "Ciencias", "Agua");
        assert_eq!(es.context_key(), en.context_key());
        assert_ne!(es.cache_key(), en.cache_key());
    }

    #[test]
    fn test_is_spanish() {
        assert!(GenerationRequest::new(" ES", "", "", "").is_spanish());
        assert!(!GenerationRequest::new("en", "", "", "").is_spanish());
    }

    #[test]
    fn test_request_deserializes_from_json() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"language":"es","course":"5A","material":"Ciencias","topic":"Fotosíntesis"}"#,
        )
        .unwrap();
        assert_eq!(req.topic, "Fotosíntesis");
    }
}
