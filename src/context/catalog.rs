use super::{SourceCatalog, SourceDocument};
use crate::types::GenerationRequest;
use crate::Result;
use std::path::Path;

/// Fixed list of course documents, loaded once at startup.
///
/// A document is a candidate when it belongs to the request's course and its
/// title or subject equals the requested material.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    documents: Vec<SourceDocument>,
}

impl StaticCatalog {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }

    /// Reads a YAML (or JSON) list of documents.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let documents: Vec<SourceDocument> = serde_yaml::from_str(content)?;
        Ok(Self::new(documents))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SourceCatalog for StaticCatalog {
    fn candidates(&self, request: &GenerationRequest) -> Vec<SourceDocument> {
        let course = request.course.trim();
        let material = request.material.trim();
        self.documents
            .iter()
            .filter(|d| d.course == course && (d.title == material || d.subject == material))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            SourceDocument::new("cn-5a", "Ciencias Naturales 5", "Ciencias", "5A"),
            SourceDocument::new("hi-5a", "Historia 5", "Historia", "5A"),
            SourceDocument::new("cn-6a", "Ciencias Naturales 6", "Ciencias", "6A"),
        ])
    }

    #[test]
    fn test_matches_by_subject_or_title() {
        let by_subject = catalog().candidates(&GenerationRequest::new("es", "5A", "Ciencias", "x"));
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].id, "cn-5a");

        let by_title = catalog().candidates(&GenerationRequest::new("es", "5A", "Historia 5", "x"));
        assert_eq!(by_title[0].id, "hi-5a");
    }

    #[test]
    fn test_other_course_is_not_a_candidate() {
        let none = catalog().candidates(&GenerationRequest::new("es", "7A", "Ciencias", "x"));
        assert!(none.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
- id: cn-5a
  title: Ciencias Naturales 5
  subject: Ciencias
  course: 5A
  url: https://drive.google.com/file/d/abc123/view?usp=sharing
"#;
        let catalog = StaticCatalog::from_yaml_str(yaml).unwrap();
        assert_eq!(catalog.len(), 1);
        let docs = catalog.candidates(&GenerationRequest::new("es", " 5A ", "Ciencias", "agua"));
        assert_eq!(docs[0].url.as_deref(), Some("https://drive.google.com/file/d/abc123/view?usp=sharing"));
    }
}
