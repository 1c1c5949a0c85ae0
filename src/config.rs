//! Service configuration: cache tiers and context budgets.
//!
//! Every section has defaults, so an empty YAML document is a valid config.
//! Durations are written in milliseconds:
//!
//! ```yaml
//! cache:
//!   output:
//!     positive_ttl_ms: 600000
//!     negative_ttl_ms: 30000
//!     max_entries: 128
//! context:
//!   max_total_chars: 14000
//! ```

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// TTLs and size bound for one cache tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Freshness window for successful results.
    #[serde(rename = "positive_ttl_ms", with = "duration_ms")]
    pub positive_ttl: Duration,
    /// Freshness window for recorded failures. Must be shorter than `positive_ttl`.
    #[serde(rename = "negative_ttl_ms", with = "duration_ms")]
    pub negative_ttl: Duration,
    pub max_entries: usize,
}

impl TierConfig {
    pub fn new(positive_ttl: Duration, negative_ttl: Duration, max_entries: usize) -> Self {
        Self {
            positive_ttl,
            negative_ttl,
            max_entries,
        }
    }

    pub fn with_positive_ttl(mut self, ttl: Duration) -> Self {
        self.positive_ttl = ttl;
        self
    }

    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    fn validate(&self, path: &str) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::configuration_with_context(
                "max_entries must be at least 1",
                ErrorContext::new()
                    .with_field_path(format!("{}.max_entries", path))
                    .with_source("config_validator"),
            ));
        }
        if self.negative_ttl >= self.positive_ttl {
            return Err(Error::configuration_with_context(
                "negative ttl must be shorter than positive ttl",
                ErrorContext::new()
                    .with_field_path(format!("{}.negative_ttl_ms", path))
                    .with_details(format!(
                        "negative={}ms positive={}ms",
                        self.negative_ttl.as_millis(),
                        self.positive_ttl.as_millis()
                    ))
                    .with_source("config_validator"),
            ));
        }
        Ok(())
    }
}

/// A tier as written in YAML; absent fields take that tier's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TierOverrides {
    positive_ttl_ms: Option<u64>,
    negative_ttl_ms: Option<u64>,
    max_entries: Option<usize>,
}

impl TierOverrides {
    fn apply(self, mut tier: TierConfig) -> TierConfig {
        if let Some(ms) = self.positive_ttl_ms {
            tier.positive_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = self.negative_ttl_ms {
            tier.negative_ttl = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_entries {
            tier.max_entries = max;
        }
        tier
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheOverrides {
    raw_content: TierOverrides,
    derived_context: TierOverrides,
    output: TierOverrides,
}

impl From<CacheOverrides> for CacheConfig {
    fn from(overrides: CacheOverrides) -> Self {
        let defaults = CacheConfig::default();
        Self {
            raw_content: overrides.raw_content.apply(defaults.raw_content),
            derived_context: overrides.derived_context.apply(defaults.derived_context),
            output: overrides.output.apply(defaults.output),
        }
    }
}

/// The three cache tiers guarding the generation path.
///
/// Each tier may be written partially; missing fields keep that tier's own defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CacheOverrides")]
pub struct CacheConfig {
    /// Extracted document fragments, keyed by document id.
    pub raw_content: TierConfig,
    /// Assembled context, keyed by course, material and topic.
    pub derived_context: TierConfig,
    /// Final results. The negative TTL is the backoff window after a rate limit.
    pub output: TierConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            raw_content: TierConfig::new(
                Duration::from_secs(30 * 60),
                Duration::from_secs(5 * 60),
                8,
            ),
            derived_context: TierConfig::new(
                Duration::from_secs(15 * 60),
                Duration::from_secs(2 * 60),
                32,
            ),
            output: TierConfig::new(Duration::from_secs(10 * 60), Duration::from_secs(30), 128),
        }
    }
}

impl CacheConfig {
    pub fn with_raw_content(mut self, tier: TierConfig) -> Self {
        self.raw_content = tier;
        self
    }

    pub fn with_derived_context(mut self, tier: TierConfig) -> Self {
        self.derived_context = tier;
        self
    }

    pub fn with_output(mut self, tier: TierConfig) -> Self {
        self.output = tier;
        self
    }
}

/// Bounds on how much document text feeds one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
    pub max_chars_per_document: usize,
    pub max_fragments_per_document: usize,
    pub max_total_chars: usize,
    /// Fragments shorter than this are treated as noise (headers, page numbers).
    pub min_fragment_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_chars_per_document: 6_000,
            max_fragments_per_document: 12,
            max_total_chars: 14_000,
            min_fragment_chars: 100,
        }
    }
}

impl ContextBudget {
    pub fn with_max_chars_per_document(mut self, n: usize) -> Self {
        self.max_chars_per_document = n;
        self
    }

    pub fn with_max_fragments_per_document(mut self, n: usize) -> Self {
        self.max_fragments_per_document = n;
        self
    }

    pub fn with_max_total_chars(mut self, n: usize) -> Self {
        self.max_total_chars = n;
        self
    }

    pub fn with_min_fragment_chars(mut self, n: usize) -> Self {
        self.min_fragment_chars = n;
        self
    }

    fn validate(&self) -> Result<()> {
        let checks = [
            ("context.max_chars_per_document", self.max_chars_per_document),
            ("context.max_fragments_per_document", self.max_fragments_per_document),
            ("context.max_total_chars", self.max_total_chars),
        ];
        for (path, value) in checks {
            if value == 0 {
                return Err(Error::configuration_with_context(
                    "context budget must be positive",
                    ErrorContext::new()
                        .with_field_path(path)
                        .with_source("config_validator"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub context: ContextBudget,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_context(mut self, context: ContextBudget) -> Self {
        self.context = context;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.raw_content.validate("cache.raw_content")?;
        self.cache.derived_context.validate("cache.derived_context")?;
        self.cache.output.validate("cache.output")?;
        self.context.validate()
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = if content.trim().is_empty() {
            ServiceConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.raw_content.positive_ttl, Duration::from_secs(1800));
        assert_eq!(config.cache.derived_context.negative_ttl, Duration::from_secs(120));
        assert_eq!(config.context.max_total_chars, 14_000);
    }

    #[test]
    fn test_negative_ttl_must_be_shorter() {
        let cache = CacheConfig::default().with_output(TierConfig::new(
            Duration::from_secs(10),
            Duration::from_secs(10),
            4,
        ));
        let err = ServiceConfig::new().with_cache(cache).validate().unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(ctx.field_path.as_deref(), Some("cache.output.negative_ttl_ms"));
    }

    #[test]
    fn test_zero_entries_rejected() {
        let cache = CacheConfig::default()
            .with_raw_content(CacheConfig::default().raw_content.with_max_entries(0));
        assert!(ServiceConfig::new().with_cache(cache).validate().is_err());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let config = ServiceConfig::new().with_context(ContextBudget::default().with_max_total_chars(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
cache:
  output:
    positive_ttl_ms: 10
    negative_ttl_ms: 5
    max_entries: 2
context:
  max_fragments_per_document: 3
"#;
        let config = ServiceConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache.output.positive_ttl, Duration::from_millis(10));
        assert_eq!(config.cache.output.max_entries, 2);
        assert_eq!(config.cache.raw_content, CacheConfig::default().raw_content);
        assert_eq!(config.context.max_fragments_per_document, 3);
        assert_eq!(config.context.max_chars_per_document, 6_000);
    }

    #[test]
    fn test_partial_tier_keeps_tier_defaults() {
        let yaml = r#"
cache:
  output:
    positive_ttl_ms: 120000
  derived_context:
    max_entries: 4
"#;
        let config = ServiceConfig::from_yaml_str(yaml).unwrap();
        let defaults = CacheConfig::default();
        assert_eq!(config.cache.output.positive_ttl, Duration::from_secs(120));
        assert_eq!(config.cache.output.negative_ttl, defaults.output.negative_ttl);
        assert_eq!(config.cache.output.max_entries, defaults.output.max_entries);
        assert_eq!(config.cache.derived_context.max_entries, 4);
        assert_eq!(config.cache.derived_context.positive_ttl, defaults.derived_context.positive_ttl);
        assert_eq!(config.cache.raw_content, defaults.raw_content);
    }

    #[test]
    fn test_partial_tier_still_validated() {
        let yaml = r#"
cache:
  output:
    positive_ttl_ms: 1000
"#;
        let err = ServiceConfig::from_yaml_str(yaml).unwrap_err();
        assert_eq!(
            err.context().unwrap().field_path.as_deref(),
            Some("cache.output.negative_ttl_ms")
        );
    }

    #[test]
    fn test_unknown_tier_field_rejected() {
        let err = ServiceConfig::from_yaml_str("cache:\n  output:\n    positive_ttl: 5\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ServiceConfig::from_yaml_str("").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_invalid_yaml_reports_yaml_error() {
        let err = ServiceConfig::from_yaml_str("cache: [not, a, map]").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_yaml_roundtrip_of_defaults() {
        let text = serde_yaml::to_string(&ServiceConfig::default()).unwrap();
        assert!(text.contains("positive_ttl_ms: 1800000"));
        assert_eq!(ServiceConfig::from_yaml_str(&text).unwrap(), ServiceConfig::default());
    }
}
