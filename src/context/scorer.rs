use super::{RankedFragment, RelevanceScorer};
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;

static TERM_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static regex is valid"));

const TOPIC_TERM_WEIGHT: f64 = 3.0;
const HINT_TERM_WEIGHT: f64 = 1.0;
/// Length prior: one point per 5000 characters, capped at two.
const LENGTH_PRIOR_CAP: f64 = 2.0;
const LENGTH_PRIOR_SCALE: f64 = 5_000.0;

fn terms(text: &str) -> Vec<String> {
    TERM_SPLIT
        .split(&text.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keyword-overlap relevance: topic terms weigh three times subject terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl KeywordScorer {
    pub fn score(fragment: &str, topic_terms: &[String], hint_terms: &[String]) -> f64 {
        let low = fragment.to_lowercase();
        let topic = topic_terms.iter().filter(|t| low.contains(t.as_str())).count() as f64;
        let hint = hint_terms.iter().filter(|t| low.contains(t.as_str())).count() as f64;
        let prior = (fragment.chars().count() as f64 / LENGTH_PRIOR_SCALE).min(LENGTH_PRIOR_CAP);
        topic * TOPIC_TERM_WEIGHT + hint * HINT_TERM_WEIGHT + prior
    }
}

impl RelevanceScorer for KeywordScorer {
    fn rank(&self, fragments: &[String], topic: &str, hint: Option<&str>) -> Result<Vec<RankedFragment>> {
        let topic_terms = terms(topic);
        let hint_terms = hint.map(terms).unwrap_or_default();
        let mut ranked: Vec<RankedFragment> = fragments
            .iter()
            .enumerate()
            .map(|(index, text)| RankedFragment {
                index,
                score: Self::score(text, &topic_terms, &hint_terms),
            })
            .collect();
        // Stable sort: equal scores keep document order.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }
}
