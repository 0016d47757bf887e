use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::time::primitive_now_utc;
use crate::db::types::AspectScore;
use crate::repositories::store::GradingStore;

use super::client::GradeRequest;

/// A previously computed grade, reusable for an identical request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CachedGrade {
    pub(crate) score: f64,
    pub(crate) feedback: String,
    pub(crate) aspect_scores: Vec<AspectScore>,
}

#[derive(Serialize)]
struct CacheKeyMaterial<'a> {
    question: &'a str,
    keywords: &'a str,
    ideal_answer: &'a str,
    essay: &'a str,
    rubric: Vec<(&'a str, Vec<(i64, &'a str)>)>,
}

/// Hex SHA-256 of the normalized request.
///
/// Text fields are trimmed. Aspect order is kept; descriptors are ordered by score.
pub(crate) fn cache_key(request: &GradeRequest) -> String {
    let material = CacheKeyMaterial {
        question: request.question_text.trim(),
        keywords: request.keywords.as_deref().unwrap_or_default().trim(),
        ideal_answer: request.ideal_answer.as_deref().unwrap_or_default().trim(),
        essay: request.essay_text.trim(),
        rubric: request
            .rubric
            .aspects()
            .iter()
            .map(|aspect| {
                let mut descriptors = aspect
                    .descriptors
                    .iter()
                    .map(|(score, description)| (*score, description.trim()))
                    .collect::<Vec<_>>();
                descriptors.sort_by_key(|(score, _)| *score);
                (aspect.name.trim(), descriptors)
            })
            .collect(),
    };

    // Serializing borrowed strings and integers cannot fail.
    let encoded = serde_json::to_vec(&material).unwrap_or_default();
    hex::encode(Sha256::digest(&encoded))
}

/// Dedup layer in front of the provider. Failures are logged and treated as misses.
#[derive(Clone)]
pub(crate) struct GradingCache {
    store: Arc<dyn GradingStore>,
}

impl GradingCache {
    pub(crate) fn new(store: Arc<dyn GradingStore>) -> Self {
        Self { store }
    }

    pub(crate) async fn lookup(&self, key: &str) -> Option<CachedGrade> {
        match self.store.cache_touch_and_fetch(key, primitive_now_utc()).await {
            Ok(Some(entry)) => {
                metrics::counter!("grading_cache_total", "result" => "hit").increment(1);
                Some(CachedGrade {
                    score: entry.score,
                    feedback: entry.feedback,
                    aspect_scores: entry.aspect_scores.0,
                })
            }
            Ok(None) => {
                metrics::counter!("grading_cache_total", "result" => "miss").increment(1);
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, cache_key = key, "Grading cache lookup failed");
                metrics::counter!("grading_cache_total", "result" => "error").increment(1);
                None
            }
        }
    }

    pub(crate) async fn store(&self, key: &str, grade: &CachedGrade) {
        if let Err(err) = self
            .store
            .cache_upsert(
                key,
                grade.score,
                &grade.feedback,
                &grade.aspect_scores,
                primitive_now_utc(),
            )
            .await
        {
            tracing::warn!(error = %err, cache_key = key, "Grading cache store failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::grading::rubric::Rubric;
    use crate::test_support::InMemoryStore;
    use serde_json::json;

    fn request(essay: &str, rubric: serde_json::Value) -> GradeRequest {
        GradeRequest {
            question_text: "Why do leaves change colour?".to_string(),
            ideal_answer: Some("Chlorophyll breaks down.".to_string()),
            keywords: Some("chlorophyll, autumn".to_string()),
            essay_text: essay.to_string(),
            rubric: Rubric::from_json(&rubric).expect("rubric"),
        }
    }

    fn rubric() -> serde_json::Value {
        json!([
            {"aspect": "Accuracy", "descriptors": {"0": "wrong", "2": "right"}},
            {"aspect": "Clarity", "descriptors": {"0": "vague", "1": "clear"}}
        ])
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = cache_key(&request("Because of chlorophyll.", rubric()));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_ignores_surrounding_whitespace() {
        let plain = request("Because of chlorophyll.", rubric());
        let mut padded = request("  Because of chlorophyll.\n", rubric());
        padded.question_text = format!("\t{} ", padded.question_text);
        padded.keywords = Some(" chlorophyll, autumn ".to_string());
        padded.ideal_answer = Some("Chlorophyll breaks down.  ".to_string());

        assert_eq!(cache_key(&plain), cache_key(&padded));
    }

    #[test]
    fn key_ignores_descriptor_ordering_and_whitespace() {
        let plain = request("essay", rubric());
        let shuffled = request(
            "essay",
            json!([
                {"aspect": " Accuracy", "descriptors": [
                    {"score": 2, "description": " right "},
                    {"score": 0, "description": "wrong"}
                ]},
                {"aspect": "Clarity ", "descriptors": {"1": "clear", "0": "vague"}}
            ]),
        );

        assert_eq!(cache_key(&plain), cache_key(&shuffled));
    }

    #[test]
    fn key_changes_with_content() {
        let base = cache_key(&request("Because of chlorophyll.", rubric()));
        assert_ne!(base, cache_key(&request("Because of the cold.", rubric())));

        let mut without_keywords = request("Because of chlorophyll.", rubric());
        without_keywords.keywords = None;
        assert_ne!(base, cache_key(&without_keywords));

        let swapped_aspects = request(
            "Because of chlorophyll.",
            json!([
                {"aspect": "Clarity", "descriptors": {"0": "vague", "1": "clear"}},
                {"aspect": "Accuracy", "descriptors": {"0": "wrong", "2": "right"}}
            ]),
        );
        assert_ne!(base, cache_key(&swapped_aspects));
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips_and_counts_hits() {
        let store = Arc::new(InMemoryStore::default());
        let cache = GradingCache::new(store.clone());
        let grade = CachedGrade {
            score: 66.66,
            feedback: "Solid answer.".to_string(),
            aspect_scores: vec![AspectScore::new("Accuracy", 2), AspectScore::new("Clarity", 0)],
        };

        cache.store("k1", &grade).await;
        assert_eq!(cache.lookup("k1").await, Some(grade));
        assert_eq!(store.cache_hits("k1"), Some(2));
        assert_eq!(cache.lookup("missing").await, None);
    }

    #[tokio::test]
    async fn store_failures_are_swallowed() {
        let store = Arc::new(InMemoryStore::default());
        store.fail_cache(true);
        let cache = GradingCache::new(store.clone());
        let grade = CachedGrade {
            score: 10.0,
            feedback: String::new(),
            aspect_scores: Vec::new(),
        };

        cache.store("k1", &grade).await;
        assert_eq!(cache.lookup("k1").await, None);
    }
}
