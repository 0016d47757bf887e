//! Rubric model: an ordered list of aspects, each a set of `score -> description` pairs.
//!
//! Accepted JSON shapes:
//!
//! ```json
//! [{"aspect": "Grammar", "descriptors": {"0": "poor", "3": "excellent"}}]
//! {"aspects": [{"name": "Grammar", "scores": [{"score": 3, "description": "excellent"}]}]}
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::error::GradingError;

/// Largest score a single rubric level may carry.
pub(crate) const MAX_LEVEL_SCORE: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RubricAspect {
    pub(crate) name: String,
    /// Sorted by score, ascending.
    pub(crate) descriptors: Vec<(i64, String)>,
}

impl RubricAspect {
    /// Highest score key, or 0 for an aspect without descriptors.
    pub(crate) fn ceiling(&self) -> i64 {
        self.descriptors.iter().map(|(score, _)| *score).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rubric {
    aspects: Vec<RubricAspect>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRubric {
    List(Vec<RawAspect>),
    Wrapped { aspects: Vec<RawAspect> },
}

#[derive(Debug, Deserialize)]
struct RawAspect {
    #[serde(alias = "aspect")]
    name: String,
    #[serde(default, alias = "scores", alias = "levels")]
    descriptors: Option<RawDescriptors>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDescriptors {
    Map(serde_json::Map<String, Value>),
    List(Vec<RawDescriptor>),
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    score: i64,
    #[serde(default)]
    description: String,
}

impl Rubric {
    pub(crate) fn from_json(value: &Value) -> Result<Self, GradingError> {
        let raw: RawRubric = serde_json::from_value(value.clone())
            .map_err(|err| GradingError::InvalidRubric(err.to_string()))?;
        let raw_aspects = match raw {
            RawRubric::List(aspects) | RawRubric::Wrapped { aspects } => aspects,
        };

        let mut aspects = Vec::with_capacity(raw_aspects.len());
        for raw_aspect in raw_aspects {
            let mut descriptors = match raw_aspect.descriptors {
                None => Vec::new(),
                Some(RawDescriptors::List(items)) => items
                    .into_iter()
                    .map(|item| (item.score, item.description.trim().to_string()))
                    .collect(),
                Some(RawDescriptors::Map(map)) => {
                    let mut items = Vec::with_capacity(map.len());
                    for (key, description) in map {
                        let score = key.trim().parse::<i64>().map_err(|_| {
                            GradingError::InvalidRubric(format!(
                                "score key '{key}' of aspect '{}' is not an integer",
                                raw_aspect.name.trim()
                            ))
                        })?;
                        let description = match description {
                            Value::String(text) => text.trim().to_string(),
                            Value::Null => String::new(),
                            other => other.to_string(),
                        };
                        items.push((score, description));
                    }
                    items
                }
            };
            descriptors.sort_by_key(|(score, _)| *score);

            aspects.push(RubricAspect { name: raw_aspect.name.trim().to_string(), descriptors });
        }

        let rubric = Self { aspects };
        rubric.validate()?;
        Ok(rubric)
    }

    pub(crate) fn aspects(&self) -> &[RubricAspect] {
        &self.aspects
    }

    /// Sum of the aspect ceilings. Saturates; `validate` rejects rubrics that would overflow.
    pub(crate) fn total_max(&self) -> i64 {
        self.aspects.iter().map(RubricAspect::ceiling).fold(0, i64::saturating_add)
    }

    pub(crate) fn validate(&self) -> Result<(), GradingError> {
        let mut seen = std::collections::HashSet::new();
        for aspect in &self.aspects {
            if aspect.name.is_empty() {
                return Err(GradingError::InvalidRubric("aspect name is empty".to_string()));
            }
            if !seen.insert(aspect.name.to_lowercase()) {
                return Err(GradingError::InvalidRubric(format!(
                    "aspect '{}' is listed twice",
                    aspect.name
                )));
            }

            let mut scores = std::collections::HashSet::new();
            for (score, _) in &aspect.descriptors {
                if *score < 0 {
                    return Err(GradingError::InvalidRubric(format!(
                        "aspect '{}' has a negative score {score}",
                        aspect.name
                    )));
                }
                if *score > MAX_LEVEL_SCORE {
                    return Err(GradingError::InvalidRubric(format!(
                        "aspect '{}' has score {score} above {MAX_LEVEL_SCORE}",
                        aspect.name
                    )));
                }
                if !scores.insert(*score) {
                    return Err(GradingError::InvalidRubric(format!(
                        "aspect '{}' repeats score {score}",
                        aspect.name
                    )));
                }
            }
        }

        self.aspects
            .iter()
            .try_fold(0_i64, |total, aspect| total.checked_add(aspect.ceiling()))
            .ok_or_else(|| GradingError::InvalidRubric("total score overflows".to_string()))?;

        Ok(())
    }
}
