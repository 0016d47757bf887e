use crate::db::types::AspectScore;

use super::error::GradingError;
use super::rubric::Rubric;

/// Combines provider aspect scores into a percentage of the rubric's maximum.
///
/// Each rubric aspect is paired with a returned score by case-insensitive, trimmed name.
/// When a name has no match and the provider returned exactly one item per rubric aspect,
/// the item at the same position is used instead. That fallback tolerates providers that
/// relabel aspects, but it silently mismatches if an aspect is both renamed and reordered.
pub(crate) fn aggregate(rubric: &Rubric, returned: &[AspectScore]) -> Result<f64, GradingError> {
    let total_max = rubric.total_max();
    if total_max <= 0 {
        return Err(GradingError::ZeroMaxScore);
    }

    let positional = returned.len() == rubric.aspects().len();
    let obtained: i64 = rubric
        .aspects()
        .iter()
        .enumerate()
        .map(|(index, aspect)| {
            let wanted = aspect.name.trim().to_lowercase();
            let matched = returned
                .iter()
                .find(|item| item.aspect.trim().to_lowercase() == wanted)
                .or_else(|| if positional { returned.get(index) } else { None });

            matched.map(|item| item.score.clamp(0, aspect.ceiling())).unwrap_or(0)
        })
        .fold(0, i64::saturating_add);

    Ok(obtained as f64 / total_max as f64 * 100.0)
}

/// Post-processing for questions that grade in steps of five.
pub(crate) fn round_to_nearest_five(score: f64) -> f64 {
    ((score / 5.0).round() * 5.0).clamp(0.0, 100.0)
}
