use crate::error::PredictionError;

/// Top-1 class of a probability distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopClass {
    pub class_id: usize,
    pub probability: f32,
}

/// Softmax with the maximum logit subtracted first, so large scores cannot overflow.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, PredictionError> {
    if logits.iter().any(|value| !value.is_finite()) {
        return Err(PredictionError::NonFiniteScores);
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|value| (value - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    Ok(exps.into_iter().map(|value| value / sum).collect())
}

/// Arg-max over the probabilities. Ties go to the lowest index.
pub fn top_class(probabilities: &[f32]) -> Option<TopClass> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        .map(|(class_id, probability)| TopClass {
            class_id,
            probability,
        })
}

/// Renders a probability as a percentage with two decimals, e.g. `0.9234` -> `"92.34%"`.
pub fn format_confidence(probability: f32) -> String {
    let percent = (f64::from(probability) * 100.0).clamp(0.0, 100.0);
    format!("{:.2}%", percent)
}
