//! Turning output scores into display text.

/// Returns the index of the highest score.
///
/// Ties go to the lowest index. Returns `None` for an empty slice.
pub fn top_prediction(scores: &[u8]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (index, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Confidence in percent for a 0-255 score.
pub fn confidence_percent(score: u8) -> f64 {
    score as f64 / 255.0 * 100.0
}

/// Confidence rounded to one decimal, as displayed.
pub fn rounded_confidence(score: u8) -> f64 {
    (confidence_percent(score) * 10.0).round() / 10.0
}

/// Text for the prediction line.
pub fn prediction_text(label: &str) -> String {
    format!("  Prediction: {label}       ")
}

/// Text for the confidence line.
pub fn confidence_text(score: u8) -> String {
    format!("  Confidence: {:.1}%   ", rounded_confidence(score))
}
