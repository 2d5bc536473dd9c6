//! Classifier contract for transportation-mode labelling.
//!
//! The statistical model lives outside this crate. Implementations map a
//! feature vector to a probability per label, can be refitted incrementally
//! and persist to an opaque blob.

use super::features::FeatureExtractor;
use crate::{Result, TripError};

/// Probability per label for one feature vector.
pub type LabelProbabilities = Vec<(String, f64)>;

/// A trainable label classifier.
pub trait Classifier {
    /// Extractor the model was trained with.
    fn feature_extractor(&self) -> FeatureExtractor;

    /// Fit (or refit) with labelled feature vectors.
    fn learn(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<()>;

    /// One probability distribution per feature vector, in input order.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<LabelProbabilities>>;

    /// Serialize the model.
    fn save(&self) -> Result<Vec<u8>>;

    /// Replace the model with a serialized one.
    fn load(&mut self, blob: &[u8]) -> Result<()>;
}

/// Label with the highest probability; the first one wins ties.
pub fn top_label(probabilities: &LabelProbabilities) -> Result<&str> {
    probabilities
        .iter()
        .filter(|(_, p)| p.is_finite())
        .fold(None, |best: Option<&(String, f64)>, entry| match best {
            Some(b) if b.1 >= entry.1 => best,
            _ => Some(entry),
        })
        .map(|(label, _)| label.as_str())
        .ok_or_else(|| TripError::Classifier("empty probability distribution".to_string()))
}

/// Predict the top label of every feature vector.
pub fn predict_labels(classifier: &dyn Classifier, features: &[Vec<f64>]) -> Result<Vec<String>> {
    if features.is_empty() {
        return Ok(Vec::new());
    }
    let expected = classifier.feature_extractor().feature_length();
    if let Some(bad) = features.iter().find(|f| f.len() != expected) {
        return Err(TripError::Classifier(format!(
            "feature vector of length {} does not match {} ({} values)",
            bad.len(),
            classifier.feature_extractor().id(),
            expected
        )));
    }

    let predictions = classifier.predict(features)?;
    if predictions.len() != features.len() {
        return Err(TripError::Classifier(format!(
            "expected {} predictions, got {}",
            features.len(),
            predictions.len()
        )));
    }
    predictions
        .iter()
        .map(|probs| top_label(probs).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_label_first_wins_ties() {
        let probs = vec![
            ("Bus".to_string(), 0.4),
            ("Walk".to_string(), 0.4),
            ("Stop".to_string(), 0.2),
        ];
        assert_eq!(top_label(&probs).unwrap(), "Bus");
    }

    #[test]
    fn test_top_label_empty_is_error() {
        let probs: LabelProbabilities = Vec::new();
        assert!(top_label(&probs).is_err());
    }
}
