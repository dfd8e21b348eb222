use serde::{Deserialize, Serialize};

/// Probability at or above which an image counts as a genuine certificate
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Outcome of classifying one certificate image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// true when the certificate appears genuine
    pub prediction: bool,
    /// Probability of the chosen label
    pub confidence: f32,
    /// Raw sigmoid output of the model
    pub probability: f32,
}

impl Verdict {
    pub fn from_probability(probability: f32) -> Self {
        Self::with_threshold(probability, DECISION_THRESHOLD)
    }

    pub fn with_threshold(probability: f32, threshold: f32) -> Self {
        let prediction = probability >= threshold;
        let confidence = if prediction {
            probability
        } else {
            1.0 - probability
        };

        Self {
            prediction,
            confidence,
            probability,
        }
    }

    /// Label printed by the command line verifier
    pub fn label(&self) -> &'static str {
        if self.prediction {
            "verified"
        } else {
            "not-verified"
        }
    }
}
