use anyhow::Result;
use std::path::Path;

use super::CertificateClassifier;

/// Classifier that reports the same probability for every image - for testing or running without a trained model
pub struct FixedClassifier {
    probability: f32,
}

impl FixedClassifier {
    pub fn new(probability: f32) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl Default for FixedClassifier {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl CertificateClassifier for FixedClassifier {
    fn probability(&self, _path: &Path) -> Result<f32> {
        Ok(self.probability)
    }
}
