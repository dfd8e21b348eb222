use anyhow::{Result, anyhow};
use std::path::Path;

use super::CertificateClassifier;
use crate::model::{VerifierModel, default_device};
use crate::preprocess;
use crate::verdict::Verdict;

/// Classifier backed by the trained ResNet + dense head network
pub struct CandleClassifier {
    model: VerifierModel,
}

impl CandleClassifier {
    /// Load the artifact at `model_path` onto the default device.
    pub fn load(model_path: &Path) -> Result<Self> {
        let device = default_device();
        log::info!(
            "Loading certificate model {} on {:?}",
            model_path.display(),
            device
        );

        let model = VerifierModel::load(model_path, &device)?;

        log::info!(
            "Certificate model loaded ({} backbone, val_accuracy={:?})",
            model.metadata().backbone,
            model.metadata().val_accuracy
        );
        Ok(Self { model })
    }

    pub fn from_model(model: VerifierModel) -> Self {
        Self { model }
    }
}

impl CertificateClassifier for CandleClassifier {
    fn probability(&self, path: &Path) -> Result<f32> {
        let image = preprocess::load_image(path)?;
        let input = preprocess::to_tensor(&[&image], self.model.device())?;
        let probs = self.model.probabilities(&input)?;
        probs
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Model returned no output"))
    }

    fn verify(&self, path: &Path) -> Result<Verdict> {
        let probability = self.probability(path)?;
        Ok(Verdict::with_threshold(
            probability,
            self.model.metadata().threshold,
        ))
    }
}
