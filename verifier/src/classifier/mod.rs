use anyhow::Result;
use std::path::Path;

use crate::verdict::Verdict;

/// Pluggable certificate classifier used by the service and the CLI
pub trait CertificateClassifier: Send + Sync {
    /// Probability that the image at `path` shows a genuine certificate
    fn probability(&self, path: &Path) -> Result<f32>;

    /// Classify the image at `path`, thresholding the probability into a verdict
    fn verify(&self, path: &Path) -> Result<Verdict> {
        self.probability(path).map(Verdict::from_probability)
    }
}

mod fixed;
mod network;

pub use fixed::FixedClassifier;
pub use network::CandleClassifier;
