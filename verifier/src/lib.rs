//! Medical certificate classifier.
//!
//! Shared by the HTTP service (inference through [`CertificateClassifier`])
//! and the offline tools (`verify`, `train`).

pub mod artifact;
pub mod backbone;
pub mod classifier;
pub mod logging;
pub mod model;
pub mod preprocess;
pub mod training;
pub mod verdict;

pub use classifier::{CandleClassifier, CertificateClassifier, FixedClassifier};
pub use verdict::Verdict;

/// Artifact written by `train` and read by the service and `verify`
pub const DEFAULT_MODEL_PATH: &str = "medical_certificate_verifier.safetensors";
