//! Offline transfer-learning job: pretrained ResNet with its last stage fine-tuned under a dense head.

pub mod augment;
pub mod callbacks;
pub mod dataset;
pub mod metrics;
pub mod trainer;

pub use trainer::{TrainConfig, TrainReport, train, train_with_backbone};
