//! On-disk model artifact: a safetensors weight file plus a JSON metadata sidecar.
//!
//! Backbone tensors live under `backbone.`, head tensors (including batch norm
//! running statistics) under `head.`. The sidecar sits next to the weights
//! with a `.json` extension.

use anyhow::{Context, Result, anyhow};
use candle_core::Tensor;
use candle_nn::VarMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::backbone::Backbone;
use crate::model::HeadConfig;
use crate::preprocess::IMAGE_SIZE;
use crate::verdict::DECISION_THRESHOLD;

pub const BACKBONE_PREFIX: &str = "backbone";
pub const HEAD_PREFIX: &str = "head";

/// Architecture description stored alongside the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub backbone: Backbone,
    /// Width of the pooled backbone features fed to the head
    pub feature_dim: usize,
    pub image_size: usize,
    pub head: HeadConfig,
    pub threshold: f32,
    pub created_at: DateTime<Utc>,
    /// Validation accuracy of the epoch that produced this checkpoint
    #[serde(default)]
    pub val_accuracy: Option<f32>,
}

impl ModelMetadata {
    pub fn new(backbone: Backbone, feature_dim: usize, head: HeadConfig) -> Self {
        Self {
            backbone,
            feature_dim,
            image_size: IMAGE_SIZE,
            head,
            threshold: DECISION_THRESHOLD,
            created_at: Utc::now(),
            val_accuracy: None,
        }
    }
}

/// Path of the metadata sidecar for a weights file
pub fn metadata_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("json")
}

pub fn read_metadata(model_path: &Path) -> Result<ModelMetadata> {
    let path = metadata_path(model_path);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read model metadata {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid model metadata {}", path.display()))
}

/// Write backbone and head weights into one safetensors file, then the sidecar.
pub fn save(
    model_path: &Path,
    backbone: &VarMap,
    head: &VarMap,
    metadata: &ModelMetadata,
) -> Result<()> {
    let mut tensors = HashMap::new();
    collect_prefixed(BACKBONE_PREFIX, backbone, &mut tensors)?;
    collect_prefixed(HEAD_PREFIX, head, &mut tensors)?;

    if let Some(parent) = model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    candle_core::safetensors::save(&tensors, model_path)
        .with_context(|| format!("Failed to write weights {}", model_path.display()))?;
    std::fs::write(metadata_path(model_path), serde_json::to_string_pretty(metadata)?)
        .context("Failed to write model metadata")?;

    Ok(())
}

fn collect_prefixed(
    prefix: &str,
    varmap: &VarMap,
    tensors: &mut HashMap<String, Tensor>,
) -> Result<()> {
    let vars = varmap.data().lock().map_err(|e| anyhow!("Lock error: {}", e))?;
    for (name, var) in vars.iter() {
        tensors.insert(format!("{prefix}.{name}"), var.as_tensor().clone());
    }
    Ok(())
}
