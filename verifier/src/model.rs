//! Classification head and the full backbone + head network.

use anyhow::{Context, Result, ensure};
use candle_core::{DType, Device, Module, ModuleT, Tensor};
use candle_nn::{BatchNorm, BatchNormConfig, Dropout, Func, Linear, VarBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::artifact::{self, BACKBONE_PREFIX, HEAD_PREFIX, ModelMetadata};
use crate::preprocess::IMAGE_SIZE;

/// Batch norm matching Keras defaults (eps 1e-3, running-stat momentum 0.99)
const BATCH_NORM: BatchNormConfig = BatchNormConfig {
    eps: 1e-3,
    remove_mean: true,
    affine: true,
    momentum: 0.01,
};

/// Dense stack placed on top of the pooled backbone features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadConfig {
    /// Width of each hidden dense layer
    pub units: Vec<usize>,
    /// Dropout rate after each hidden layer
    pub dropout: Vec<f32>,
    /// L2 factor applied to hidden dense kernels
    pub l2: f64,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            units: vec![512, 256, 128],
            dropout: vec![0.4, 0.4, 0.3],
            l2: 0.01,
        }
    }
}

struct DenseBlock {
    linear: Linear,
    norm: BatchNorm,
    dropout: Dropout,
}

/// BatchNorm, then relu dense blocks with batch norm and dropout, then a single logit.
pub struct ClassifierHead {
    input_norm: BatchNorm,
    blocks: Vec<DenseBlock>,
    output: Linear,
    l2: f64,
}

impl ClassifierHead {
    pub fn new(in_features: usize, config: &HeadConfig, vb: VarBuilder) -> Result<Self> {
        ensure!(
            config.units.len() == config.dropout.len(),
            "Head config has {} dense layers but {} dropout rates",
            config.units.len(),
            config.dropout.len()
        );

        let input_norm = candle_nn::batch_norm(in_features, BATCH_NORM, vb.pp("input_norm"))?;

        let mut blocks = Vec::with_capacity(config.units.len());
        let mut width = in_features;
        for (i, (&units, &rate)) in config.units.iter().zip(&config.dropout).enumerate() {
            let linear = candle_nn::linear(width, units, vb.pp(format!("dense_{i}")))?;
            let norm = candle_nn::batch_norm(units, BATCH_NORM, vb.pp(format!("norm_{i}")))?;
            blocks.push(DenseBlock {
                linear,
                norm,
                dropout: Dropout::new(rate),
            });
            width = units;
        }

        let output = candle_nn::linear(width, 1, vb.pp("output"))?;

        Ok(Self {
            input_norm,
            blocks,
            output,
            l2: config.l2,
        })
    }

    /// `l2 * sum(w^2)` over the hidden dense kernels, as a scalar tensor
    pub fn l2_penalty(&self) -> candle_core::Result<Tensor> {
        let mut total: Option<Tensor> = None;
        for block in &self.blocks {
            let term = block.linear.weight().sqr()?.sum_all()?;
            total = Some(match total {
                Some(acc) => acc.add(&term)?,
                None => term,
            });
        }

        match total {
            Some(total) => total.affine(self.l2, 0.0),
            None => Tensor::zeros((), DType::F32, self.output.weight().device()),
        }
    }
}

impl ModuleT for ClassifierHead {
    /// Maps `(batch, features)` to `(batch,)` logits.
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let mut xs = xs.apply_t(&self.input_norm, train)?;
        for block in &self.blocks {
            xs = xs.apply(&block.linear)?.relu()?;
            xs = xs.apply_t(&block.norm, train)?;
            xs = block.dropout.forward(&xs, train)?;
        }
        xs.apply(&self.output)?.squeeze(1)
    }
}

/// Pick the inference device. Metal when built with the `metal` feature and available.
pub fn default_device() -> Device {
    #[cfg(feature = "metal")]
    {
        Device::new_metal(0).unwrap_or(Device::Cpu)
    }
    #[cfg(not(feature = "metal"))]
    {
        Device::Cpu
    }
}

/// Pretrained backbone followed by the classification head
pub struct VerifierModel {
    backbone: Func<'static>,
    head: ClassifierHead,
    metadata: ModelMetadata,
    device: Device,
}

impl VerifierModel {
    pub fn new(
        backbone: Func<'static>,
        head: ClassifierHead,
        metadata: ModelMetadata,
        device: Device,
    ) -> Self {
        Self {
            backbone,
            head,
            metadata,
            device,
        }
    }

    /// Load a model artifact (weights plus its metadata sidecar).
    pub fn load(path: &Path, device: &Device) -> Result<Self> {
        let metadata = artifact::read_metadata(path)?;
        ensure!(
            metadata.image_size == IMAGE_SIZE,
            "Model expects {}px input, this build produces {}px",
            metadata.image_size,
            IMAGE_SIZE
        );

        // Weights are read-only for the life of the model.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device) }
            .with_context(|| format!("Failed to read model weights {}", path.display()))?;

        let backbone = metadata.backbone.build(vb.pp(BACKBONE_PREFIX))?;
        let head = ClassifierHead::new(metadata.feature_dim, &metadata.head, vb.pp(HEAD_PREFIX))?;

        Ok(Self::new(backbone, head, metadata, device.clone()))
    }

    /// Logits for a `(batch, 3, 224, 224)` input.
    pub fn forward_t(&self, images: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let features = self.backbone.forward(images)?;
        self.head.forward_t(&features, train)
    }

    /// Sigmoid probabilities in eval mode, one per image.
    pub fn probabilities(&self, images: &Tensor) -> Result<Vec<f32>> {
        let logits = self.forward_t(images, false)?;
        let probs = candle_nn::ops::sigmoid(&logits)?;
        Ok(probs.to_vec1::<f32>()?)
    }

    pub fn head(&self) -> &ClassifierHead {
        &self.head
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
