use anyhow::{Context, Result};
use candle_nn::{Func, VarBuilder};
use candle_transformers::models::resnet;
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pretrained convolutional feature extractor (ImageNet weights, global average pooled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backbone {
    Resnet18,
    Resnet34,
    #[default]
    Resnet50,
    /// Weightless per-channel mean pooling, for fast tests of the training loop
    #[cfg(test)]
    ChannelMean,
}

impl Backbone {
    /// Hugging Face repository holding the pretrained weights
    pub fn hub_repo(self) -> &'static str {
        match self {
            Backbone::Resnet18 => "timm/resnet18.tv_in1k",
            Backbone::Resnet34 => "timm/resnet34.tv_in1k",
            Backbone::Resnet50 => "timm/resnet50.tv_in1k",
            #[cfg(test)]
            Backbone::ChannelMean => "",
        }
    }

    /// Width of the pooled feature vector
    pub fn feature_dim(self) -> usize {
        match self {
            Backbone::Resnet18 | Backbone::Resnet34 => 512,
            Backbone::Resnet50 => 2048,
            #[cfg(test)]
            Backbone::ChannelMean => 3,
        }
    }

    /// Build the network without its ImageNet classification layer.
    pub fn build(self, vb: VarBuilder<'static>) -> candle_core::Result<Func<'static>> {
        match self {
            Backbone::Resnet18 => resnet::resnet18_no_final_layer(vb),
            Backbone::Resnet34 => resnet::resnet34_no_final_layer(vb),
            Backbone::Resnet50 => resnet::resnet50_no_final_layer(vb),
            #[cfg(test)]
            Backbone::ChannelMean => Ok(candle_nn::func(|xs: &candle_core::Tensor| {
                xs.mean(candle_core::D::Minus1)?.mean(candle_core::D::Minus1)
            })),
        }
    }

    /// Download (or reuse the cached copy of) the pretrained weights.
    pub fn fetch_weights(self) -> Result<PathBuf> {
        log::info!("Fetching {} weights from {}", self, self.hub_repo());

        let api = Api::new()?;
        let repo = api.repo(Repo::new(self.hub_repo().to_string(), RepoType::Model));
        repo.get("model.safetensors")
            .with_context(|| format!("Failed to download weights for {}", self))
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backbone::Resnet18 => "resnet18",
            Backbone::Resnet34 => "resnet34",
            Backbone::Resnet50 => "resnet50",
            #[cfg(test)]
            Backbone::ChannelMean => "channel-mean",
        };
        f.write_str(name)
    }
}
