use anyhow::{Context, Result, anyhow, ensure};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use image::RgbImage;
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

use super::augment::Augmentation;
use super::callbacks::{BestCheckpoint, EarlyStopping, ReduceLrOnPlateau};
use super::dataset::{ImageFolder, LoadedSample, load_samples};
use super::metrics;
use crate::artifact::{self, ModelMetadata};
use crate::backbone::Backbone;
use crate::model::{ClassifierHead, HeadConfig, VerifierModel, default_device};
use crate::preprocess;

/// Everything the training job needs to know
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Directory holding `fake/` and `real/`
    pub data_dir: PathBuf,
    /// Where the best checkpoint is written
    pub output: PathBuf,
    pub backbone: Backbone,
    /// Local pretrained weights; fetched from the hub when unset
    pub backbone_weights: Option<PathBuf>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_split: f32,
    pub early_stopping_patience: usize,
    pub lr_factor: f64,
    pub lr_patience: usize,
    pub min_learning_rate: f64,
    pub head: HeadConfig,
    pub augmentation: Augmentation,
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("assets"),
            output: PathBuf::from(crate::DEFAULT_MODEL_PATH),
            backbone: Backbone::default(),
            backbone_weights: None,
            epochs: 100,
            batch_size: 4,
            learning_rate: 1e-4,
            validation_split: 0.2,
            early_stopping_patience: 15,
            lr_factor: 0.2,
            lr_patience: 5,
            min_learning_rate: 1e-6,
            head: HeadConfig::default(),
            augmentation: Augmentation::default(),
            seed: None,
        }
    }
}

impl TrainConfig {
    fn validate(&self) -> Result<()> {
        ensure!(self.batch_size >= 2, "batch size must be at least 2");
        Ok(())
    }
}

/// Summary of a finished training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub epochs_run: usize,
    pub best_val_accuracy: Option<f32>,
    pub stopped_early: bool,
}

/// Validation pass results
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub loss: f32,
    pub accuracy: f32,
    pub auc: Option<f32>,
}

/// Backbone stages fine-tuned with the head. Everything before them stays frozen.
pub const TRAINABLE_BACKBONE_PREFIXES: [&str; 1] = ["layer4."];

/// Whether the optimizer updates the backbone variable `name`.
/// Batch norm running statistics are never optimized.
pub fn is_trainable_backbone_var(name: &str) -> bool {
    TRAINABLE_BACKBONE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
        && !is_running_stat(name)
}

fn is_running_stat(name: &str) -> bool {
    name.ends_with("running_mean") || name.ends_with("running_var")
}

/// Pretrained backbone weights as variables, without the ImageNet classifier.
pub fn load_backbone_vars(path: &Path, device: &Device) -> Result<VarMap> {
    let tensors = candle_core::safetensors::load(path, device)
        .with_context(|| format!("Failed to load backbone weights {}", path.display()))?;

    let varmap = VarMap::new();
    {
        let mut vars = varmap.data().lock().map_err(|e| anyhow!("Lock error: {}", e))?;
        for (name, tensor) in tensors {
            // replaced by the head
            if name.starts_with("fc.") {
                continue;
            }
            vars.insert(name, Var::from_tensor(&tensor.to_dtype(DType::F32)?)?);
        }
    }
    Ok(varmap)
}

/// Head variables plus the unfrozen backbone stages
pub fn trainable_vars(backbone_vars: &VarMap, head_vars: &VarMap) -> Result<Vec<Var>> {
    let backbone = backbone_vars
        .data()
        .lock()
        .map_err(|e| anyhow!("Lock error: {}", e))?;
    let head = head_vars
        .data()
        .lock()
        .map_err(|e| anyhow!("Lock error: {}", e))?;

    let vars = backbone
        .iter()
        .filter(|(name, _)| is_trainable_backbone_var(name))
        .chain(head.iter().filter(|(name, _)| !is_running_stat(name)))
        .map(|(_, var)| var.clone())
        .collect();
    Ok(vars)
}

fn build_optimizer(backbone_vars: &VarMap, head_vars: &VarMap, learning_rate: f64) -> Result<AdamW> {
    let optimizer = AdamW::new(
        trainable_vars(backbone_vars, head_vars)?,
        ParamsAdamW {
            lr: learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        },
    )?;
    Ok(optimizer)
}

/// One optimizer step on a batch; returns the batch loss.
fn train_step(
    model: &VerifierModel,
    optimizer: &mut AdamW,
    images: &Tensor,
    targets: &Tensor,
    weights: &Tensor,
) -> Result<f32> {
    let logits = model.forward_t(images, true)?;
    let loss = metrics::bce_with_logits(&logits, targets, weights)?
        .add(&model.head().l2_penalty()?)?;
    optimizer.backward_step(&loss)?;
    Ok(loss.to_scalar::<f32>()?)
}

/// Fine-tune the head and the last backbone stage on the image folder,
/// starting from pretrained weights, and checkpoint the best epoch.
pub fn train(config: &TrainConfig) -> Result<TrainReport> {
    config.validate()?;

    let device = default_device();
    let weights_path = match &config.backbone_weights {
        Some(path) => path.clone(),
        None => config.backbone.fetch_weights()?,
    };
    let backbone_vars = load_backbone_vars(&weights_path, &device)?;

    train_with_backbone(config, &backbone_vars, &device)
}

/// Training loop over already loaded backbone variables. Fine-tuned backbone
/// weights are written back into `backbone_vars` and saved with each checkpoint.
pub fn train_with_backbone(
    config: &TrainConfig,
    backbone_vars: &VarMap,
    device: &Device,
) -> Result<TrainReport> {
    config.validate()?;
    info!("Training on {:?}", device);

    let folder = ImageFolder::open(&config.data_dir, config.validation_split)?;
    ensure!(
        !folder.validation.is_empty(),
        "Validation subset is empty; add more images or raise the split"
    );
    let class_weights = folder.class_weights();
    info!(
        "Found {} fake / {} real images ({} train, {} validation); class weights fake={:.3} real={:.3}",
        folder.class_counts[0],
        folder.class_counts[1],
        folder.train.len(),
        folder.validation.len(),
        class_weights[0],
        class_weights[1]
    );

    let train_set = load_samples(&folder.train)?;
    let val_set = load_samples(&folder.validation)?;

    let backbone = config
        .backbone
        .build(VarBuilder::from_varmap(backbone_vars, DType::F32, device))?;

    let head_vars = VarMap::new();
    let head = ClassifierHead::new(
        config.backbone.feature_dim(),
        &config.head,
        VarBuilder::from_varmap(&head_vars, DType::F32, device),
    )?;
    let metadata = ModelMetadata::new(
        config.backbone,
        config.backbone.feature_dim(),
        config.head.clone(),
    );
    let model = VerifierModel::new(backbone, head, metadata, device.clone());

    let mut optimizer = build_optimizer(backbone_vars, &head_vars, config.learning_rate)?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut early_stopping = EarlyStopping::new(config.early_stopping_patience);
    let mut reduce_lr = ReduceLrOnPlateau::new(
        config.lr_factor,
        config.lr_patience,
        config.min_learning_rate,
    );
    let mut checkpoint = BestCheckpoint::default();

    let mut order: Vec<usize> = (0..train_set.len()).collect();
    let mut epochs_run = 0;
    let mut stopped_early = false;

    for epoch in 1..=config.epochs {
        epochs_run = epoch;
        order.shuffle(&mut rng);

        let mut loss_sum = 0f32;
        let mut batches = 0usize;
        for chunk in order.chunks(config.batch_size) {
            // Batch norm needs at least two samples in training mode
            if chunk.len() < 2 {
                debug!("Skipping trailing batch of {}", chunk.len());
                continue;
            }

            let augmented: Vec<RgbImage> = chunk
                .iter()
                .map(|&i| config.augmentation.apply(&train_set[i].image, &mut rng))
                .collect();
            let refs: Vec<&RgbImage> = augmented.iter().collect();
            let images = preprocess::to_tensor(&refs, device)?;

            let labels: Vec<f32> = chunk.iter().map(|&i| train_set[i].label as f32).collect();
            let sample_weights: Vec<f32> = chunk
                .iter()
                .map(|&i| class_weights[train_set[i].label as usize])
                .collect();
            let targets = Tensor::from_vec(labels, chunk.len(), device)?;
            let weights = Tensor::from_vec(sample_weights, chunk.len(), device)?;

            loss_sum += train_step(&model, &mut optimizer, &images, &targets, &weights)?;
            batches += 1;
        }

        let eval = evaluate(&model, &val_set, config.batch_size, device)?;
        info!(
            "Epoch {}/{} - loss: {:.4} - val_loss: {:.4} - val_accuracy: {:.4} - val_auc: {} - lr: {:.2e}",
            epoch,
            config.epochs,
            loss_sum / batches.max(1) as f32,
            eval.loss,
            eval.accuracy,
            eval.auc
                .map(|auc| format!("{auc:.4}"))
                .unwrap_or_else(|| "n/a".to_string()),
            optimizer.learning_rate()
        );

        if checkpoint.improved(eval.accuracy) {
            let mut metadata = model.metadata().clone();
            metadata.created_at = chrono::Utc::now();
            metadata.val_accuracy = Some(eval.accuracy);
            artifact::save(&config.output, backbone_vars, &head_vars, &metadata)?;
            info!(
                "val_accuracy improved to {:.4}, saved {}",
                eval.accuracy,
                config.output.display()
            );
        }

        if let Some(lr) = reduce_lr.update(eval.loss, optimizer.learning_rate()) {
            info!("Reducing learning rate to {:.2e}", lr);
            optimizer.set_learning_rate(lr);
        }

        if early_stopping.update(eval.loss) {
            info!(
                "Early stopping: val_loss has not improved for {} epochs",
                config.early_stopping_patience
            );
            stopped_early = true;
            break;
        }
    }

    Ok(TrainReport {
        epochs_run,
        best_val_accuracy: checkpoint.best(),
        stopped_early,
    })
}

/// Score `samples` in eval mode. Loss is unweighted BCE plus the L2 penalty.
pub fn evaluate(
    model: &VerifierModel,
    samples: &[LoadedSample],
    batch_size: usize,
    device: &Device,
) -> Result<Evaluation> {
    ensure!(!samples.is_empty(), "Cannot evaluate an empty subset");

    let mut probabilities = Vec::with_capacity(samples.len());
    let mut labels = Vec::with_capacity(samples.len());
    let mut loss_sum = 0f32;

    for chunk in samples.chunks(batch_size.max(1)) {
        let refs: Vec<&RgbImage> = chunk.iter().map(|s| &s.image).collect();
        let images = preprocess::to_tensor(&refs, device)?;
        let chunk_labels: Vec<u8> = chunk.iter().map(|s| s.label).collect();
        let targets = Tensor::from_vec(
            chunk_labels.iter().map(|&l| l as f32).collect::<Vec<_>>(),
            chunk.len(),
            device,
        )?;
        let ones = Tensor::ones(chunk.len(), DType::F32, device)?;

        let logits = model.forward_t(&images, false)?;
        let batch_loss = metrics::bce_with_logits(&logits, &targets, &ones)?.to_scalar::<f32>()?;
        loss_sum += batch_loss * chunk.len() as f32;

        probabilities.extend(candle_nn::ops::sigmoid(&logits)?.to_vec1::<f32>()?);
        labels.extend(chunk_labels);
    }

    let l2 = model.head().l2_penalty()?.to_scalar::<f32>()?;
    Ok(Evaluation {
        loss: loss_sum / samples.len() as f32 + l2,
        accuracy: metrics::accuracy(&probabilities, &labels),
        auc: metrics::roc_auc(&probabilities, &labels),
    })
}
