//! Fine-tune the certificate classifier on `<data-dir>/fake` and `<data-dir>/real`.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use certverify::backbone::Backbone;
use certverify::logging;
use certverify::training::{TrainConfig, train};

#[derive(Parser, Debug)]
#[command(name = "train", version, about = "Train the medical certificate classifier")]
struct TrainArgs {
    /// Directory containing `fake/` and `real/` image folders
    #[arg(long, default_value = "assets")]
    data_dir: PathBuf,

    /// Where to write the best checkpoint
    #[arg(long, env = "MODEL_PATH", default_value = certverify::DEFAULT_MODEL_PATH)]
    output: PathBuf,

    /// Pretrained backbone
    #[arg(long, value_enum, default_value_t = Backbone::Resnet50)]
    backbone: Backbone,

    /// Local backbone safetensors instead of downloading from the hub
    #[arg(long)]
    backbone_weights: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    epochs: usize,

    #[arg(long, default_value_t = 4)]
    batch_size: usize,

    #[arg(long, default_value_t = 1e-4)]
    learning_rate: f64,

    /// Fraction of each class held out for validation
    #[arg(long, default_value_t = 0.2)]
    validation_split: f32,

    /// Seed for shuffling and augmentation
    #[arg(long)]
    seed: Option<u64>,
}

impl From<TrainArgs> for TrainConfig {
    fn from(args: TrainArgs) -> Self {
        TrainConfig {
            data_dir: args.data_dir,
            output: args.output,
            backbone: args.backbone,
            backbone_weights: args.backbone_weights,
            epochs: args.epochs,
            batch_size: args.batch_size,
            learning_rate: args.learning_rate,
            validation_split: args.validation_split,
            seed: args.seed,
            ..TrainConfig::default()
        }
    }
}

fn main() -> Result<()> {
    logging::init();

    let config: TrainConfig = TrainArgs::parse().into();
    log::info!(
        "Fine-tuning {} on {} -> {}",
        config.backbone,
        config.data_dir.display(),
        config.output.display()
    );

    let report = train(&config)?;
    match report.best_val_accuracy {
        Some(accuracy) => println!(
            "Training finished after {} epochs. Best val_accuracy {:.4}, model saved to {}",
            report.epochs_run,
            accuracy,
            config.output.display()
        ),
        None => println!("Training finished after {} epochs without a checkpoint", report.epochs_run),
    }
    Ok(())
}
