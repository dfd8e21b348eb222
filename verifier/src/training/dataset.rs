use anyhow::{Context, Result, ensure};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::preprocess;

/// Class directories in label order: `fake` is 0, `real` is 1
pub const CLASS_NAMES: [&str; 2] = ["fake", "real"];

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub path: PathBuf,
    pub label: u8,
}

/// Labeled images found under `<base>/fake` and `<base>/real`, split into subsets
#[derive(Debug)]
pub struct ImageFolder {
    pub train: Vec<Sample>,
    pub validation: Vec<Sample>,
    /// Image count per class, indexed by label
    pub class_counts: [usize; 2],
}

impl ImageFolder {
    /// Scan both class directories. Within each class, files are sorted by name
    /// and the first `validation_split` fraction goes to validation.
    pub fn open(base_dir: &Path, validation_split: f32) -> Result<Self> {
        ensure!(
            (0.0..1.0).contains(&validation_split),
            "validation split must be in [0, 1), got {}",
            validation_split
        );

        let mut train = Vec::new();
        let mut validation = Vec::new();
        let mut class_counts = [0usize; 2];

        for (label, class) in CLASS_NAMES.iter().enumerate() {
            let dir = base_dir.join(class);
            let files = list_images(&dir)?;
            ensure!(!files.is_empty(), "No images found in {}", dir.display());

            class_counts[label] = files.len();
            let split = (files.len() as f32 * validation_split) as usize;

            for (i, path) in files.into_iter().enumerate() {
                let sample = Sample {
                    path,
                    label: label as u8,
                };
                if i < split {
                    validation.push(sample);
                } else {
                    train.push(sample);
                }
            }
        }

        Ok(Self {
            train,
            validation,
            class_counts,
        })
    }

    /// Per-class loss weights, `total / (2 * count)`, to counter class imbalance
    pub fn class_weights(&self) -> [f32; 2] {
        let total = self.class_counts.iter().sum::<usize>() as f32;
        self.class_counts.map(|count| total / (2.0 * count as f32))
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Image decoded and scaled to model input size
pub struct LoadedSample {
    pub image: RgbImage,
    pub label: u8,
}

/// Decode every sample up front; the datasets are small enough to keep in memory.
pub fn load_samples(samples: &[Sample]) -> Result<Vec<LoadedSample>> {
    samples
        .iter()
        .map(|sample| {
            Ok(LoadedSample {
                image: preprocess::load_image(&sample.path)?,
                label: sample.label,
            })
        })
        .collect()
}
