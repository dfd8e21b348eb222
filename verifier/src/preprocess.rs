//! Image decoding and tensor conversion for the classifier input.

use anyhow::{Context, Result, ensure};
use candle_core::{Device, Tensor};
use image::{DynamicImage, ImageReader, RgbImage, imageops::FilterType};
use std::path::Path;

/// Model input edge length (224x224 RGB)
pub const IMAGE_SIZE: usize = 224;

/// Decode the image at `path` and scale it to model input size.
/// The format is sniffed from the content, not the extension.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .decode()
        .with_context(|| format!("Failed to decode image {}", path.display()))?;
    Ok(scale(&img))
}

/// Resize to 224x224 RGB. Aspect ratio is not preserved and alpha is dropped.
pub fn scale(img: &DynamicImage) -> RgbImage {
    img.resize_exact(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle)
        .to_rgb8()
}

/// Stack scaled images into a `(batch, 3, 224, 224)` tensor with values in [0, 1].
pub fn to_tensor(images: &[&RgbImage], device: &Device) -> Result<Tensor> {
    ensure!(!images.is_empty(), "Cannot build a tensor from an empty batch");

    let plane = IMAGE_SIZE * IMAGE_SIZE;
    let mut data = vec![0f32; images.len() * 3 * plane];

    for (batch_idx, img) in images.iter().enumerate() {
        let (width, height) = img.dimensions();
        ensure!(
            width as usize == IMAGE_SIZE && height as usize == IMAGE_SIZE,
            "Image {} is {}x{}, expected {}x{}",
            batch_idx,
            width,
            height,
            IMAGE_SIZE,
            IMAGE_SIZE
        );

        // CHW
        let offset = batch_idx * 3 * plane;
        for (i, pixel) in img.pixels().enumerate() {
            data[offset + i] = pixel[0] as f32 / 255.0;
            data[offset + plane + i] = pixel[1] as f32 / 255.0;
            data[offset + 2 * plane + i] = pixel[2] as f32 / 255.0;
        }
    }

    let tensor = Tensor::from_vec(data, (images.len(), 3, IMAGE_SIZE, IMAGE_SIZE), device)?;
    Ok(tensor)
}
