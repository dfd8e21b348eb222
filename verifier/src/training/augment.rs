//! Random affine augmentation for training images.

use image::{Rgb, RgbImage};
use rand::Rng;

/// Augmentation ranges. Documents are never flipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Augmentation {
    /// Maximum rotation either way, degrees
    pub rotation_degrees: f32,
    /// Maximum horizontal shift as a fraction of width
    pub width_shift: f32,
    /// Maximum vertical shift as a fraction of height
    pub height_shift: f32,
    /// Maximum shear angle either way, degrees
    pub shear_degrees: f32,
    /// Zoom factor is drawn from `[1 - zoom, 1 + zoom]` per axis
    pub zoom: f32,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self {
            rotation_degrees: 15.0,
            width_shift: 0.1,
            height_shift: 0.1,
            shear_degrees: 0.1,
            zoom: 0.1,
        }
    }
}

impl Augmentation {
    pub fn none() -> Self {
        Self {
            rotation_degrees: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            shear_degrees: 0.0,
            zoom: 0.0,
        }
    }

    /// Draw one concrete transform for an image of the given size.
    pub fn sample<R: Rng + ?Sized>(&self, width: u32, height: u32, rng: &mut R) -> Transform {
        Transform {
            rotation: symmetric(rng, self.rotation_degrees).to_radians(),
            shift_x: symmetric(rng, self.width_shift) * width as f32,
            shift_y: symmetric(rng, self.height_shift) * height as f32,
            shear: symmetric(rng, self.shear_degrees).to_radians(),
            zoom_x: 1.0 + symmetric(rng, self.zoom),
            zoom_y: 1.0 + symmetric(rng, self.zoom),
        }
    }

    pub fn apply<R: Rng + ?Sized>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        let (width, height) = img.dimensions();
        self.sample(width, height, rng).apply(img)
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, range: f32) -> f32 {
    if range <= 0.0 {
        0.0
    } else {
        rng.random_range(-range..=range)
    }
}

/// Affine map from output pixel coordinates to source coordinates, about the image center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Radians
    pub rotation: f32,
    /// Pixels
    pub shift_x: f32,
    pub shift_y: f32,
    /// Radians
    pub shear: f32,
    pub zoom_x: f32,
    pub zoom_y: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        rotation: 0.0,
        shift_x: 0.0,
        shift_y: 0.0,
        shear: 0.0,
        zoom_x: 1.0,
        zoom_y: 1.0,
    };

    /// Source position for output pixel `(x, y)`: zoom, shear, shift, then rotate.
    fn source(&self, x: f32, y: f32, cx: f32, cy: f32) -> (f32, f32) {
        let (u, v) = ((x - cx) * self.zoom_x, (y - cy) * self.zoom_y);
        let (u, v) = (u - self.shear.sin() * v, self.shear.cos() * v);
        let (u, v) = (u + self.shift_x, v + self.shift_y);
        let (sin, cos) = self.rotation.sin_cos();
        (cos * u - sin * v + cx, sin * u + cos * v + cy)
    }

    /// Resample with bilinear interpolation; pixels mapped from outside the source are black.
    pub fn apply(&self, img: &RgbImage) -> RgbImage {
        let (width, height) = img.dimensions();
        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;

        RgbImage::from_fn(width, height, |x, y| {
            let (sx, sy) = self.source(x as f32, y as f32, cx, cy);
            bilinear(img, sx, sy)
        })
    }
}

fn bilinear(img: &RgbImage, sx: f32, sy: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;

    let mut acc = [0f32; 3];
    for (dx, dy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        if weight == 0.0 {
            continue;
        }
        let px = x0 as i64 + dx;
        let py = y0 as i64 + dy;
        if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
            continue;
        }
        let pixel = img.get_pixel(px as u32, py as u32);
        for c in 0..3 {
            acc[c] += weight * pixel[c] as f32;
        }
    }

    Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 7]))
    }

    #[test]
    fn identity_keeps_every_pixel() {
        let img = gradient(12, 9);
        assert_eq!(Transform::IDENTITY.apply(&img), img);

        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(Augmentation::none().apply(&img, &mut rng), img);
    }

    #[test]
    fn shifting_past_the_edge_fills_black() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let transform = Transform {
            shift_x: 20.0,
            ..Transform::IDENTITY
        };
        let out = transform.apply(&img);
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn whole_pixel_shift_moves_content() {
        let img = gradient(8, 8);
        let transform = Transform {
            shift_x: 1.0,
            ..Transform::IDENTITY
        };
        let out = transform.apply(&img);
        // Output pixel x samples source x + 1
        assert_eq!(out.get_pixel(2, 3), img.get_pixel(3, 3));
        assert_eq!(*out.get_pixel(7, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn sampled_transforms_stay_within_ranges() {
        let augmentation = Augmentation::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let t = augmentation.sample(224, 224, &mut rng);
            assert!(t.rotation.abs() <= 15f32.to_radians() + 1e-6);
            assert!(t.shift_x.abs() <= 22.4 + 1e-3);
            assert!(t.shift_y.abs() <= 22.4 + 1e-3);
            assert!((0.9..=1.1).contains(&t.zoom_x));
            assert!((0.9..=1.1).contains(&t.zoom_y));
        }
    }
}
