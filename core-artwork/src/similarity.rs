//! Perceptual comparison of two decoded cover images
//!
//! Two measures are combined:
//!
//! - **Perceived distance**: normalized Hamming distance between 64-bit DCT
//!   perceptual hashes. Robust to rescaling and recompression.
//! - **Pixel difference**: fraction of pixels whose YIQ color delta exceeds a
//!   per-pixel threshold of 0.1, after resizing both images to the smaller
//!   common size.
//!
//! Both are fractions in `[0, 1]`. Images are the same cover only when both
//! fall strictly below their thresholds.

use crate::error::{ArtworkError, Result};
use core_runtime::config::SimilarityThresholds;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::f64::consts::PI;

/// Edge length of the grayscale image the hash is computed from
const HASH_INPUT_SIZE: usize = 32;

/// Edge length of the low-frequency DCT block kept in the hash
const HASH_BLOCK_SIZE: usize = 8;

/// Per-pixel color threshold used for the pixel difference
const PIXEL_THRESHOLD: f64 = 0.1;

/// Largest possible YIQ delta between two colors
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Decode raw bytes into an image, guessing the format from its contents
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| ArtworkError::Decode(e.to_string()))
}

/// Both similarity measures for one pair of images
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityReport {
    pub distance: f64,
    pub difference: f64,
}

impl SimilarityReport {
    pub fn is_match(&self, thresholds: &SimilarityThresholds) -> bool {
        self.distance < thresholds.max_distance && self.difference < thresholds.max_difference
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSimilarity {
    thresholds: SimilarityThresholds,
}

impl ImageSimilarity {
    pub fn new(thresholds: SimilarityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SimilarityThresholds {
        &self.thresholds
    }

    pub fn compare(&self, reference: &DynamicImage, candidate: &DynamicImage) -> SimilarityReport {
        SimilarityReport {
            distance: perceived_distance(reference, candidate),
            difference: pixel_difference(reference, candidate),
        }
    }

    /// Whether `candidate` shows the same cover as `reference`
    pub fn is_same_cover(&self, reference: &DynamicImage, candidate: &DynamicImage) -> bool {
        self.compare(reference, candidate).is_match(&self.thresholds)
    }
}

/// 64-bit DCT perceptual hash
///
/// The image is reduced to 32x32 grayscale, transformed with a 2-D DCT-II and
/// the top-left 8x8 block of coefficients is thresholded against its mean
/// (excluding the DC term).
pub fn perceptual_hash(image: &DynamicImage) -> u64 {
    let size = HASH_INPUT_SIZE as u32;
    let gray = image.resize_exact(size, size, FilterType::Triangle).to_luma8();
    let pixels: Vec<f64> = gray.pixels().map(|p| f64::from(p.0[0])).collect();

    let coefficients = low_frequency_dct(&pixels);
    let mean = coefficients[1..].iter().sum::<f64>() / (coefficients.len() - 1) as f64;

    coefficients
        .iter()
        .enumerate()
        .filter(|(_, value)| **value > mean)
        .fold(0u64, |hash, (bit, _)| hash | (1u64 << bit))
}

/// Normalized Hamming distance between the perceptual hashes of two images
pub fn perceived_distance(a: &DynamicImage, b: &DynamicImage) -> f64 {
    let differing = (perceptual_hash(a) ^ perceptual_hash(b)).count_ones();
    f64::from(differing) / 64.0
}

/// Separable DCT-II of an N x N block, keeping only the low 8x8 coefficients
fn low_frequency_dct(pixels: &[f64]) -> [f64; HASH_BLOCK_SIZE * HASH_BLOCK_SIZE] {
    let n = HASH_INPUT_SIZE;
    let k = HASH_BLOCK_SIZE;

    let mut cosines = vec![0.0; k * n];
    for u in 0..k {
        for x in 0..n {
            cosines[u * n + x] = ((2 * x + 1) as f64 * u as f64 * PI / (2 * n) as f64).cos();
        }
    }
    let alpha = |u: usize| {
        if u == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        }
    };

    // Rows first
    let mut rows = vec![0.0; n * k];
    for y in 0..n {
        for u in 0..k {
            let sum: f64 = (0..n).map(|x| pixels[y * n + x] * cosines[u * n + x]).sum();
            rows[y * k + u] = alpha(u) * sum;
        }
    }

    // Then columns
    let mut block = [0.0; HASH_BLOCK_SIZE * HASH_BLOCK_SIZE];
    for v in 0..k {
        for u in 0..k {
            let sum: f64 = (0..n).map(|y| rows[y * k + u] * cosines[v * n + y]).sum();
            block[v * k + u] = alpha(v) * sum;
        }
    }

    block
}

/// Fraction of pixels that differ noticeably between two images
///
/// The images are first resized to `min(width) x min(height)`.
pub fn pixel_difference(a: &DynamicImage, b: &DynamicImage) -> f64 {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    let total = u64::from(width) * u64::from(height);
    if total == 0 {
        return 1.0;
    }

    let resize = |image: &DynamicImage| {
        if image.dimensions() == (width, height) {
            image.to_rgba8()
        } else {
            image
                .resize_exact(width, height, FilterType::Triangle)
                .to_rgba8()
        }
    };
    let a = resize(a);
    let b = resize(b);

    let max_delta = MAX_YIQ_DELTA * PIXEL_THRESHOLD * PIXEL_THRESHOLD;
    let differing = a
        .pixels()
        .zip(b.pixels())
        .filter(|(pa, pb)| color_delta(pa.0, pb.0) > max_delta)
        .count() as u64;

    differing as f64 / total as f64
}

/// Squared YIQ distance between two RGBA pixels blended over white
fn color_delta(a: [u8; 4], b: [u8; 4]) -> f64 {
    if a == b {
        return 0.0;
    }

    let blend = |pixel: [u8; 4]| {
        let alpha = f64::from(pixel[3]) / 255.0;
        let channel = |c: u8| 255.0 + (f64::from(c) - 255.0) * alpha;
        (channel(pixel[0]), channel(pixel[1]), channel(pixel[2]))
    };

    let (r1, g1, b1) = blend(a);
    let (r2, g2, b2) = blend(b);

    let y = rgb_to_y(r1, g1, b1) - rgb_to_y(r2, g2, b2);
    let i = rgb_to_i(r1, g1, b1) - rgb_to_i(r2, g2, b2);
    let q = rgb_to_q(r1, g1, b1) - rgb_to_q(r2, g2, b2);

    0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q
}

fn rgb_to_y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb_to_i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb_to_q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}
