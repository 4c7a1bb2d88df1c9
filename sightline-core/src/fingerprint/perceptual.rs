//! DCT-based perceptual fingerprints.
//!
//! # Algorithm
//!
//! 1. Downsample to 32×32 and convert to luminance.
//! 2. Take the 2-D DCT and keep the top-left 8×8 low-frequency block.
//! 3. Average the block, leaving out the DC term.
//! 4. Emit one bit per coefficient: set iff the coefficient exceeds the average.
//!
//! Computation never fails. Images that cannot be fingerprinted receive a
//! time-derived value, which behaves like an unrelated image and therefore
//! always misses the cache.
//!
//! # Usage
//!
//! ```no_run
//! use sightline_core::fingerprint::{compute_fingerprint, DEFAULT_SIMILARITY_THRESHOLD};
//!
//! let first = image::open("mug.jpg").unwrap();
//! let second = image::open("mug-again.jpg").unwrap();
//!
//! let a = compute_fingerprint(&first);
//! let b = compute_fingerprint(&second);
//! let similar = a.is_similar(&b, Some(DEFAULT_SIMILARITY_THRESHOLD));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::warn;

use super::dct::{self, BLOCK_SIZE, SAMPLE_SIZE};
use crate::error::{Result, SightlineError};

/// Fingerprint size in bytes (64 bits = 8 bytes).
pub const FINGERPRINT_SIZE: usize = 8;

/// Fingerprint size in bits.
pub const FINGERPRINT_BITS: u32 = (FINGERPRINT_SIZE * 8) as u32;

/// Default Hamming distance at or below which two fingerprints are similar.
/// 10 of 64 bits is ~15.6%, enough to absorb JPEG re-encoding and small crops.
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 10;

/// Distance reported for byte strings of different lengths.
pub const MAX_DISTANCE: u32 = u32::MAX;

/// 64-bit perceptual fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Wrap raw fingerprint bytes.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Fingerprint bits as a big-endian integer.
    pub fn from_u64(bits: u64) -> Self {
        Self(bits.to_be_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Hamming distance to another fingerprint.
    pub fn distance(&self, other: &Self) -> u32 {
        hamming_distance(&self.0, &other.0)
    }

    /// Fraction of matching bits, in `[0, 1]`.
    pub fn similarity(&self, other: &Self) -> f64 {
        1.0 - f64::from(self.distance(other)) / f64::from(FINGERPRINT_BITS)
    }

    /// Check whether two fingerprints are within `threshold` bits
    /// (default: [`DEFAULT_SIMILARITY_THRESHOLD`]).
    pub fn is_similar(&self, other: &Self, threshold: Option<u32>) -> bool {
        self.distance(other) <= threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD)
    }

    /// Get the fingerprint as a hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a fingerprint from 16 hexadecimal digits.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| SightlineError::Image(format!("Invalid fingerprint hex: {e}")))?;
        let bytes: [u8; FINGERPRINT_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            SightlineError::Image(format!(
                "Fingerprint must be {FINGERPRINT_SIZE} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the fingerprint of an image, falling back to a time-derived value
/// if the image cannot be fingerprinted.
pub fn compute_fingerprint(image: &DynamicImage) -> Fingerprint {
    match try_compute_fingerprint(image) {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            warn!(error = %e, "Fingerprint failed, using time-derived value");
            time_derived_fingerprint()
        }
    }
}

/// Compute the fingerprint of encoded image bytes (JPEG, PNG, GIF or WebP).
///
/// Undecodable input yields a time-derived fingerprint.
pub fn fingerprint_bytes(image_data: &[u8]) -> Fingerprint {
    match image::load_from_memory(image_data) {
        Ok(image) => compute_fingerprint(&image),
        Err(e) => {
            warn!(error = %e, "Failed to decode image, using time-derived fingerprint");
            time_derived_fingerprint()
        }
    }
}

/// Compute the fingerprint of an image, reporting failures.
pub fn try_compute_fingerprint(image: &DynamicImage) -> Result<Fingerprint> {
    if image.width() == 0 || image.height() == 0 {
        return Err(SightlineError::Image("Image has no pixels".into()));
    }

    let side = SAMPLE_SIZE as u32;
    let luma = image
        .resize_exact(side, side, FilterType::Triangle)
        .to_luma8();
    let pixels: Vec<f64> = luma.pixels().map(|p| f64::from(p.0[0])).collect();

    let block = dct::low_frequency_block(&pixels)
        .ok_or_else(|| SightlineError::Image("Unexpected sample count".into()))?;
    if block.iter().any(|c| !c.is_finite()) {
        return Err(SightlineError::Image("Non-finite DCT coefficient".into()));
    }

    let ac_count = (BLOCK_SIZE * BLOCK_SIZE - 1) as f64;
    let mean = block[1..].iter().sum::<f64>() / ac_count;

    let mut bytes = [0u8; FINGERPRINT_SIZE];
    for (i, coefficient) in block.iter().enumerate() {
        if *coefficient > mean {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
    }

    Ok(Fingerprint(bytes))
}

/// Fingerprint that matches nothing previously seen.
fn time_derived_fingerprint() -> Fingerprint {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha3_256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(b"sightline-fallback-fingerprint");
    let digest = hasher.finalize();

    let mut bytes = [0u8; FINGERPRINT_SIZE];
    bytes.copy_from_slice(&digest[..FINGERPRINT_SIZE]);
    Fingerprint(bytes)
}

/// Compute Hamming distance between two fingerprint byte strings.
///
/// Returns [`MAX_DISTANCE`] if the lengths differ.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    if a.len() != b.len() {
        return MAX_DISTANCE;
    }

    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Smooth pseudo-random texture: a coarse random grid, bilinearly upsampled.
    fn texture(seed: u32, size: u32) -> DynamicImage {
        const GRID: usize = 9;
        let mut state = seed;
        let mut grid = [[0.0f32; GRID]; GRID];
        for row in grid.iter_mut() {
            for cell in row.iter_mut() {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                *cell = (state >> 24) as f32;
            }
        }

        let cell = size as f32 / (GRID - 1) as f32;
        let img = GrayImage::from_fn(size, size, |x, y| {
            let gx = x as f32 / cell;
            let gy = y as f32 / cell;
            let (x0, y0) = (gx.floor() as usize, gy.floor() as usize);
            let (x1, y1) = ((x0 + 1).min(GRID - 1), (y0 + 1).min(GRID - 1));
            let (fx, fy) = (gx - x0 as f32, gy - y0 as f32);
            let top = grid[y0][x0] * (1.0 - fx) + grid[y0][x1] * fx;
            let bottom = grid[y1][x0] * (1.0 - fx) + grid[y1][x1] * fx;
            Luma([(top * (1.0 - fy) + bottom * fy) as u8])
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_fingerprint_size() {
        assert_eq!(FINGERPRINT_SIZE, 8);
        assert_eq!(FINGERPRINT_BITS, 64);
    }

    #[test]
    fn test_hamming_distance_identical() {
        let a = [0x00, 0xFF, 0xAA, 0x55, 0x00, 0xFF, 0xAA, 0x55];
        assert_eq!(hamming_distance(&a, &a), 0);
    }

    #[test]
    fn test_hamming_distance_all_bits() {
        assert_eq!(hamming_distance(&[0x00; 8], &[0xFF; 8]), 64);
    }

    #[test]
    fn test_hamming_distance_length_mismatch() {
        assert_eq!(hamming_distance(&[0x00; 5], &[0x00; 8]), MAX_DISTANCE);
    }

    #[test]
    fn test_similarity_and_threshold() {
        let a = Fingerprint::from_u64(0);
        let b = Fingerprint::from_u64(0b1111);

        assert_eq!(a.distance(&b), 4);
        assert!((a.similarity(&b) - 60.0 / 64.0).abs() < f64::EPSILON);
        assert!(a.is_similar(&b, None));
        assert!(!a.is_similar(&b, Some(3)));

        let far = Fingerprint::from_u64(0x0000_0000_0000_07FF); // 11 bits
        assert!(!a.is_similar(&far, None));
    }

    #[test]
    fn test_hex_roundtrip() {
        let original = Fingerprint::from_bytes([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(original.to_hex(), "deadbeefcafebabe");
        assert_eq!(original.to_string(), "deadbeefcafebabe");
        assert_eq!(Fingerprint::from_hex("deadbeefcafebabe").unwrap(), original);
        assert_eq!(original.as_u64(), 0xDEAD_BEEF_CAFE_BABE);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(Fingerprint::from_hex("deadbeef").is_err());
        assert!(Fingerprint::from_hex("not hex at all!!").is_err());
    }

    #[test]
    fn test_compute_is_deterministic() {
        let image = texture(7, 256);
        assert_eq!(compute_fingerprint(&image), compute_fingerprint(&image));
    }

    #[test]
    fn test_unrelated_images_are_far_apart() {
        let a = compute_fingerprint(&texture(1, 256));
        let b = compute_fingerprint(&texture(99, 256));
        assert!(a.distance(&b) > DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_empty_image_gets_unique_fallback() {
        let empty = DynamicImage::new_luma8(0, 0);
        assert!(try_compute_fingerprint(&empty).is_err());

        let first = compute_fingerprint(&empty);
        let second = compute_fingerprint(&empty);
        assert_ne!(first, second);
    }

    #[test]
    fn test_undecodable_bytes_get_fallback() {
        let a = fingerprint_bytes(&[0x00, 0x01, 0x02]);
        let b = fingerprint_bytes(&[0x00, 0x01, 0x02]);
        assert_ne!(a, b);
    }
}
