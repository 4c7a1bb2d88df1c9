//! Perceptual fingerprints for near-duplicate detection.
//!
//! A fingerprint summarizes the low-frequency content of an image in 64 bits.
//! Re-encoded or slightly cropped shots of the same object land within a few
//! bits of each other, while unrelated images differ in roughly half of them.
//!
//! # Components
//!
//! - **DCT**: the low-frequency corner of a 32×32 discrete cosine transform.
//! - **Perceptual**: fingerprint computation, Hamming distance and similarity.

mod dct;
pub mod perceptual;

pub use perceptual::*;
