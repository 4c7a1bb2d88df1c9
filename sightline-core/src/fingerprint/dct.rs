//! Separable 2-D DCT-II restricted to the low-frequency corner.
//!
//! Only the top-left `BLOCK_SIZE × BLOCK_SIZE` coefficients of the full
//! `SAMPLE_SIZE × SAMPLE_SIZE` transform are produced. Each of them depends on
//! every input sample, so the values are identical to the corresponding
//! entries of the full transform; the other 960 coefficients are simply never
//! evaluated.

use std::f64::consts::PI;
use std::sync::OnceLock;

/// Edge length of the downsampled luminance image.
pub const SAMPLE_SIZE: usize = 32;

/// Edge length of the retained low-frequency block.
pub const BLOCK_SIZE: usize = 8;

type Basis = [[f64; SAMPLE_SIZE]; BLOCK_SIZE];

/// Orthonormal DCT-II basis rows `k = 0..BLOCK_SIZE` sampled at `n = 0..SAMPLE_SIZE`.
fn basis() -> &'static Basis {
    static BASIS: OnceLock<Basis> = OnceLock::new();
    BASIS.get_or_init(|| {
        let n = SAMPLE_SIZE as f64;
        let mut table = [[0.0; SAMPLE_SIZE]; BLOCK_SIZE];
        for (k, row) in table.iter_mut().enumerate() {
            let scale = if k == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            for (i, value) in row.iter_mut().enumerate() {
                *value = scale * (PI * (2 * i + 1) as f64 * k as f64 / (2.0 * n)).cos();
            }
        }
        table
    })
}

/// Compute the low-frequency block of the 2-D DCT of a row-major
/// `SAMPLE_SIZE × SAMPLE_SIZE` image.
///
/// Output is row-major: index `v * BLOCK_SIZE + u` holds vertical frequency
/// `v` and horizontal frequency `u`.
pub fn low_frequency_block(pixels: &[f64]) -> Option<[f64; BLOCK_SIZE * BLOCK_SIZE]> {
    if pixels.len() != SAMPLE_SIZE * SAMPLE_SIZE {
        return None;
    }
    let basis = basis();

    // Horizontal pass: rows[y][u]
    let mut rows = [[0.0; BLOCK_SIZE]; SAMPLE_SIZE];
    for (y, row) in rows.iter_mut().enumerate() {
        let line = &pixels[y * SAMPLE_SIZE..(y + 1) * SAMPLE_SIZE];
        for (u, out) in row.iter_mut().enumerate() {
            *out = line.iter().zip(basis[u].iter()).map(|(p, b)| p * b).sum();
        }
    }

    // Vertical pass
    let mut block = [0.0; BLOCK_SIZE * BLOCK_SIZE];
    for v in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            block[v * BLOCK_SIZE + u] = rows
                .iter()
                .zip(basis[v].iter())
                .map(|(row, b)| row[u] * b)
                .sum();
        }
    }

    Some(block)
}
