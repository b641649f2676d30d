//! Combining per-backend similarities into one score per document.

use paperrec_core::error::{Error, Result};

/// Clamp into [0, 1]; NaN becomes 0.
pub fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Fused, clamped similarity per document.
///
/// With both inputs the result is `alpha * lexical + (1 - alpha) * dense`;
/// with one it is that input. Every input must have `n_docs` entries.
pub fn fuse(lexical: Option<&[f32]>, dense: Option<&[f32]>, alpha: f32, n_docs: usize) -> Result<Vec<f32>> {
    for sims in [lexical, dense].into_iter().flatten() {
        if sims.len() != n_docs {
            return Err(Error::DimensionMismatch { expected: n_docs, actual: sims.len() });
        }
    }
    let fused: Vec<f32> = match (lexical, dense) {
        (Some(l), Some(d)) => l.iter().zip(d).map(|(l, d)| alpha * l + (1.0 - alpha) * d).collect(),
        (Some(s), None) | (None, Some(s)) => s.to_vec(),
        (None, None) => return Err(Error::InvalidConfig("no backend produced similarities".to_string())),
    };
    Ok(fused.into_iter().map(clamp_unit).collect())
}
