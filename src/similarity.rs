use crate::error::{DdiError, Result};

/// Cosine similarity between two embeddings.
///
/// Fails with `DegenerateVector` when either norm is zero rather than
/// producing NaN. The result is clamped to [-1, 1] to absorb rounding.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(DdiError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 || !norm_a.is_finite() || !norm_b.is_finite() {
        return Err(DdiError::DegenerateVector);
    }

    Ok((dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
