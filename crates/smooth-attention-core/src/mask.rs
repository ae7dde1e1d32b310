//! Smoothing mask construction
//!
//! Turns the worst-case neighbour distance map into a per-position gate.
//! The hard gate matches the reference behaviour; the soft gate is a
//! sigmoid relaxation kept as an opt-in variant for gradient flow
//! experiments.

use burn::prelude::*;
use burn::tensor::ElementConversion;
use burn::tensor::activation::sigmoid;
use serde::{Deserialize, Serialize};

/// How the distance map is turned into a smoothing mask
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaskMode {
    /// `1.0` where `distance > threshold`, else `0.0`
    ///
    /// Gradient is zero almost everywhere through the comparison.
    #[default]
    Hard,
    /// `sigmoid((distance - threshold) / temperature)`
    ///
    /// Approaches [`MaskMode::Hard`] as `temperature -> 0`.
    Soft { temperature: f64 },
}

impl MaskMode {
    /// Builds the mask from a distance map of any rank
    ///
    /// # Arguments
    ///
    /// * `distance` - Worst-case neighbour distance per position
    /// * `threshold` - Distances strictly above this are smoothed
    pub fn build<B: Backend, const D: usize>(
        &self,
        distance: Tensor<B, D>,
        threshold: f64,
    ) -> Tensor<B, D> {
        match *self {
            MaskMode::Hard => distance.greater_elem(threshold).float(),
            MaskMode::Soft { temperature } => sigmoid((distance - threshold) / temperature),
        }
    }
}

/// Counts positions whose mask value is above one half
///
/// For the hard mask this is exactly the number of smoothed positions.
/// Reads the mask back to the host.
pub fn flagged_positions<B: Backend, const D: usize>(mask: Tensor<B, D>) -> usize {
    let flagged: f64 = mask.greater_elem(0.5).float().sum().into_scalar().elem();
    flagged.round() as usize
}
