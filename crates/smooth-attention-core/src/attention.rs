use burn::prelude::*;

use crate::mask::MaskMode;
use crate::neighborhood::Neighborhood;

/// Pairwise attention distribution over flattened spatial positions
///
/// Computes `softmax(query^T @ key)` over the last axis. Energies are not
/// scaled by `1/sqrt(d)`.
///
/// # Arguments
///
/// * `query` - `[batch, key_channels, n]`
/// * `key` - `[batch, key_channels, n]`
///
/// # Returns
///
/// `[batch, n, n]` where row `p` is how much position `p` attends to every
/// position.
pub fn attention_distribution<B: Backend>(query: Tensor<B, 3>, key: Tensor<B, 3>) -> Tensor<B, 3> {
    // [batch, n, n]
    let energy = query.transpose().matmul(key);
    burn::tensor::activation::softmax(energy, 2)
}

/// Aggregates value features with an attention matrix
///
/// `value`: `[batch, channels, n]`, `attention`: `[batch, n, n]`.
/// Returns `value @ attention^T`, shape `[batch, channels, n]`.
pub fn apply_attention<B: Backend>(value: Tensor<B, 3>, attention: Tensor<B, 3>) -> Tensor<B, 3> {
    value.matmul(attention.transpose())
}

/// Attention after neighbourhood smoothing, with the intermediates that
/// produced it
#[derive(Debug, Clone)]
pub struct SmoothedAttention<B: Backend> {
    /// Blended attention, `[batch, n, n]`. Rows need not sum to one.
    pub attention: Tensor<B, 3>,
    /// Worst-case neighbour Chebyshev distance, `[batch, height, width]`
    pub max_distance: Tensor<B, 3>,
    /// Smoothing mask, `[batch, height, width]`
    pub mask: Tensor<B, 3>,
}

/// Smooths attention rows that disagree with their spatial neighbours
///
/// Each position's row is compared against its 8 edge-replicated neighbours.
/// Where the largest L-infinity distance exceeds `threshold` the row is
/// replaced by the mean of the neighbour rows (fully for the hard mask,
/// partially for the soft one). Blended rows are not renormalised.
///
/// # Arguments
///
/// * `attention` - Raw distribution `[batch, height * width, height * width]`
/// * `height`, `width` - Spatial extent the rows are laid out on
/// * `threshold` - Distance above which a row is smoothed
/// * `mode` - Mask construction
pub fn smooth_attention_rows<B: Backend>(
    attention: Tensor<B, 3>,
    height: usize,
    width: usize,
    threshold: f64,
    mode: MaskMode,
) -> SmoothedAttention<B> {
    let [b, n, _] = attention.dims();

    let grid = attention.reshape([b, height, width, n]);
    let hood = Neighborhood::new(grid.clone());

    let max_distance = hood.max_distance(); // [b, h, w, 1]
    let mask = mode.build(max_distance.clone(), threshold);
    let smoothed = hood.mean();

    let keep = mask.clone().neg() + 1.0;
    let blended = grid * keep + smoothed * mask.clone();

    SmoothedAttention {
        attention: blended.reshape([b, n, n]),
        max_distance: max_distance.reshape([b, height, width]),
        mask: mask.reshape([b, height, width]),
    }
}
