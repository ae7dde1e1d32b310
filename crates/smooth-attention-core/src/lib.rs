//! Smooth Attention for Segmentation Feature Maps
//!
//! Spatial self-attention over a `[batch, channels, height, width]` feature
//! map in which incoherent attention rows are regularised by their
//! neighbours before being applied.
//!
//! # Algorithm
//!
//! 1. 1x1 query/key/value projections, flattened to `height * width` positions
//! 2. `softmax(query^T @ key)` gives one attention row per position
//! 3. Rows are laid out on the spatial grid and edge-replicate padded
//! 4. Chebyshev distance to each of the 8 neighbours; the maximum is thresholded
//! 5. Flagged rows are replaced by the mean of their neighbours' rows
//! 6. `out = gamma * (value @ attention^T) + x`, with `gamma` starting at zero
//!
//! # Modules
//!
//! - [`smooth_attention`] - The [`SmoothAttention`] block
//! - [`config`] - [`SmoothAttentionConfig`] and threshold reference values
//! - [`attention`] - Attention distribution, application and row smoothing
//! - [`neighborhood`] - Edge-replicated 8-neighbourhood distance and mean
//! - [`mask`] - Hard and soft smoothing masks
//! - [`init`] - Seeded projection initialization
//! - [`backends`] - Feature-gated backend re-exports
//!
//! # Example
//!
//! ```ignore
//! use smooth_attention_core::SmoothAttentionConfig;
//!
//! let attn = SmoothAttentionConfig::new(512, 512)
//!     .with_threshold(0.1)
//!     .with_seed(42)
//!     .init::<Backend>(&device)?;
//!
//! // [batch, 512, h, w] -> [batch, 512, h, w]
//! let refined = attn.forward(features);
//! ```

pub mod attention;
pub mod backends;
pub mod config;
pub mod error;
pub mod init;
pub mod mask;
pub mod neighborhood;
pub mod smooth_attention;

pub use attention::{SmoothedAttention, smooth_attention_rows};
pub use config::{SmoothAttentionConfig, threshold};
pub use error::SmoothAttentionError;
pub use mask::{MaskMode, flagged_positions};
pub use neighborhood::{NEIGHBOR_OFFSETS, Neighborhood};
pub use smooth_attention::{SmoothAttention, SmoothAttentionOutput};
