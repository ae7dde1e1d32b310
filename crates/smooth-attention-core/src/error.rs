//! Error type for smooth attention construction and checked forward passes

use thiserror::Error;

/// Errors raised while configuring or validating a smooth attention module
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SmoothAttentionError {
    #[error(
        "channel counts must be non-zero (in {in_channels}, out {out_channels}, key {key_channels})"
    )]
    ZeroChannels {
        in_channels: usize,
        out_channels: usize,
        key_channels: usize,
    },

    #[error("value width {out_channels} must equal input width {in_channels} for the residual")]
    ValueWidthMismatch {
        in_channels: usize,
        out_channels: usize,
    },

    #[error("threshold must be finite, got {0}")]
    InvalidThreshold(f64),

    #[error("soft mask temperature must be finite and positive, got {0}")]
    InvalidTemperature(f64),

    #[error("shape mismatch: expected {expected} input channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("spatial extent must be at least 1x1, got {height}x{width}")]
    EmptySpatial { height: usize, width: usize },
}
