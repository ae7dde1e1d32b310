//! Locally smoothed spatial self-attention
//!
//! Self-attention over the positions of a feature map, where attention rows
//! that disagree sharply with their 8 spatial neighbours are replaced by the
//! neighbour average before being applied to the values.

use burn::module::Param;
use burn::nn::conv::Conv2d;
use burn::prelude::*;

use crate::attention::{
    SmoothedAttention, apply_attention, attention_distribution, smooth_attention_rows,
};
use crate::error::SmoothAttentionError;
use crate::mask::{MaskMode, flagged_positions};

/// Smooth attention block
///
/// Built from [`SmoothAttentionConfig`](crate::SmoothAttentionConfig).
/// `gamma` starts at zero, making a freshly built block the identity.
#[derive(Module, Debug)]
pub struct SmoothAttention<B: Backend> {
    pub query: Conv2d<B>,
    pub key: Conv2d<B>,
    pub value: Conv2d<B>,
    /// Residual scale, shape `[1]`
    pub gamma: Param<Tensor<B, 1>>,
    pub in_channels: usize,
    pub threshold: f64,
    pub soft_mask: bool,
    pub temperature: f64,
}

/// Output of [`SmoothAttention::forward_with_trace`]
#[derive(Debug, Clone)]
pub struct SmoothAttentionOutput<B: Backend> {
    /// `gamma * attended + x`, `[batch, channels, height, width]`
    pub output: Tensor<B, 4>,
    /// Raw softmax attention, `[batch, n, n]`
    pub attention: Tensor<B, 3>,
    /// Smoothed attention with its distance map and mask
    pub smoothed: SmoothedAttention<B>,
}

impl<B: Backend> SmoothAttention<B> {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn mask_mode(&self) -> MaskMode {
        if self.soft_mask {
            MaskMode::Soft {
                temperature: self.temperature,
            }
        } else {
            MaskMode::Hard
        }
    }

    /// Current residual scale
    pub fn gamma(&self) -> Tensor<B, 1> {
        self.gamma.val()
    }

    /// Replaces the residual scale
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        let device = self.gamma.val().device();
        self.gamma = Param::from_tensor(Tensor::from_floats([gamma as f32], &device));
        self
    }

    /// Forward pass
    ///
    /// Input: `[batch, in_channels, height, width]`
    /// Output: same shape
    ///
    /// Panics on malformed shapes; use [`Self::try_forward`] for a checked call.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_with_trace(x).output
    }

    /// Forward pass that checks the input shape first
    pub fn try_forward(&self, x: Tensor<B, 4>) -> Result<Tensor<B, 4>, SmoothAttentionError> {
        let [_, c, h, w] = x.dims();
        if c != self.in_channels {
            return Err(SmoothAttentionError::ChannelMismatch {
                expected: self.in_channels,
                actual: c,
            });
        }
        if h == 0 || w == 0 {
            return Err(SmoothAttentionError::EmptySpatial {
                height: h,
                width: w,
            });
        }
        Ok(self.forward(x))
    }

    /// Forward pass returning the attention intermediates alongside the output
    pub fn forward_with_trace(&self, x: Tensor<B, 4>) -> SmoothAttentionOutput<B> {
        let [b, c, h, w] = x.dims();
        let n = h * w;

        tracing::debug!(
            batch = b,
            channels = c,
            height = h,
            width = w,
            threshold = self.threshold,
            "smooth attention forward"
        );

        let query = self.query.forward(x.clone());
        let key = self.key.forward(x.clone());
        let value = self.value.forward(x.clone());

        // [b, ch, h, w] -> [b, ch, h*w]
        let [_, ck, _, _] = query.dims();
        let [_, cv, _, _] = value.dims();
        let query = query.reshape([b, ck, n]);
        let key = key.reshape([b, ck, n]);
        let value = value.reshape([b, cv, n]);

        let attention = attention_distribution(query, key); // [b, n, n]
        let smoothed = smooth_attention_rows(
            attention.clone(),
            h,
            w,
            self.threshold,
            self.mask_mode(),
        );

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                flagged = flagged_positions(smoothed.mask.clone()),
                positions = b * n,
                "smoothing mask coverage"
            );
        }

        let out = apply_attention(value, smoothed.attention.clone()).reshape([b, c, h, w]);
        let gamma = self.gamma.val().reshape([1, 1, 1, 1]);

        SmoothAttentionOutput {
            output: out * gamma + x,
            attention,
            smoothed,
        }
    }
}
