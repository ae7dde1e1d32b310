//! Construction-time configuration for [`SmoothAttention`]

use burn::module::Param;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SmoothAttentionError;
use crate::init::{projection, seeded_rng};
use crate::mask::MaskMode;
use crate::smooth_attention::SmoothAttention;

/// Smoothing threshold reference values
///
/// Distances are L-infinity distances between two attention rows, each
/// non-negative and summing to one, so they always lie in `[0, 1]`.
/// Any threshold below zero smooths every position; any threshold at or
/// above one smooths none.
pub mod threshold {
    /// Default sensitivity
    pub const DEFAULT: f64 = 0.1;
    /// Largest possible distance between two probability rows
    pub const MAX_DISTANCE: f64 = 1.0;
}

/// SmoothAttention configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothAttentionConfig {
    /// Channels of the incoming feature map
    pub in_channels: usize,
    /// Value projection width; must equal `in_channels`
    pub out_channels: usize,
    /// Query/key projection width (defaults to `out_channels`)
    pub key_channels: Option<usize>,
    /// Worst-case neighbour distance above which a row is smoothed
    pub threshold: f64,
    /// Mask construction
    pub mask: MaskMode,
    /// Seed for reproducible projection weights
    pub seed: Option<u64>,
}

impl Default for SmoothAttentionConfig {
    fn default() -> Self {
        Self {
            in_channels: 512,
            out_channels: 512,
            key_channels: None,
            threshold: threshold::DEFAULT,
            mask: MaskMode::Hard,
            seed: None,
        }
    }
}

impl SmoothAttentionConfig {
    /// Creates a config with the default threshold and a hard mask
    pub fn new(in_channels: usize, out_channels: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            ..Self::default()
        }
    }

    /// Bottleneck of a ResNet-18/34 encoder (512 channels)
    pub fn resnet18() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_key_channels(mut self, key_channels: usize) -> Self {
        self.key_channels = Some(key_channels);
        self
    }

    pub fn with_mask(mut self, mask: MaskMode) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Effective query/key width
    pub fn key_channels(&self) -> usize {
        self.key_channels.unwrap_or(self.out_channels)
    }

    /// Checks that the config describes a constructible module
    pub fn validate(&self) -> Result<(), SmoothAttentionError> {
        let key_channels = self.key_channels();
        if self.in_channels == 0 || self.out_channels == 0 || key_channels == 0 {
            return Err(SmoothAttentionError::ZeroChannels {
                in_channels: self.in_channels,
                out_channels: self.out_channels,
                key_channels,
            });
        }
        if self.out_channels != self.in_channels {
            return Err(SmoothAttentionError::ValueWidthMismatch {
                in_channels: self.in_channels,
                out_channels: self.out_channels,
            });
        }
        if !self.threshold.is_finite() {
            return Err(SmoothAttentionError::InvalidThreshold(self.threshold));
        }
        if let MaskMode::Soft { temperature } = self.mask {
            if !(temperature.is_finite() && temperature > 0.0) {
                return Err(SmoothAttentionError::InvalidTemperature(temperature));
            }
        }
        Ok(())
    }

    /// Builds the module on `device`
    ///
    /// The residual scale starts at zero, so the new module is the identity.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<SmoothAttention<B>, SmoothAttentionError> {
        self.validate()?;

        let key_channels = self.key_channels();
        let mut rng = self.seed.map(seeded_rng);

        let query = projection(self.in_channels, key_channels, rng.as_mut(), device);
        let key = projection(self.in_channels, key_channels, rng.as_mut(), device);
        let value = projection(self.in_channels, self.out_channels, rng.as_mut(), device);

        let (soft_mask, temperature) = match self.mask {
            MaskMode::Hard => (false, 0.0),
            MaskMode::Soft { temperature } => (true, temperature),
        };

        tracing::debug!(
            in_channels = self.in_channels,
            key_channels,
            threshold = self.threshold,
            seeded = self.seed.is_some(),
            "initialized smooth attention"
        );

        Ok(SmoothAttention {
            query,
            key,
            value,
            gamma: Param::from_tensor(Tensor::zeros([1], device)),
            in_channels: self.in_channels,
            threshold: self.threshold,
            soft_mask,
            temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_default_config() {
        let config = SmoothAttentionConfig::resnet18();
        assert_eq!(config.in_channels, 512);
        assert_eq!(config.out_channels, 512);
        assert_eq!(config.key_channels(), 512);
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.mask, MaskMode::Hard);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_value_width_must_match_input() {
        let err = SmoothAttentionConfig::new(8, 4).validate().unwrap_err();
        assert_eq!(
            err,
            SmoothAttentionError::ValueWidthMismatch {
                in_channels: 8,
                out_channels: 4
            }
        );
    }

    #[test]
    fn test_zero_channels_rejected() {
        let err = SmoothAttentionConfig::new(8, 8)
            .with_key_channels(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SmoothAttentionError::ZeroChannels { key_channels: 0, .. }));
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let err = SmoothAttentionConfig::new(8, 8)
            .with_threshold(f64::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SmoothAttentionError::InvalidThreshold(_)));

        // Out-of-range but finite thresholds are meaningful extremes.
        assert!(SmoothAttentionConfig::new(8, 8).with_threshold(-3.0).validate().is_ok());
        assert!(SmoothAttentionConfig::new(8, 8).with_threshold(2.0).validate().is_ok());
    }

    #[test]
    fn test_soft_temperature_rejected() {
        let err = SmoothAttentionConfig::new(8, 8)
            .with_mask(MaskMode::Soft { temperature: 0.0 })
            .validate()
            .unwrap_err();
        assert_eq!(err, SmoothAttentionError::InvalidTemperature(0.0));
    }

    #[test]
    fn test_init_gamma_zero_and_key_width() {
        let device = Default::default();
        let model = SmoothAttentionConfig::new(8, 8)
            .with_key_channels(3)
            .init::<TestBackend>(&device)
            .unwrap();

        assert_eq!(model.query.weight.dims(), [3, 8, 1, 1]);
        assert_eq!(model.key.weight.dims(), [3, 8, 1, 1]);
        assert_eq!(model.value.weight.dims(), [8, 8, 1, 1]);

        let gamma: Vec<f32> = model.gamma.val().into_data().to_vec().unwrap();
        assert_eq!(gamma, vec![0.0]);
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let device = Default::default();
        let weights = |seed: u64| -> Vec<f32> {
            let model = SmoothAttentionConfig::new(8, 8)
                .with_seed(seed)
                .init::<TestBackend>(&device)
                .unwrap();
            model.query.weight.val().into_data().to_vec().unwrap()
        };

        assert_eq!(weights(5), weights(5));
        assert_ne!(weights(5), weights(6));
    }

    #[test]
    fn test_config_json_roundtrip_with_defaults() {
        let config: SmoothAttentionConfig =
            serde_json::from_str(r#"{"in_channels": 64, "out_channels": 64, "threshold": 0.25}"#)
                .unwrap();
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.mask, MaskMode::Hard);
        assert_eq!(config.seed, None);

        let json = serde_json::to_string(&config).unwrap();
        let back: SmoothAttentionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
