//! Seeded parameter initialization
//!
//! Burn's initializers draw from backend-global RNG state. When a seed is
//! configured, projections are drawn from a local [`StdRng`] instead so
//! construction is reproducible on any backend.

use burn::module::Param;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Creates the RNG used for seeded construction
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Tensor with entries drawn uniformly from `[-bound, bound)`
pub fn uniform_tensor<B: Backend, const D: usize>(
    shape: [usize; D],
    bound: f64,
    rng: &mut StdRng,
    device: &B::Device,
) -> Tensor<B, D> {
    let len = shape.iter().product();
    let values: Vec<f32> = (0..len)
        .map(|_| rng.random_range(-bound..bound) as f32)
        .collect();
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// 1x1 convolution mapping `in_channels -> out_channels` over every position
///
/// With an RNG, weight and bias are drawn uniformly within the fan-in bound
/// `1 / sqrt(in_channels)`; otherwise Burn's default initializer is used.
pub fn projection<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    rng: Option<&mut StdRng>,
    device: &B::Device,
) -> Conv2d<B> {
    let mut conv = Conv2dConfig::new([in_channels, out_channels], [1, 1]).init(device);

    if let Some(rng) = rng {
        let bound = (in_channels as f64).sqrt().recip();
        conv.weight = Param::from_tensor(uniform_tensor(
            [out_channels, in_channels, 1, 1],
            bound,
            rng,
            device,
        ));
        conv.bias = Some(Param::from_tensor(uniform_tensor(
            [out_channels],
            bound,
            rng,
            device,
        )));
    }

    conv
}
