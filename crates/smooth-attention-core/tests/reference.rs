//! End-to-end check of SmoothAttention against a plain-loop f64 reference.
//!
//! Both sides use the same seeded projection weights and input, so the
//! reference is regenerated deterministically instead of being stored.
//!
//! Run with: `cargo test -p smooth-attention-core --test reference`

use burn::prelude::*;
use burn_ndarray::NdArray;
use smooth_attention_core::init::{seeded_rng, uniform_tensor};
use smooth_attention_core::{NEIGHBOR_OFFSETS, SmoothAttention, SmoothAttentionConfig};

type TestBackend = NdArray<f32>;

/// Tolerance for output comparisons
const EPSILON: f64 = 1e-3;

/// Positions whose worst-case distance is this close to the threshold are
/// skipped: f32 rounding may legitimately flip the hard gate there.
const GATE_MARGIN: f64 = 1e-4;

/// Projection weights pulled out of a module as host vectors
struct Projection {
    weight: Vec<f64>, // [out, in]
    bias: Vec<f64>,   // [out]
    out_channels: usize,
}

impl Projection {
    fn from_conv(conv: &burn::nn::conv::Conv2d<TestBackend>) -> Self {
        let [out_channels, _, _, _] = conv.weight.dims();
        let weight = to_f64(conv.weight.val());
        let bias = conv
            .bias
            .as_ref()
            .map(|b| to_f64(b.val()))
            .unwrap_or_else(|| vec![0.0; out_channels]);
        Self {
            weight,
            bias,
            out_channels,
        }
    }

    /// x: [c_in][n] -> [c_out][n]
    fn apply(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let in_channels = x.len();
        let n = x[0].len();
        (0..self.out_channels)
            .map(|o| {
                (0..n)
                    .map(|p| {
                        let mut acc = self.bias[o];
                        for i in 0..in_channels {
                            acc += self.weight[o * in_channels + i] * x[i][p];
                        }
                        acc
                    })
                    .collect()
            })
            .collect()
    }
}

fn to_f64<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f64> {
    let values: Vec<f32> = t.into_data().to_vec().unwrap();
    values.into_iter().map(f64::from).collect()
}

/// Reference output for one batch element plus per-position gate distances
struct ReferenceItem {
    output: Vec<Vec<f64>>, // [c][n]
    max_distance: Vec<f64>, // [n]
}

fn reference_item(
    x: &[Vec<f64>],
    height: usize,
    width: usize,
    q: &Projection,
    k: &Projection,
    v: &Projection,
    threshold: f64,
    gamma: f64,
) -> ReferenceItem {
    let n = height * width;
    let query = q.apply(x);
    let key = k.apply(x);
    let value = v.apply(x);

    // Softmax rows
    let mut attention = vec![vec![0.0; n]; n];
    for p in 0..n {
        let energy: Vec<f64> = (0..n)
            .map(|j| (0..query.len()).map(|c| query[c][p] * key[c][j]).sum())
            .collect();
        let max = energy.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = energy.iter().map(|e| (e - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        attention[p] = exp.iter().map(|e| e / total).collect();
    }

    // Edge replication expressed as index clamping
    let neighbor = |p: usize, (dr, dc): (isize, isize)| -> usize {
        let r = (p / width) as isize + dr;
        let c = (p % width) as isize + dc;
        let r = r.clamp(0, height as isize - 1) as usize;
        let c = c.clamp(0, width as isize - 1) as usize;
        r * width + c
    };

    let mut max_distance = vec![0.0; n];
    let mut blended = vec![vec![0.0; n]; n];
    for p in 0..n {
        let mut worst: f64 = 0.0;
        let mut mean = vec![0.0; n];
        for &offset in &NEIGHBOR_OFFSETS {
            let row = &attention[neighbor(p, offset)];
            let d = row
                .iter()
                .zip(&attention[p])
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            worst = worst.max(d);
            for (m, a) in mean.iter_mut().zip(row) {
                *m += a / NEIGHBOR_OFFSETS.len() as f64;
            }
        }
        max_distance[p] = worst;
        blended[p] = if worst > threshold {
            mean
        } else {
            attention[p].clone()
        };
    }

    let output = (0..value.len())
        .map(|c| {
            (0..n)
                .map(|p| {
                    let attended: f64 = (0..n).map(|j| value[c][j] * blended[p][j]).sum();
                    gamma * attended + x[c][p]
                })
                .collect()
        })
        .collect();

    ReferenceItem {
        output,
        max_distance,
    }
}

fn run_scenario(batch: usize, channels: usize, height: usize, width: usize, threshold: f64) {
    let device = Default::default();
    let model: SmoothAttention<TestBackend> = SmoothAttentionConfig::new(channels, channels)
        .with_threshold(threshold)
        .with_seed(42)
        .init(&device)
        .expect("valid config")
        .with_gamma(1.0);

    let x: Tensor<TestBackend, 4> =
        uniform_tensor([batch, channels, height, width], 1.0, &mut seeded_rng(7), &device);
    let actual = to_f64(model.forward(x.clone()));
    let input = to_f64(x);

    let q = Projection::from_conv(&model.query);
    let k = Projection::from_conv(&model.key);
    let v = Projection::from_conv(&model.value);

    let n = height * width;
    let mut compared = 0;
    for b in 0..batch {
        let item: Vec<Vec<f64>> = (0..channels)
            .map(|c| {
                let start = (b * channels + c) * n;
                input[start..start + n].to_vec()
            })
            .collect();
        let reference = reference_item(&item, height, width, &q, &k, &v, threshold, 1.0);

        for p in 0..n {
            if (reference.max_distance[p] - threshold).abs() < GATE_MARGIN {
                continue;
            }
            compared += 1;
            for c in 0..channels {
                let expected = reference.output[c][p];
                let got = actual[(b * channels + c) * n + p];
                let diff = (expected - got).abs();
                assert!(
                    diff < EPSILON * (1.0 + expected.abs()),
                    "batch {b} channel {c} position {p}: expected {expected}, got {got} ({diff})"
                );
            }
        }
    }

    eprintln!("compared {compared} of {} positions", batch * n);
    assert!(compared * 10 >= batch * n * 9, "too many positions near the gate");
}

#[test]
fn test_resnet_bottleneck_matches_reference() {
    // B=2, C=512, H=W=7 as produced by a ResNet-18 encoder on 224x224 input
    run_scenario(2, 512, 7, 7, 0.1);
}

#[test]
fn test_small_grid_matches_reference() {
    run_scenario(1, 16, 4, 5, 0.05);
}

#[test]
fn test_full_smoothing_matches_reference() {
    run_scenario(1, 16, 3, 3, -1.0);
}

#[test]
fn test_no_smoothing_matches_reference() {
    run_scenario(2, 16, 3, 4, 1.0);
}
