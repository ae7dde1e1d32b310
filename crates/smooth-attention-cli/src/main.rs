//! smooth-attention CLI
//!
//! Builds a SmoothAttention block, runs it on a seeded random feature map and
//! reports what the smoothing did.
//!
//! Supports:
//! - `run`: one forward pass with attention and mask statistics
//! - `sweep`: flagged-position counts over a range of thresholds
//! - `print-config`: the effective configuration as JSON

use anyhow::{Context, Result};
use burn::prelude::*;
use clap::{Args, Parser, Subcommand};
use smooth_attention_core::backends::{BACKEND_NAME, DefaultBackend, default_device};
use smooth_attention_core::init::{seeded_rng, uniform_tensor};
use smooth_attention_core::{
    MaskMode, SmoothAttentionConfig, flagged_positions, smooth_attention_rows,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smooth-attention")]
#[command(about = "Inspect locally smoothed spatial self-attention")]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one forward pass on a random feature map
    Run {
        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        input: InputArgs,

        /// Residual scale to force after construction (0 keeps the identity)
        #[arg(long, default_value = "1.0")]
        gamma: f64,
    },

    /// Count smoothed positions for each threshold on the same input
    Sweep {
        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        input: InputArgs,

        /// Thresholds to evaluate
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "-1,0,0.01,0.05,0.1,0.2,0.5,1"
        )]
        thresholds: Vec<f64>,
    },

    /// Print the effective configuration as JSON
    PrintConfig {
        #[command(flatten)]
        model: ModelArgs,
    },
}

/// Module configuration: a JSON file, overridden by any flags given
#[derive(Args, Debug)]
struct ModelArgs {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input (and value) channel count
    #[arg(long)]
    channels: Option<usize>,

    /// Query/key projection width
    #[arg(long)]
    key_channels: Option<usize>,

    /// Smoothing threshold
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Use a sigmoid mask with this temperature instead of the hard gate
    #[arg(long)]
    soft_temperature: Option<f64>,

    /// Seed for projection weights
    #[arg(long)]
    seed: Option<u64>,
}

impl ModelArgs {
    fn resolve(&self) -> Result<SmoothAttentionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => SmoothAttentionConfig::resnet18(),
        };

        if let Some(channels) = self.channels {
            config.in_channels = channels;
            config.out_channels = channels;
        }
        if let Some(key_channels) = self.key_channels {
            config.key_channels = Some(key_channels);
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(temperature) = self.soft_temperature {
            config.mask = MaskMode::Soft { temperature };
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }

        config.validate().context("Invalid smooth attention config")?;
        Ok(config)
    }
}

/// Random input feature map
#[derive(Args, Debug)]
struct InputArgs {
    /// Batch size
    #[arg(long, default_value = "2")]
    batch: usize,

    /// Feature map height
    #[arg(long, default_value = "7")]
    height: usize,

    /// Feature map width
    #[arg(long, default_value = "7")]
    width: usize,

    /// Seed for the input values (uniform in [-1, 1))
    #[arg(long, default_value = "0")]
    input_seed: u64,
}

impl InputArgs {
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.batch > 0 && self.height > 0 && self.width > 0,
            "Input must be at least 1x1 with a non-empty batch, got batch {} at {}x{}",
            self.batch,
            self.height,
            self.width
        );
        Ok(())
    }

    fn tensor<B: Backend>(&self, channels: usize, device: &B::Device) -> Tensor<B, 4> {
        uniform_tensor(
            [self.batch, channels, self.height, self.width],
            1.0,
            &mut seeded_rng(self.input_seed),
            device,
        )
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn to_vec<const D: usize>(tensor: Tensor<DefaultBackend, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow::anyhow!("Failed to read tensor: {:?}", e))
}

fn run(model_args: &ModelArgs, input: &InputArgs, gamma: f64) -> Result<()> {
    let config = model_args.resolve()?;
    input.validate()?;
    let device = default_device();

    let model = config
        .init::<DefaultBackend>(&device)
        .context("Failed to build smooth attention")?
        .with_gamma(gamma);
    let x = input.tensor::<DefaultBackend>(config.in_channels, &device);

    println!("smooth-attention ({BACKEND_NAME})\n");
    println!("Configuration:");
    println!("  Channels:  {} (key {})", config.in_channels, config.key_channels());
    println!("  Threshold: {}", config.threshold);
    println!("  Mask:      {:?}", config.mask);
    println!("  Gamma:     {}", gamma);
    println!("  Input:     {:?}", x.dims());

    let start = std::time::Instant::now();
    let trace = model.forward_with_trace(x.clone());
    let elapsed = start.elapsed();

    let shift = to_vec((trace.output.clone() - x).abs().max())?;
    let sums = to_vec(trace.attention.clone().sum_dim(2))?;
    let row_min = sums.iter().cloned().fold(f32::INFINITY, f32::min);
    let row_max = sums.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let distances = to_vec(trace.smoothed.max_distance.clone())?;
    let distance_max = distances.iter().cloned().fold(0.0f32, f32::max);
    let distance_mean = distances.iter().sum::<f32>() / distances.len().max(1) as f32;
    let flagged = flagged_positions(trace.smoothed.mask.clone());

    println!("\nResult:");
    println!("  Output:        {:?}", trace.output.dims());
    println!("  Max |out-in|:  {:.6}", shift.first().copied().unwrap_or_default());
    println!("  Raw row sums:  [{:.6}, {:.6}]", row_min, row_max);
    println!("  Distance:      mean {:.4}, max {:.4}", distance_mean, distance_max);
    println!("  Smoothed:      {} / {} positions", flagged, distances.len());
    println!("  Time:          {:.2?}", elapsed);

    Ok(())
}

fn sweep(model_args: &ModelArgs, input: &InputArgs, thresholds: &[f64]) -> Result<()> {
    let config = model_args.resolve()?;
    input.validate()?;
    let device = default_device();

    let model = config
        .init::<DefaultBackend>(&device)
        .context("Failed to build smooth attention")?;
    let x = input.tensor::<DefaultBackend>(config.in_channels, &device);
    let trace = model.forward_with_trace(x);

    let positions = input.batch * input.height * input.width;
    println!("{:>10}  {:>10}  {:>8}", "threshold", "smoothed", "share");

    let mut previous = usize::MAX;
    for &threshold in thresholds {
        let smoothed = smooth_attention_rows(
            trace.attention.clone(),
            input.height,
            input.width,
            threshold,
            config.mask,
        );
        let flagged = flagged_positions(smoothed.mask);
        println!(
            "{:>10}  {:>10}  {:>7.1}%",
            threshold,
            flagged,
            100.0 * flagged as f64 / positions.max(1) as f64
        );

        if flagged > previous {
            tracing::warn!(threshold, flagged, previous, "smoothed count increased with threshold");
        }
        previous = flagged;
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            model,
            input,
            gamma,
        } => run(&model, &input, gamma),
        Commands::Sweep {
            model,
            input,
            thresholds,
        } => sweep(&model, &input, &thresholds),
        Commands::PrintConfig { model } => {
            let config = model.resolve()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
