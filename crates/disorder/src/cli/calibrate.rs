//! The `disorder calibrate` command: build a normalization table.

use clap::Args;
use disorder_core::{Config, EntropyValue, MethodSpec, NormalizationTable};
use std::path::PathBuf;

use crate::cli::process::ColorArg;

/// Arguments for the `calibrate` command.
#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Where to write the table (defaults to entropy.normalization_table, then ./normalization.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Side of the square noise reference image
    #[arg(long)]
    pub size: Option<u32>,

    /// Seed for the noise reference image
    #[arg(long)]
    pub seed: Option<u64>,

    /// Partition depth to compute references at
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Methods to calibrate (defaults to the configured battery)
    #[arg(short, long = "method", value_delimiter = ',')]
    pub methods: Vec<String>,

    /// Colour space the noise is converted to
    #[arg(long, value_enum)]
    pub color: Option<ColorArg>,
}

/// Execute the calibrate command.
pub async fn execute(args: CalibrateArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(size) = args.size {
        config.entropy.reference_size = size;
    }
    if let Some(seed) = args.seed {
        config.entropy.reference_seed = seed;
    }
    if let Some(depth) = args.depth {
        config.pipeline.partition_depth = depth;
    }
    if let Some(color) = args.color {
        config.color.space = color.into();
    }
    if !args.methods.is_empty() {
        config.methods = args
            .methods
            .iter()
            .map(|name| MethodSpec::parse(name.trim()))
            .collect::<Result<_, _>>()?;
    }
    config.check()?;

    let output = args
        .output
        .or_else(|| config.normalization_table())
        .unwrap_or_else(|| PathBuf::from("normalization.json"));

    let table = tokio::task::spawn_blocking(move || NormalizationTable::calibrate(&config)).await?;
    table.save(&output)?;

    eprintln!();
    eprintln!(
        "  Reference: {0}x{0} noise, seed {1}, depth {2}",
        table.reference.size, table.reference.seed, table.reference.depth
    );
    for (method, value) in &table.methods {
        eprintln!("    {:<16} {}", method, describe(value));
    }
    println!("Normalization table written to: {}", output.display());
    Ok(())
}

/// Short human-readable form of a reference value.
fn describe(value: &EntropyValue) -> String {
    match value {
        EntropyValue::Scalar(v) => format!("{v:.4}"),
        EntropyValue::List(_) => {
            let values = value.flatten();
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            format!("{} values, mean {:.4}", values.len(), mean)
        }
    }
}
