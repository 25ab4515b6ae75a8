//! The `disorder process` command for scoring image collections.

mod batch;
mod setup;
pub mod types;

pub use types::{ColorArg, PersistArg};

use clap::Args;
use disorder_core::Config;
use std::path::PathBuf;

use batch::run_pipeline;
use setup::apply_overrides;

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Image file or directory to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Destination directory for entropy_results.json and exported images
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Entropy methods to run, in order (repeat or comma-separate)
    #[arg(short, long = "method", value_delimiter = ',')]
    pub methods: Vec<String>,

    /// Deepest partition level (level L splits into 2^L x 2^L cells)
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Paths loaded per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Records held in memory before each flush
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Process only the first N images
    #[arg(long)]
    pub truncate: Option<usize>,

    /// Crop to a fixed square side instead of the shorter image side
    #[arg(long)]
    pub crop: Option<u32>,

    /// Colour space to convert images to
    #[arg(long, value_enum)]
    pub color: Option<ColorArg>,

    /// Persistence mode
    #[arg(long, value_enum)]
    pub mode: Option<PersistArg>,

    /// Score images on a worker pool (record order follows completion)
    #[arg(long)]
    pub parallel: bool,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Start over instead of skipping images already in the destination
    #[arg(long)]
    pub no_resume: bool,

    /// Report raw entropies instead of dividing by the noise reference
    #[arg(long)]
    pub no_normalize: bool,

    /// Normalization table produced by `disorder calibrate`
    #[arg(long)]
    pub normalization: Option<PathBuf>,

    /// Do not export image_{index} copies next to the results
    #[arg(long)]
    pub no_images: bool,

    /// Open the destination in the file manager when done
    #[arg(long)]
    pub reveal: bool,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args)?;

    tracing::info!(
        "Scoring {:?} with {} method(s) at depth {} -> {:?}",
        args.input,
        config.methods.len(),
        config.pipeline.partition_depth,
        config.destination()
    );

    let reveal = args.reveal || config.output.reveal;
    run_pipeline(config, reveal).await
}
