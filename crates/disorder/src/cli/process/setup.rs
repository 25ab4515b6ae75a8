//! Config overrides from command-line flags.

use disorder_core::config::ExecutionMode;
use disorder_core::{Config, MethodSpec};

use super::ProcessArgs;

/// Validate input and fold every flag into the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &ProcessArgs) -> anyhow::Result<()> {
    // Validate input path exists
    if !args.input.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.input
        );
    }
    config.processing.source = Some(args.input.clone());

    if let Some(output) = &args.output {
        config.output.destination = output.clone();
    }

    if !args.methods.is_empty() {
        config.methods = args
            .methods
            .iter()
            .map(|name| MethodSpec::parse(name.trim()))
            .collect::<Result<_, _>>()?;
    }

    if let Some(depth) = args.depth {
        config.pipeline.partition_depth = depth;
    }
    if let Some(batch_size) = args.batch_size {
        config.processing.batch_size = batch_size;
    }
    if let Some(capacity) = args.queue_capacity {
        config.processing.queue_capacity = capacity;
    }
    if args.truncate.is_some() {
        config.processing.truncate = args.truncate;
    }
    if args.crop.is_some() {
        config.processing.crop_size = args.crop;
    }
    if let Some(color) = args.color {
        config.color.space = color.into();
    }
    if let Some(mode) = args.mode {
        config.output.mode = mode.into();
    }

    if args.parallel {
        config.pipeline.mode = ExecutionMode::Parallel;
    }
    if let Some(workers) = args.workers {
        config.processing.parallel_workers = workers;
    }

    if args.no_resume {
        config.processing.resume = false;
    }
    if args.no_normalize {
        config.entropy.normalize = false;
    }
    if args.normalization.is_some() {
        config.entropy.normalization_table = args.normalization.clone();
    }
    if args.no_images {
        config.output.save_images = false;
    }

    config.check()?;
    Ok(())
}
