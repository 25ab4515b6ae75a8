//! Pipeline run with a progress bar and summary table.

use std::sync::Arc;
use std::time::Duration;

use disorder_core::{Config, Pipeline, ProgressCallback, ProgressEvent, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::reveal::reveal;

/// Run the pipeline for a fully resolved configuration.
pub async fn run_pipeline(config: Config, reveal_when_done: bool) -> anyhow::Result<()> {
    let destination = config.destination();
    let progress = create_progress_bar()?;

    let pipeline = Pipeline::new(config)?.with_progress(progress_callback(progress.clone()));
    let result = pipeline.execute().await;
    progress.finish_and_clear();
    let summary = result?;

    print_summary(&summary);
    eprintln!("  Results: {}", destination.display());

    if summary.succeeded == 0 && summary.skipped == 0 {
        tracing::warn!("No images were scored");
    }

    if reveal_when_done {
        if let Err(e) = reveal(&destination) {
            tracing::warn!("{e}");
        }
    }
    Ok(())
}

/// Map pipeline events onto the progress bar.
fn progress_callback(pb: ProgressBar) -> ProgressCallback {
    Arc::new(move |event: &ProgressEvent| match event {
        ProgressEvent::Started { total, skipped } => {
            pb.set_length(*total as u64);
            if *skipped > 0 {
                pb.println(format!("  Resuming: {skipped} image(s) already recorded"));
            }
            pb.set_message("loading...");
        }
        ProgressEvent::Loaded {
            completed,
            batch_len,
            ..
        } => {
            if completed == batch_len {
                pb.set_message("scoring...");
            }
        }
        ProgressEvent::Scored { path, .. } => {
            pb.inc(1);
            if let Some(name) = path.file_name() {
                pb.set_message(name.to_string_lossy().into_owned());
            }
        }
        ProgressEvent::Failed { .. } => pb.inc(1),
        ProgressEvent::Flushed { written, .. } => {
            pb.set_message(format!("{written} saved"));
        }
    })
}

fn create_progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )?
            .progress_chars("##-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("starting...");
    Ok(pb)
}

/// Print a formatted summary table after the run.
fn print_summary(summary: &RunSummary) {
    let total = summary.succeeded + summary.failed + summary.skipped;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    if summary.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", summary.skipped);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    Written:      {:>8}", summary.records_written);
    eprintln!("    Duration:     {:>7.1}s", summary.total_seconds);
    eprintln!("    Rate:         {:>7.1} img/sec", summary.images_per_second);
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_progress_bar_template_parses() {
        assert!(create_progress_bar().is_ok());
    }

    #[test]
    fn test_callback_tracks_scored_and_failed() {
        let pb = ProgressBar::hidden();
        let callback = progress_callback(pb.clone());

        callback(&ProgressEvent::Started {
            total: 3,
            skipped: 0,
        });
        callback(&ProgressEvent::Scored {
            processed: 1,
            total: 3,
            path: PathBuf::from("a.png"),
        });
        callback(&ProgressEvent::Failed {
            path: PathBuf::from("b.png"),
            reason: "corrupt".into(),
        });

        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.position(), 2);
    }

    #[tokio::test]
    async fn test_run_pipeline_writes_results() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(4, 4, image::Rgb([9, 9, 9]))
            .save(src.path().join("a.png"))
            .unwrap();

        let mut config = Config::default();
        config.processing.source = Some(src.path().to_path_buf());
        config.output.destination = dest.path().to_path_buf();
        config.output.save_images = false;
        config.entropy.normalize = false;
        config.methods = vec![disorder_core::MethodSpec::new(disorder_core::MethodKind::Histogram)];

        run_pipeline(config, false).await.unwrap();
        assert!(dest.path().join("entropy_results.json").exists());
    }
}
