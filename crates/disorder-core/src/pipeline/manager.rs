//! Batch driver tying enumeration, scoring and persistence together.
//!
//! Sequential mode scores images one at a time and saves them in path order.
//! Parallel mode fans per-image work out over blocking tasks, bounded by a
//! semaphore of `parallel_workers` permits, and streams finished records
//! through a bounded channel to a single saver.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};

use crate::config::{Config, ExecutionMode};
use crate::entropy::EntropyCalculator;
use crate::error::{ConfigError, PipelineError, Result};
use crate::normalization::NormalizationTable;
use crate::output::DataSaver;
use crate::types::{EntropyRecord, LoadedImage, RunSummary};

use super::channel::bounded_channel;
use super::decode::ImageLoader;
use super::discovery::PathEnumerator;
use super::preprocess::Preprocessor;
use super::processor::PartitionedProcessor;
use super::progress::{report, ProgressCallback, ProgressEvent};
use super::queue::FlushQueue;

/// Where a run stands relative to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
    /// Records already in the destination when the run started
    pub processed: usize,
    /// Paths enumerated under the source root
    pub total: usize,
    pub batch_size: usize,
    pub queue_capacity: usize,
    /// Index of the batch being processed
    pub batch_index: usize,
}

impl ResumeState {
    /// Number of batches needed for `remaining` paths.
    pub fn batch_count(&self, remaining: usize) -> usize {
        remaining.div_ceil(self.batch_size)
    }
}

type ScoreResult = std::result::Result<EntropyRecord, PipelineError>;

/// Per-image work after decoding: preprocess, transform and score.
pub struct ImageScorer {
    preprocessor: Preprocessor,
    processor: PartitionedProcessor,
    calculator: EntropyCalculator,
}

impl ImageScorer {
    pub fn new(config: &Config, table: Option<Arc<NormalizationTable>>) -> Self {
        Self {
            preprocessor: Preprocessor::new(config.processing.crop_size, config.color.space),
            processor: PartitionedProcessor::new(
                config.methods.clone(),
                config.pipeline.partition_depth,
                config.entropy.color_weights,
            )
            .with_color_space(config.color.space),
            calculator: EntropyCalculator::new(table),
        }
    }

    /// Consume a loaded image and produce its persisted record.
    pub fn score(&self, image: LoadedImage) -> EntropyRecord {
        let start = Instant::now();
        let preprocessed = self.preprocessor.preprocess(image);
        let transformed = self.processor.process(preprocessed);
        let scored = self.calculator.score(transformed);
        tracing::debug!("Scored {:?} in {:?}", scored.identity.path, start.elapsed());
        scored.into()
    }
}

/// Paths still to process plus the opened destination.
struct Prepared {
    paths: Vec<PathBuf>,
    saver: DataSaver,
    state: ResumeState,
    skipped: usize,
}

/// Drives a complete run from enumeration to the last flush.
pub struct Pipeline {
    config: Config,
    enumerator: PathEnumerator,
    loader: Arc<ImageLoader>,
    scorer: Arc<ImageScorer>,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Validate the configuration and resolve the normalization table.
    pub fn new(config: Config) -> Result<Self> {
        config.check()?;
        let table = NormalizationTable::resolve(&config)?;
        let scorer = ImageScorer::new(&config, table);
        Ok(Self {
            enumerator: PathEnumerator::new(&config.processing),
            loader: Arc::new(ImageLoader::new(config.limits.clone())),
            scorer: Arc::new(scorer),
            progress: None,
            config,
        })
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run with the configured execution mode.
    pub async fn execute(&self) -> Result<RunSummary> {
        match self.config.pipeline.mode {
            ExecutionMode::Sequential => self.run(),
            ExecutionMode::Parallel => self.run_parallel().await,
        }
    }

    fn prepare(&self) -> Result<Prepared> {
        let root = self.config.source().ok_or_else(|| {
            ConfigError::ValidationError("processing.source must be set".to_string())
        })?;
        let paths = self.enumerator.enumerate(&root)?;
        let destination = self.config.destination();

        if !self.config.processing.resume && DataSaver::reset(&destination)? {
            tracing::warn!("Resume disabled, replacing existing results in {:?}", destination);
        }
        let mut saver =
            DataSaver::open(&destination, self.config.method_names(), &self.config.output)?;

        let total = paths.len();
        let paths = PathEnumerator::remaining(paths, &saver.take_recorded());
        let skipped = total - paths.len();
        if skipped > 0 {
            tracing::info!(
                "Resuming: {} of {} images already recorded in {:?}",
                skipped,
                total,
                destination
            );
        }

        report(
            self.progress.as_ref(),
            ProgressEvent::Started {
                total: paths.len(),
                skipped,
            },
        );

        let state = ResumeState {
            processed: saver.written(),
            total,
            batch_size: self.config.processing.batch_size.max(1),
            queue_capacity: self.config.processing.queue_capacity,
            batch_index: 0,
        };
        Ok(Prepared {
            paths,
            saver,
            state,
            skipped,
        })
    }

    /// Score every remaining image in path order.
    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let Prepared {
            paths,
            mut saver,
            mut state,
            skipped,
        } = self.prepare()?;

        let mut summary = RunSummary {
            skipped,
            ..RunSummary::default()
        };
        let mut queue = FlushQueue::new(state.queue_capacity);
        let progress = self.progress.as_ref();

        let batches = state.batch_count(paths.len());
        for (batch_index, batch) in paths.chunks(state.batch_size).enumerate() {
            state.batch_index = batch_index;
            tracing::info!(
                "Batch {}/{} ({} images, {} recorded before this run)",
                state.batch_index + 1,
                batches,
                batch.len(),
                state.processed
            );

            let loaded = self.loader.load_batch(batch, progress);
            summary.failed += loaded.failures.len();

            for image in loaded.images {
                let record = self.scorer.score(image);
                summary.succeeded += 1;
                report(
                    progress,
                    ProgressEvent::Scored {
                        processed: summary.succeeded + summary.failed,
                        total: paths.len(),
                        path: record.path.clone(),
                    },
                );
                if queue.push(record) {
                    summary.records_written += self.flush(&mut queue, &mut saver)?;
                }
            }
        }

        summary.records_written += self.flush(&mut queue, &mut saver)?;
        saver.finish()?;
        Ok(finish_summary(summary, start))
    }

    /// Score every remaining image on a bounded worker pool.
    ///
    /// A worker keeps its permit until the saver has accepted its record, so at
    /// most `parallel_workers` records wait beyond the channel. If saving fails,
    /// the producer is stopped and no further images are scheduled.
    pub async fn run_parallel(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let Prepared {
            paths,
            mut saver,
            mut state,
            skipped,
        } = self.prepare()?;

        let total = paths.len();
        let queue_capacity = state.queue_capacity;
        let (tx, mut rx) = bounded_channel::<ScoreResult>(queue_capacity);
        let semaphore = Arc::new(Semaphore::new(self.config.processing.parallel_workers.max(1)));
        let loader = self.loader.clone();
        let scorer = self.scorer.clone();
        let progress = self.progress.clone();

        let producer = tokio::spawn(async move {
            let batches = state.batch_count(paths.len());
            for (batch_index, batch) in paths.chunks(state.batch_size).enumerate() {
                state.batch_index = batch_index;
                tracing::info!(
                    "Batch {}/{} ({} images, {} recorded before this run)",
                    state.batch_index + 1,
                    batches,
                    batch.len(),
                    state.processed
                );
                let batch_start = Instant::now();
                let completed = Arc::new(AtomicUsize::new(0));
                let mut handles = Vec::with_capacity(batch.len());

                for path in batch {
                    if tx.is_closed() {
                        tracing::debug!("Saver stopped, no further images scheduled");
                        return;
                    }
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        tracing::warn!("Worker semaphore closed unexpectedly, stopping run");
                        return;
                    };
                    let loader = loader.clone();
                    let scorer = scorer.clone();
                    let progress = progress.clone();
                    let completed = completed.clone();
                    let tx = tx.clone();
                    let path = path.clone();
                    let batch_len = batch.len();

                    handles.push(tokio::task::spawn_blocking(move || {
                        let loaded = loader.load(&path);
                        report(
                            progress.as_ref(),
                            ProgressEvent::Loaded {
                                completed: completed.fetch_add(1, Ordering::Relaxed) + 1,
                                batch_len,
                                elapsed: batch_start.elapsed(),
                            },
                        );
                        let result = loaded.map(|image| scorer.score(image));
                        if tx.blocking_send(result).is_err() {
                            tracing::debug!("Saver stopped, discarding result for {:?}", path);
                        }
                        drop(permit);
                    }));
                }

                // Batch boundary: every image of this batch finishes first
                for handle in handles {
                    if let Err(e) = handle.await {
                        tracing::error!("Image worker panicked: {e}");
                    }
                }
            }
        });

        let mut summary = RunSummary {
            skipped,
            ..RunSummary::default()
        };
        let mut queue = FlushQueue::new(queue_capacity);

        let consumed = self
            .consume(&mut rx, &mut queue, &mut saver, &mut summary, total)
            .await;
        if let Err(e) = consumed {
            producer.abort();
            return Err(e);
        }

        if let Err(e) = producer.await {
            tracing::error!("Image producer panicked: {e}");
        }

        summary.records_written += self.flush(&mut queue, &mut saver)?;
        saver.finish()?;
        Ok(finish_summary(summary, start))
    }

    /// Receive worker results until every sender is gone, flushing full queues.
    async fn consume(
        &self,
        rx: &mut mpsc::Receiver<ScoreResult>,
        queue: &mut FlushQueue,
        saver: &mut DataSaver,
        summary: &mut RunSummary,
        total: usize,
    ) -> Result<()> {
        let progress = self.progress.as_ref();
        while let Some(result) = rx.recv().await {
            match result {
                Ok(record) => {
                    summary.succeeded += 1;
                    report(
                        progress,
                        ProgressEvent::Scored {
                            processed: summary.succeeded + summary.failed,
                            total,
                            path: record.path.clone(),
                        },
                    );
                    if queue.push(record) {
                        summary.records_written += self.flush(queue, saver)?;
                    }
                }
                Err(e) => {
                    tracing::error!("Dropping {:?}: {}", e.path(), e);
                    summary.failed += 1;
                    report(
                        progress,
                        ProgressEvent::Failed {
                            path: e.path().clone(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn flush(&self, queue: &mut FlushQueue, saver: &mut DataSaver) -> Result<usize> {
        let records = queue.flush_into(saver)?;
        if records > 0 {
            report(
                self.progress.as_ref(),
                ProgressEvent::Flushed {
                    records,
                    written: saver.written(),
                },
            );
        }
        Ok(records)
    }
}

fn finish_summary(mut summary: RunSummary, start: Instant) -> RunSummary {
    let elapsed = start.elapsed().as_secs_f64();
    summary.total_seconds = elapsed;
    summary.images_per_second = if elapsed > 0.0 {
        summary.succeeded as f64 / elapsed
    } else {
        0.0
    };
    tracing::info!(
        "Run complete: {} scored, {} failed, {} skipped, {} records written in {:.1}s",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.records_written,
        elapsed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistMode;
    use crate::methods::{MethodKind, MethodSpec};
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use std::sync::Mutex;

    fn write_images(dir: &Path, n: usize) {
        for i in 0..n {
            let img = RgbImage::from_fn(6, 6, |x, y| Rgb([(x * 40) as u8, (y * 40) as u8, (i * 30) as u8]));
            img.save(dir.join(format!("img_{i:02}.png"))).unwrap();
        }
    }

    fn config(source: &Path, dest: &Path) -> Config {
        let mut config = Config::default();
        config.processing.source = Some(source.to_path_buf());
        config.processing.batch_size = 2;
        config.processing.queue_capacity = 3;
        config.output.destination = dest.to_path_buf();
        config.output.save_images = false;
        config.entropy.normalize = false;
        config.methods = vec![
            MethodSpec::new(MethodKind::Histogram),
            MethodSpec::new(MethodKind::Naive),
        ];
        config
    }

    #[test]
    fn test_resume_state_batch_count() {
        let state = ResumeState {
            processed: 7,
            total: 20,
            batch_size: 5,
            queue_capacity: 2,
            batch_index: 0,
        };
        assert_eq!(state.batch_count(13), 3);
        assert_eq!(state.batch_count(10), 2);
        assert_eq!(state.batch_count(0), 0);
    }

    #[test]
    fn test_sequential_run_writes_every_image_in_order() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write_images(src.path(), 5);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let pipeline = Pipeline::new(config(src.path(), dest.path()))
            .unwrap()
            .with_progress(Arc::new(move |e: &ProgressEvent| {
                if let ProgressEvent::Flushed { records, .. } = e {
                    sink.lock().unwrap().push(*records);
                }
            }));

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.succeeded, 5);
        assert_eq!(summary.records_written, 5);
        assert_eq!(summary.failed, 0);
        // Queue capacity 3: one full flush, then the remainder
        assert_eq!(*events.lock().unwrap(), vec![3, 2]);

        let saver = DataSaver::open(dest.path(), vec![], &pipeline.config().output).unwrap();
        let records = saver.existing_records().unwrap();
        let names: Vec<_> = records
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["img_00.png", "img_01.png", "img_02.png", "img_03.png", "img_04.png"]);
        assert!(records.iter().all(|r| r.entropy_results.len() == 2));
    }

    #[test]
    fn test_corrupt_image_is_counted_and_skipped() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write_images(src.path(), 2);
        std::fs::write(src.path().join("img_01b.png"), b"not an image").unwrap();

        let summary = Pipeline::new(config(src.path(), dest.path())).unwrap().run().unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.records_written, 2);
    }

    #[test]
    fn test_missing_source_is_a_config_error() {
        let dest = tempfile::tempdir().unwrap();
        let mut cfg = config(Path::new("/unused"), dest.path());
        cfg.processing.source = None;
        let err = Pipeline::new(cfg).unwrap().run().unwrap_err();
        assert!(err.to_string().contains("processing.source"));
    }

    #[test]
    fn test_no_resume_replaces_results() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write_images(src.path(), 3);

        let mut cfg = config(src.path(), dest.path());
        Pipeline::new(cfg.clone()).unwrap().run().unwrap();
        cfg.processing.resume = false;
        let summary = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.succeeded, 3);

        let saver = DataSaver::open(dest.path(), vec![], &cfg.output).unwrap();
        assert_eq!(saver.written(), 3);
    }

    #[tokio::test]
    async fn test_parallel_run_records_every_image_once() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write_images(src.path(), 7);

        let mut cfg = config(src.path(), dest.path());
        cfg.pipeline.mode = ExecutionMode::Parallel;
        cfg.processing.parallel_workers = 3;
        cfg.output.mode = PersistMode::Journal;

        let pipeline = Pipeline::new(cfg.clone()).unwrap();
        let summary = pipeline.execute().await.unwrap();
        assert_eq!(summary.succeeded, 7);
        assert_eq!(summary.records_written, 7);

        let saver = DataSaver::open(dest.path(), vec![], &cfg.output).unwrap();
        let mut paths: Vec<_> = saver
            .existing_records()
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 7);
        assert!(!saver.journal_path().exists());
    }

    #[tokio::test]
    async fn test_parallel_run_stops_scheduling_when_saving_fails() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        write_images(src.path(), 40);

        let mut cfg = config(src.path(), dest.path());
        cfg.pipeline.mode = ExecutionMode::Parallel;
        cfg.processing.parallel_workers = 1;
        cfg.processing.batch_size = 40;
        cfg.processing.queue_capacity = 1;
        cfg.output.mode = PersistMode::Append;

        // Corrupt the results document before the first flush
        let results = dest.path().join(crate::output::RESULTS_FILE);
        let loaded = Arc::new(AtomicUsize::new(0));
        let scored = Arc::new(AtomicUsize::new(0));
        let (loaded_sink, scored_sink) = (loaded.clone(), scored.clone());
        let pipeline = Pipeline::new(cfg).unwrap().with_progress(Arc::new(move |e: &ProgressEvent| {
            match e {
                ProgressEvent::Loaded { .. } => {
                    loaded_sink.fetch_add(1, Ordering::SeqCst);
                }
                ProgressEvent::Scored { .. } => {
                    if scored_sink.fetch_add(1, Ordering::SeqCst) == 0 {
                        std::fs::write(&results, "garbage").unwrap();
                    }
                }
                _ => {}
            }
        }));

        let err = pipeline.execute().await.unwrap_err();
        assert!(err.to_string().contains("Malformed"), "{err}");

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let loaded = loaded.load(Ordering::SeqCst);
        assert!(loaded < 10, "{loaded} images loaded after the saver failed");
        assert_eq!(scored.load(Ordering::SeqCst), 1);
    }
}
