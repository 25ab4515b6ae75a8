//! Image entropy pipeline components.
//!
//! This module contains the stages an image passes through:
//! - **discovery**: Enumerate image paths and filter already-recorded ones
//! - **validate**: Pre-decode checks (existence, size, magic bytes)
//! - **decode**: Load batches of images into owned records
//! - **preprocess**: Square crop and colour space conversion
//! - **partition**: Split images into 2^L × 2^L cell grids
//! - **processor**: Apply every method to every cell of every level
//! - **queue** / **channel**: Bounded buffering between scoring and saving
//! - **manager**: Drives batches in sequential or parallel mode
//! - **progress**: Progress events for callers

pub mod channel;
pub mod decode;
pub mod discovery;
pub mod manager;
pub mod partition;
pub mod preprocess;
pub mod processor;
pub mod progress;
pub mod queue;
pub mod validate;

// Re-exports for convenient access
pub use decode::{ImageLoader, LoadedBatch};
pub use discovery::PathEnumerator;
pub use manager::{ImageScorer, Pipeline, ResumeState};
pub use partition::{partition, reassemble};
pub use preprocess::Preprocessor;
pub use processor::PartitionedProcessor;
pub use progress::{ProgressCallback, ProgressEvent};
pub use queue::FlushQueue;
pub use validate::Validator;
