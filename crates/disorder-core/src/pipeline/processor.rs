//! Per-method transforms over every partition level.

use ndarray::{Array3, Axis};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ColorSpace;
use crate::methods::{MethodSpec, ReduceContext};
use crate::types::{MethodOutput, PartitionedOutput, PreprocessedImage, TransformedImage};

use super::partition::partition;

/// Maps HSB hue degrees [0, 360) onto 8-bit levels.
const HUE_TO_LEVEL: f64 = 255.0 / 360.0;

/// Applies every configured method to every cell of every partition level.
///
/// Each cell's transform output is reduced to its raw entropy before the next
/// cell is transformed.
#[derive(Clone)]
pub struct PartitionedProcessor {
    methods: Arc<[MethodSpec]>,
    depth: usize,
    ctx: ReduceContext,
    color_space: ColorSpace,
}

impl PartitionedProcessor {
    pub fn new(methods: Vec<MethodSpec>, depth: usize, color_weights: [f64; 3]) -> Self {
        Self {
            methods: methods.into(),
            depth,
            ctx: ReduceContext { color_weights },
            color_space: ColorSpace::Rgb,
        }
    }

    /// Colour space of the preprocessed arrays this processor receives.
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    /// Configured methods, in order.
    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    /// Deepest partition level.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Consume a preprocessed image; its pixel buffer is dropped on return.
    pub fn process(&self, image: PreprocessedImage) -> TransformedImage {
        let PreprocessedImage { identity, pixels } = image;
        let binned = self.level_pixels(&pixels);
        let outputs = self
            .methods
            .iter()
            .map(|spec| {
                let start = Instant::now();
                let source = match &binned {
                    Some(binned) if spec.name.bins_levels() => binned.view(),
                    _ => pixels.view(),
                };
                let levels: PartitionedOutput = (0..=self.depth)
                    .map(|level| {
                        partition(source.view(), level)
                            .into_iter()
                            .map(|row| {
                                row.into_iter()
                                    .map(|cell| spec.reduce(&spec.transform(cell), &self.ctx))
                                    .collect()
                            })
                            .collect()
                    })
                    .collect();
                tracing::trace!("  {}: {:?}", spec.name, start.elapsed());
                MethodOutput {
                    spec: spec.clone(),
                    levels,
                }
            })
            .collect();

        TransformedImage { identity, outputs }
    }

    /// HSB pixels with hue rescaled to 8-bit levels, for level-binning methods.
    fn level_pixels(&self, pixels: &Array3<f64>) -> Option<Array3<f64>> {
        if self.color_space != ColorSpace::Hsb || !self.methods.iter().any(|m| m.name.bins_levels()) {
            return None;
        }
        let mut binned = pixels.clone();
        binned
            .index_axis_mut(Axis(2), 0)
            .mapv_inplace(|hue| hue * HUE_TO_LEVEL);
        Some(binned)
    }
}
