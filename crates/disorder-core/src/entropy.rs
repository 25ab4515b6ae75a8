//! Nesting and normalization of per-cell entropies into method results.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::normalization::{divide, Degraded, NormalizationTable};
use crate::types::{EntropyValue, MethodOutput, MethodResult, ScoredImage, TransformedImage};

/// Scores transformed images, optionally normalizing against a reference table.
pub struct EntropyCalculator {
    table: Option<Arc<NormalizationTable>>,
    /// Methods already warned about, so each warning is logged once
    warned: Mutex<HashSet<String>>,
}

impl EntropyCalculator {
    pub fn new(table: Option<Arc<NormalizationTable>>) -> Self {
        Self {
            table,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// A calculator that divides by 1.
    pub fn unnormalized() -> Self {
        Self::new(None)
    }

    /// Consume a transformed image and produce its ordered method results.
    pub fn score(&self, image: TransformedImage) -> ScoredImage {
        let TransformedImage { identity, outputs } = image;
        let results = outputs
            .into_iter()
            .map(|output| {
                let method = output.spec.name.to_string();
                let raw = self.raw_value(output);
                let result = self.normalize(&method, raw);
                MethodResult { method, result }
            })
            .collect();
        ScoredImage { identity, results }
    }

    /// Unnormalized result of one method.
    ///
    /// With a single level the result is the lone cell's value; otherwise it is
    /// nested `[level][row][col]`.
    pub fn raw_value(&self, output: MethodOutput) -> EntropyValue {
        let mut levels = output.levels;
        if levels.len() == 1 && levels[0].len() == 1 && levels[0][0].len() == 1 {
            if let Some(cell) = levels.pop().and_then(|mut g| g.pop()).and_then(|mut r| r.pop()) {
                return cell;
            }
        }
        EntropyValue::List(
            levels
                .into_iter()
                .map(|grid| {
                    EntropyValue::List(grid.into_iter().map(EntropyValue::List).collect())
                })
                .collect(),
        )
    }

    /// Divide a raw value by its reference; divides by 1 when unavailable.
    pub fn normalize(&self, method: &str, raw: EntropyValue) -> EntropyValue {
        let Some(table) = &self.table else {
            return raw;
        };
        let Some(reference) = table.get(method) else {
            self.warn_once(method, "no reference value, results left unnormalized");
            return raw;
        };

        let mut degraded = None;
        let value = divide(&raw, reference, &mut degraded);
        match degraded {
            Some(Degraded::ZeroReference) => {
                self.warn_once(method, "zero reference value, affected results divided by 1")
            }
            Some(Degraded::ShapeMismatch) => self.warn_once(
                method,
                "reference shape differs from results, unmatched values divided by 1",
            ),
            None => {}
        }
        value
    }

    fn warn_once(&self, method: &str, message: &str) {
        let first = self
            .warned
            .lock()
            .map(|mut warned| warned.insert(method.to_string()))
            .unwrap_or(true);
        if first {
            tracing::warn!("Normalization for '{}': {}", method, message);
        }
    }
}
