//! In-memory queue of scored records awaiting persistence.

use crate::error::OutputResult;
use crate::output::DataSaver;
use crate::types::EntropyRecord;

/// Holds up to `capacity` records between flushes.
#[derive(Debug)]
pub struct FlushQueue {
    items: Vec<EntropyRecord>,
    capacity: usize,
}

impl FlushQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue a record. Returns `true` once the queue is full and must be
    /// flushed before another record is admitted.
    pub fn push(&mut self, record: EntropyRecord) -> bool {
        self.items.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Take every queued record, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<EntropyRecord> {
        std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }

    /// Persist and clear the queue. Returns the number of records flushed.
    pub fn flush_into(&mut self, saver: &mut DataSaver) -> OutputResult<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let records = self.drain();
        let count = records.len();
        saver.flush(records)?;
        Ok(count)
    }
}
