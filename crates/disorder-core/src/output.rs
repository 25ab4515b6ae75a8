//! Persistence of entropy records and exported images.
//!
//! Records live in `entropy_results.json`, a single JSON array. Three modes
//! keep it up to date:
//!
//! - **bulk** buffers every record and writes the array once in [`DataSaver::finish`].
//! - **append** splices each flush in front of the closing `]`, so the file
//!   parses as an array after every flush.
//! - **journal** appends JSON lines to `entropy_results.jsonl` and compacts them
//!   into the array (temp file + rename) when the run finishes.
//!
//! A record's index is its position in the array. Exported images are named
//! `image_{index}.{ext}` so they line up with their records.

use image::ImageFormat;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::{OutputConfig, PersistMode};
use crate::error::{OutputError, OutputResult};
use crate::types::EntropyRecord;

/// Canonical results document.
pub const RESULTS_FILE: &str = "entropy_results.json";

/// Line journal used by the journal mode.
pub const JOURNAL_FILE: &str = "entropy_results.jsonl";

const SCAN_CHUNK: usize = 4096;

/// Writes records and images into a destination directory.
pub struct DataSaver {
    destination: PathBuf,
    methods: Vec<String>,
    mode: PersistMode,
    pretty: bool,
    export: Option<(String, ImageFormat)>,
    /// Records already in the destination, including earlier runs
    written: usize,
    /// Source paths of the records found when the destination was opened
    recorded: Vec<PathBuf>,
    /// Records held back until `finish` (bulk mode)
    pending: Vec<EntropyRecord>,
}

impl DataSaver {
    /// Open a destination, creating it if needed.
    ///
    /// A journal left behind by an interrupted run is compacted first, so the
    /// array is the single source of truth for resume.
    pub fn open(destination: &Path, methods: Vec<String>, config: &OutputConfig) -> OutputResult<Self> {
        std::fs::create_dir_all(destination).map_err(|source| OutputError::Write {
            path: destination.to_path_buf(),
            source,
        })?;

        let export = if config.save_images {
            let ext = config.image_extension.to_lowercase();
            let format = ImageFormat::from_extension(&ext).ok_or_else(|| OutputError::Malformed {
                path: destination.to_path_buf(),
                message: format!("unknown image extension '{ext}'"),
            })?;
            Some((ext, format))
        } else {
            None
        };

        let mut saver = Self {
            destination: destination.to_path_buf(),
            methods,
            mode: config.mode,
            pretty: config.pretty,
            export,
            written: 0,
            recorded: Vec::new(),
            pending: Vec::new(),
        };

        if saver.journal_path().exists() {
            tracing::info!("Compacting journal left by a previous run");
            saver.compact()?;
        }
        saver.recorded = read_recorded_paths(&saver.results_path())?;
        saver.written = saver.recorded.len();
        tracing::debug!(
            "Opened {:?} ({:?} mode, {} existing records)",
            saver.results_path(),
            saver.mode,
            saver.written
        );
        Ok(saver)
    }

    /// Remove the results array and journal from a destination.
    ///
    /// Returns `true` if anything was removed.
    pub fn reset(destination: &Path) -> OutputResult<bool> {
        let mut removed = false;
        for name in [RESULTS_FILE, JOURNAL_FILE] {
            let path = destination.join(name);
            if path.exists() {
                std::fs::remove_file(&path).map_err(write_error(&path))?;
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Path of `entropy_results.json`.
    pub fn results_path(&self) -> PathBuf {
        self.destination.join(RESULTS_FILE)
    }

    /// Path of `entropy_results.jsonl`.
    pub fn journal_path(&self) -> PathBuf {
        self.destination.join(JOURNAL_FILE)
    }

    /// Destination directory.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Method names every record is expected to carry, in order.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Records persisted so far, across runs, plus buffered bulk records.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Take the source paths recorded in the destination when it was opened.
    pub fn take_recorded(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.recorded)
    }

    /// Records currently stored in the results array.
    pub fn existing_records(&self) -> OutputResult<Vec<EntropyRecord>> {
        read_array(&self.results_path())
    }

    /// Persist a batch of records and export their images.
    ///
    /// Returns the index assigned to the first record.
    pub fn flush(&mut self, records: Vec<EntropyRecord>) -> OutputResult<usize> {
        let first = self.written;
        if records.is_empty() {
            return Ok(first);
        }
        for record in &records {
            self.check_methods(record);
        }

        match self.mode {
            PersistMode::Append => append_to_array(&self.results_path(), &records, self.pretty)?,
            PersistMode::Journal => append_to_journal(&self.journal_path(), &records)?,
            PersistMode::Bulk => {}
        }

        for (offset, record) in records.iter().enumerate() {
            self.export_image(&record.path, first + offset);
        }

        self.written += records.len();
        if self.mode == PersistMode::Bulk {
            self.pending.extend(records);
        }
        tracing::info!("Saved {} records ({} total)", self.written - first, self.written);
        Ok(first)
    }

    /// Complete the run: write buffered bulk records or compact the journal.
    pub fn finish(&mut self) -> OutputResult<()> {
        match self.mode {
            PersistMode::Bulk => {
                let mut records = self.existing_records()?;
                records.append(&mut self.pending);
                write_array_atomic(&self.results_path(), &records, self.pretty)
            }
            PersistMode::Journal => self.compact(),
            PersistMode::Append => {
                if !self.results_path().exists() {
                    write_array_atomic(&self.results_path(), &[], self.pretty)?;
                }
                Ok(())
            }
        }
    }

    /// Merge the journal into the results array and remove it.
    ///
    /// Torn or unparsable journal lines are skipped with a warning.
    pub fn compact(&mut self) -> OutputResult<()> {
        let journal = self.journal_path();
        let mut records = self.existing_records()?;
        records.extend(read_journal(&journal)?);
        write_array_atomic(&self.results_path(), &records, self.pretty)?;
        if journal.exists() {
            std::fs::remove_file(&journal).map_err(|source| OutputError::Write {
                path: journal.clone(),
                source,
            })?;
        }
        tracing::debug!("Compacted {} records into {:?}", records.len(), self.results_path());
        Ok(())
    }

    fn check_methods(&self, record: &EntropyRecord) {
        let names = record.entropy_results.iter().map(|r| r.method.as_str());
        if !names.eq(self.methods.iter().map(String::as_str)) {
            tracing::warn!(
                "Record for {:?} does not carry the configured methods in order",
                record.path
            );
        }
    }

    /// Transcode the source image to `image_{index}.{ext}`; failures only log.
    fn export_image(&self, source: &Path, index: usize) {
        let Some((ext, format)) = &self.export else {
            return;
        };
        let target = self.destination.join(format!("image_{index}.{ext}"));
        let result = image::open(source)
            .map(|img| image::DynamicImage::ImageRgb8(img.to_rgb8()))
            .and_then(|img| img.save_with_format(&target, *format));
        if let Err(e) = result {
            tracing::warn!("Failed to export {:?} to {:?}: {}", source, target, e);
        }
    }
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    }
}

fn read_error(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Read {
        path: path.to_path_buf(),
        source,
    }
}

/// The only field resume needs; every other field is skipped while parsing.
#[derive(Deserialize)]
struct RecordedPath {
    path: PathBuf,
}

fn render(record: &EntropyRecord, pretty: bool) -> OutputResult<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(record)?
    } else {
        serde_json::to_string(record)?
    })
}

/// `[\n rec,\n rec\n]` body for a complete array.
fn render_array(records: &[EntropyRecord], pretty: bool) -> OutputResult<String> {
    let mut out = String::from("[");
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('\n');
        out.push_str(&render(record, pretty)?);
    }
    out.push_str("\n]\n");
    Ok(out)
}

/// Parse the results array; a missing or blank file holds no records.
fn read_array<T: DeserializeOwned>(path: &Path) -> OutputResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut file = File::open(path).map_err(read_error(path))?;
    if first_non_whitespace(&mut file).map_err(read_error(path))?.is_none() {
        return Ok(Vec::new());
    }
    file.seek(SeekFrom::Start(0)).map_err(read_error(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| OutputError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Source paths of every record in the results array, in array order.
fn read_recorded_paths(path: &Path) -> OutputResult<Vec<PathBuf>> {
    Ok(read_array::<RecordedPath>(path)?
        .into_iter()
        .map(|r| r.path)
        .collect())
}

fn read_journal(path: &Path) -> OutputResult<Vec<EntropyRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(read_error(path))?;
    let mut records = Vec::new();
    let mut skipped_lines = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(read_error(path))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<EntropyRecord>(line) {
            Ok(record) => records.push(record),
            Err(_) => skipped_lines += 1,
        }
    }
    if skipped_lines > 0 {
        tracing::warn!(
            "{skipped_lines} lines in {:?} could not be parsed and were dropped; \
             those images will be reprocessed on resume",
            path
        );
    }
    Ok(records)
}

fn write_array_atomic(path: &Path, records: &[EntropyRecord], pretty: bool) -> OutputResult<()> {
    let body = render_array(records, pretty)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp).map_err(write_error(&tmp))?;
        file.write_all(body.as_bytes()).map_err(write_error(&tmp))?;
        file.sync_all().map_err(write_error(&tmp))?;
    }
    std::fs::rename(&tmp, path).map_err(write_error(path))
}

fn append_to_journal(path: &Path, records: &[EntropyRecord]) -> OutputResult<()> {
    let mut body = String::new();
    for record in records {
        body.push_str(&serde_json::to_string(record)?);
        body.push('\n');
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_error(path))?;
    file.write_all(body.as_bytes()).map_err(write_error(path))?;
    file.sync_data().map_err(write_error(path))
}

/// Splice records in front of the closing bracket of an existing array.
fn append_to_array(path: &Path, records: &[EntropyRecord], pretty: bool) -> OutputResult<()> {
    let len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(write_error(path))?;

    let malformed = |message: &str| OutputError::Malformed {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let Some((close_at, close)) = last_non_whitespace(&mut file, len).map_err(read_error(path))? else {
        // Missing or blank file: start a fresh array
        let body = render_array(records, pretty)?;
        file.set_len(0).map_err(write_error(path))?;
        file.seek(SeekFrom::Start(0)).map_err(write_error(path))?;
        file.write_all(body.as_bytes()).map_err(write_error(path))?;
        return file.sync_data().map_err(write_error(path));
    };

    if first_non_whitespace(&mut file).map_err(read_error(path))? != Some(b'[') {
        return Err(malformed("document does not start with '['"));
    }
    if close != b']' {
        return Err(malformed("document does not end with ']'"));
    }
    let is_empty = matches!(
        last_non_whitespace(&mut file, close_at).map_err(read_error(path))?,
        Some((_, b'['))
    );

    let mut body = String::new();
    for record in records {
        if !is_empty || !body.is_empty() {
            body.push(',');
        }
        body.push('\n');
        body.push_str(&render(record, pretty)?);
    }
    body.push_str("\n]\n");

    file.seek(SeekFrom::Start(close_at)).map_err(write_error(path))?;
    file.write_all(body.as_bytes()).map_err(write_error(path))?;
    file.set_len(close_at + body.len() as u64)
        .map_err(write_error(path))?;
    file.sync_data().map_err(write_error(path))
}

fn first_non_whitespace(file: &mut File) -> std::io::Result<Option<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; SCAN_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(&b) = buf[..n].iter().find(|b| !b.is_ascii_whitespace()) {
            return Ok(Some(b));
        }
    }
}

/// Offset and value of the last non-whitespace byte before `end`.
fn last_non_whitespace(file: &mut File, end: u64) -> std::io::Result<Option<(u64, u8)>> {
    let mut buf = [0u8; SCAN_CHUNK];
    let mut end = end;
    while end > 0 {
        let start = end.saturating_sub(SCAN_CHUNK as u64);
        let n = (end - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf[..n])?;
        if let Some(i) = buf[..n].iter().rposition(|b| !b.is_ascii_whitespace()) {
            return Ok(Some((start + i as u64, buf[i])));
        }
        end = start;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntropyValue, MethodResult};
    use image::{Rgb, RgbImage};

    fn record(path: &Path, value: f64) -> EntropyRecord {
        EntropyRecord {
            path: path.to_path_buf(),
            size: 10,
            pixel_size: [2, 2],
            label: "lab".into(),
            entropy_results: vec![MethodResult {
                method: "hist".into(),
                result: EntropyValue::Scalar(value),
            }],
        }
    }

    fn config(mode: PersistMode, save_images: bool) -> OutputConfig {
        OutputConfig {
            mode,
            save_images,
            ..OutputConfig::default()
        }
    }

    fn open(dir: &Path, mode: PersistMode) -> DataSaver {
        DataSaver::open(dir, vec!["hist".into()], &config(mode, false)).unwrap()
    }

    fn parse(path: &Path) -> Vec<EntropyRecord> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_append_is_valid_after_every_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = open(dir.path(), PersistMode::Append);
        for i in 0..4 {
            let first = saver
                .flush(vec![record(Path::new(&format!("{i}a.png")), i as f64), record(Path::new(&format!("{i}b.png")), 0.5)])
                .unwrap();
            assert_eq!(first, i * 2);
            let records = parse(&saver.results_path());
            assert_eq!(records.len(), (i + 1) * 2);
        }
        assert_eq!(saver.written(), 8);
    }

    #[test]
    fn test_append_continues_existing_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        let existing = vec![record(Path::new("old.png"), 1.0)];
        std::fs::write(&path, format!("{}\n\n  ", serde_json::to_string_pretty(&existing).unwrap())).unwrap();

        let mut saver = open(dir.path(), PersistMode::Append);
        assert_eq!(saver.written(), 1);
        assert_eq!(saver.flush(vec![record(Path::new("new.png"), 2.0)]).unwrap(), 1);

        let records = parse(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].path, PathBuf::from("new.png"));
    }

    #[test]
    fn test_append_into_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        std::fs::write(&path, "[ ]").unwrap();
        let mut saver = open(dir.path(), PersistMode::Append);
        saver.flush(vec![record(Path::new("a.png"), 1.0)]).unwrap();
        assert_eq!(parse(&path).len(), 1);
    }

    #[test]
    fn test_append_rejects_missing_closing_bracket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        std::fs::write(&path, "[{\"path\":\"a\"").unwrap();
        let err = DataSaver::open(dir.path(), vec![], &config(PersistMode::Append, false))
            .err()
            .unwrap();
        assert!(matches!(err, OutputError::Malformed { .. }));

        let err = append_to_array(&path, &[record(Path::new("b.png"), 1.0)], false).unwrap_err();
        assert!(err.to_string().contains("']'"));
    }

    #[test]
    fn test_append_rejects_missing_opening_bracket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        std::fs::write(&path, "{}]").unwrap();
        let err = append_to_array(&path, &[record(Path::new("b.png"), 1.0)], false).unwrap_err();
        assert!(err.to_string().contains("'['"));
    }

    #[test]
    fn test_bulk_writes_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = open(dir.path(), PersistMode::Bulk);
        saver.flush(vec![record(Path::new("a.png"), 1.0)]).unwrap();
        assert!(!saver.results_path().exists());
        saver.flush(vec![record(Path::new("b.png"), 2.0)]).unwrap();
        saver.finish().unwrap();
        assert_eq!(parse(&saver.results_path()).len(), 2);
    }

    #[test]
    fn test_journal_compacts_and_skips_torn_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = open(dir.path(), PersistMode::Journal);
        saver.flush(vec![record(Path::new("a.png"), 1.0)]).unwrap();
        saver.flush(vec![record(Path::new("b.png"), 2.0)]).unwrap();

        // Simulate a crash mid-write
        let mut journal = OpenOptions::new().append(true).open(saver.journal_path()).unwrap();
        journal.write_all(b"{\"path\":\"c.png\",\"si").unwrap();
        drop(journal);

        let reopened = open(dir.path(), PersistMode::Journal);
        assert!(!reopened.journal_path().exists());
        assert_eq!(reopened.written(), 2);
        let records = parse(&reopened.results_path());
        assert_eq!(records[0].path, PathBuf::from("a.png"));
        assert_eq!(records[1].path, PathBuf::from("b.png"));
    }

    #[test]
    fn test_images_exported_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.png");
        RgbImage::from_pixel(3, 3, Rgb([1, 2, 3])).save(&src).unwrap();
        let dest = dir.path().join("out");

        let mut saver = DataSaver::open(&dest, vec!["hist".into()], &config(PersistMode::Append, true)).unwrap();
        saver.flush(vec![record(&src, 1.0), record(&dest.join("missing.png"), 1.0)]).unwrap();
        saver.flush(vec![record(&src, 1.0)]).unwrap();

        assert!(dest.join("image_0.bmp").exists());
        // Export failures are not fatal
        assert!(!dest.join("image_1.bmp").exists());
        assert!(dest.join("image_2.bmp").exists());
        assert_eq!(parse(&saver.results_path()).len(), 3);
    }

    #[test]
    fn test_open_collects_recorded_paths_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        let mut nested = record(Path::new("deep.png"), 0.0);
        nested.entropy_results[0].result = EntropyValue::List(vec![
            EntropyValue::List(vec![EntropyValue::Scalar(1.0)]),
            EntropyValue::List(vec![EntropyValue::Scalar(0.5), EntropyValue::Scalar(0.25)]),
        ]);
        let existing = vec![record(Path::new("a.png"), 1.0), nested];
        std::fs::write(&path, serde_json::to_string_pretty(&existing).unwrap()).unwrap();

        let mut saver = open(dir.path(), PersistMode::Append);
        assert_eq!(saver.written(), 2);
        assert_eq!(
            saver.take_recorded(),
            vec![PathBuf::from("a.png"), PathBuf::from("deep.png")]
        );
        assert!(saver.take_recorded().is_empty());
        assert_eq!(saver.written(), 2);
    }

    #[test]
    fn test_blank_results_file_holds_no_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RESULTS_FILE), "  \n").unwrap();
        let mut saver = open(dir.path(), PersistMode::Append);
        assert_eq!(saver.written(), 0);
        assert!(saver.take_recorded().is_empty());
    }

    #[test]
    fn test_unreadable_results_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(RESULTS_FILE)).unwrap();
        let err = DataSaver::open(dir.path(), vec![], &config(PersistMode::Append, false))
            .err()
            .unwrap();
        assert!(matches!(err, OutputError::Read { .. }), "{err:?}");
        assert!(err.to_string().starts_with("Failed to read"));
    }
}
