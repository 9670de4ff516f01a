//! Result records and where they go.
//!
//! One [`ResultRecord`] is produced per (structure, configuration) pair in a
//! measure run. [`CsvResultSink`] writes them with the fixed header
//!
//! ```text
//! index,wafer,die,block,material,structure,config,current,voltage,resistance
//! ```
//!
//! and flushes after every row so an interrupted run keeps what it measured.

use crate::error::{AppResult, ProbeError};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// One measured configuration on one structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    /// Position of the structure in the filtered, ordered sequence; resume
    /// with `offset = index + 1`.
    pub index: usize,
    /// Wafer number
    pub wafer: Option<u32>,
    /// Die number
    pub die: Option<u32>,
    /// Block column of the structure
    pub block: String,
    /// Material column of the structure
    pub material: String,
    /// Structure type tag
    pub structure: String,
    /// Configuration name
    pub config: String,
    /// Forced current in amps
    pub current: f64,
    /// Sampled voltage in volts
    pub voltage: f64,
    /// `voltage / current` in ohms
    pub resistance: f64,
}

/// How an existing output file is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Refuse to touch an existing file.
    #[default]
    CreateNew,
    /// Truncate an existing file.
    Overwrite,
    /// Add rows after existing content; the header is written only into an
    /// empty file.
    Append,
}

/// Destination for result records.
pub trait ResultSink: Send {
    /// Write one record. Durable once this returns.
    fn append(&mut self, record: &ResultRecord) -> AppResult<()>;
    /// Flush and release the destination. Idempotent.
    fn close(&mut self) -> AppResult<()>;
    /// Records appended through this sink.
    fn records_written(&self) -> usize;
}

fn sink_closed() -> ProbeError {
    ProbeError::Io(io::Error::new(
        io::ErrorKind::Other,
        "result sink already closed",
    ))
}

/// CSV file sink.
pub struct CsvResultSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    written: usize,
}

impl CsvResultSink {
    /// Open `path` according to `mode`. `CreateNew` fails with
    /// [`ProbeError::OutputExists`] when the file is already there.
    pub fn open<P: AsRef<Path>>(path: P, mode: OutputMode) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match mode {
            OutputMode::CreateNew => OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|err| match err.kind() {
                    io::ErrorKind::AlreadyExists => ProbeError::OutputExists {
                        path: path.display().to_string(),
                    },
                    _ => ProbeError::Io(err),
                })?,
            OutputMode::Overwrite => File::create(&path)?,
            OutputMode::Append => OpenOptions::new().append(true).create(true).open(&path)?,
        };
        let write_header = file.metadata()?.len() == 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);

        info!(path = %path.display(), ?mode, "Result file opened");
        Ok(Self {
            path,
            writer: Some(writer),
            written: 0,
        })
    }

}

impl ResultSink for CsvResultSink {
    fn append(&mut self, record: &ResultRecord) -> AppResult<()> {
        let writer = self.writer.as_mut().ok_or_else(sink_closed)?;
        writer.serialize(record)?;
        writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> AppResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            debug!(path = %self.path.display(), rows = self.written, "Result file closed");
        }
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.written
    }
}

impl Drop for CsvResultSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<ResultRecord>,
    closed: bool,
}

/// Keeps records in memory; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// Empty, open sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records appended so far.
    pub fn records(&self) -> Vec<ResultRecord> {
        self.lock().records.clone()
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultSink for MemorySink {
    fn append(&mut self, record: &ResultRecord) -> AppResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(sink_closed());
        }
        state.records.push(record.clone());
        Ok(())
    }

    fn close(&mut self) -> AppResult<()> {
        self.lock().closed = true;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.lock().records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    fn record(index: usize, config: &str) -> ResultRecord {
        ResultRecord {
            index,
            wafer: Some(7),
            die: Some(3),
            block: "B1".to_string(),
            material: "Pt".to_string(),
            structure: "LW300".to_string(),
            config: config.to_string(),
            current: 0.0001,
            voltage: 0.5,
            resistance: 5000.0,
        }
    }

    #[test]
    fn test_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvResultSink::open(&path, OutputMode::CreateNew).unwrap();
        sink.append(&record(0, "LW300_plus")).unwrap();
        sink.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "index,wafer,die,block,material,structure,config,current,voltage,resistance"
        );
        assert_eq!(lines[1], "0,7,3,B1,Pt,LW300,LW300_plus,0.0001,0.5,5000.0");
        assert_eq!(sink.records_written(), 1);
    }

    #[test]
    fn test_rows_are_flushed_as_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvResultSink::open(&path, OutputMode::CreateNew).unwrap();
        sink.append(&record(0, "LW300_plus")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_create_new_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "keep me\n").unwrap();

        let err = CsvResultSink::open(&path, OutputMode::CreateNew).err().unwrap();
        assert!(matches!(err, ProbeError::OutputExists { .. }));
        assert_eq!(err.kind(), ErrorKind::Output);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me\n");
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "old\n").unwrap();

        let mut sink = CsvResultSink::open(&path, OutputMode::Overwrite).unwrap();
        sink.append(&record(1, "LW300_minus")).unwrap();
        sink.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("index,"));
        assert!(!text.contains("old"));
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        for index in 0..2 {
            let mut sink = CsvResultSink::open(&path, OutputMode::Append).unwrap();
            sink.append(&record(index, "LW300_plus")).unwrap();
            sink.close().unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("index,wafer").count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_append_after_close_fails() {
        let mut sink = MemorySink::new();
        let handle = sink.clone();
        sink.append(&record(0, "LW300_plus")).unwrap();
        sink.close().unwrap();

        assert!(sink.append(&record(1, "LW300_plus")).is_err());
        assert!(handle.is_closed());
        assert_eq!(handle.records().len(), 1);
    }
}
