//! Cycle statistics and pluggable sinks
//!
//! Every adaptive green entry produces a [`CycleRecord`]. The orchestrator
//! forwards records to a [`StatsSink`]; the CSV sink appends to a log file
//! so repeated runs accumulate in one place.

use anyhow::{Context, Result};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::path::Path;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::types::Axis;

/// One adaptive green entry, as written to the statistics log
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub cycle_number: u32,
    pub axis: Axis,
    /// Demand total the green duration was computed from
    pub total_demand: u32,
    /// Green duration granted for this entry, seconds
    pub green_duration: u32,
    /// Mean green duration served on this axis so far, seconds
    pub mean_green_duration: f32,
    /// Mean demand total observed on this axis so far
    pub mean_demand: f32,
    /// Unix timestamp of the entry
    pub timestamp: u64,
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Destination for cycle records
pub trait StatsSink {
    fn record_cycle(&mut self, record: &CycleRecord) -> Result<()>;
}

/// Discards every record
#[derive(Debug, Default)]
pub struct NullSink;

impl StatsSink for NullSink {
    fn record_cycle(&mut self, _record: &CycleRecord) -> Result<()> {
        Ok(())
    }
}

/// Appends records to a CSV file, writing the header only when the file is
/// created fresh
pub struct CsvSink {
    writer: csv::Writer<std::fs::File>,
}

impl CsvSink {
    pub fn open(path: &Path) -> Result<Self> {
        let exists = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open stats file {}", path.display()))?;
        let writer = csv::WriterBuilder::new()
            .has_headers(!exists)
            .from_writer(file);
        Ok(Self { writer })
    }
}

impl StatsSink for CsvSink {
    fn record_cycle(&mut self, record: &CycleRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .context("failed to serialize cycle record")?;
        self.writer.flush().context("failed to flush stats file")?;
        Ok(())
    }
}

/// Keeps records in memory behind a shared handle, for inspection in tests
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<CycleRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone-shared handle to the collected records
    pub fn records(&self) -> Rc<RefCell<Vec<CycleRecord>>> {
        Rc::clone(&self.records)
    }
}

impl StatsSink for MemorySink {
    fn record_cycle(&mut self, record: &CycleRecord) -> Result<()> {
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}
