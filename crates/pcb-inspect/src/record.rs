//! Inspection history: one record per completed inspection.
//!
//! The pipeline only produces a defect count; the sink derives pass/fail
//! from it and stamps the record with an id and local time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InspectionStatus {
    Pass,
    Fail,
}

impl InspectionStatus {
    /// `Pass` exactly when no defect was found.
    pub fn from_defect_count(defect_count: usize) -> Self {
        if defect_count == 0 {
            InspectionStatus::Pass
        } else {
            InspectionStatus::Fail
        }
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            InspectionStatus::Pass => "PASS",
            InspectionStatus::Fail => "FAIL",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub id: u64,
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub filename: String,
    pub defect_count: usize,
    pub status: InspectionStatus,
}

impl InspectionRecord {
    fn stamped(id: u64, filename: &str, defect_count: usize) -> Self {
        Self {
            id,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            filename: filename.to_owned(),
            defect_count,
            status: InspectionStatus::from_defect_count(defect_count),
        }
    }
}

/// Destination for inspection records.
pub trait InspectionSink {
    /// Store one record for `filename` and return it.
    fn append(
        &mut self,
        filename: &str,
        defect_count: usize,
    ) -> Result<InspectionRecord, RecordError>;

    /// All records, newest first.
    fn records(&self) -> Result<Vec<InspectionRecord>, RecordError>;
}

/// Records kept in memory for the lifetime of the value.
#[derive(Clone, Debug, Default)]
pub struct MemoryLog {
    records: Vec<InspectionRecord>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InspectionSink for MemoryLog {
    fn append(
        &mut self,
        filename: &str,
        defect_count: usize,
    ) -> Result<InspectionRecord, RecordError> {
        let id = self.records.last().map_or(1, |r| r.id + 1);
        let record = InspectionRecord::stamped(id, filename, defect_count);
        self.records.push(record.clone());
        Ok(record)
    }

    fn records(&self) -> Result<Vec<InspectionRecord>, RecordError> {
        Ok(self.records.iter().rev().cloned().collect())
    }
}

/// Append-only log file with one JSON record per line.
#[derive(Clone, Debug)]
pub struct JsonLinesLog {
    path: PathBuf,
}

impl JsonLinesLog {
    /// Use `path`; the file is created on the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<InspectionRecord>, RecordError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        raw.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| {
                serde_json::from_str(l).map_err(|source| RecordError::Parse {
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }
}

impl InspectionSink for JsonLinesLog {
    fn append(
        &mut self,
        filename: &str,
        defect_count: usize,
    ) -> Result<InspectionRecord, RecordError> {
        let id = self
            .read_all()?
            .iter()
            .map(|r| r.id)
            .max()
            .map_or(1, |m| m + 1);
        let record = InspectionRecord::stamped(id, filename, defect_count);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        log::debug!(
            "record: #{} {} -> {} ({})",
            record.id,
            record.filename,
            record.status,
            self.path.display()
        );
        Ok(record)
    }

    fn records(&self) -> Result<Vec<InspectionRecord>, RecordError> {
        let mut records = self.read_all()?;
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }
}

/// Aggregate quality figures over a set of records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Share of passing inspections, percent, rounded down.
    pub pass_rate_percent: u32,
    pub total_defects: usize,
    pub mean_defects: f64,
    pub max_defects: usize,
    /// Population standard deviation of the defect count.
    pub std_defects: f64,
}

impl LogSummary {
    pub fn from_records(records: &[InspectionRecord]) -> Self {
        let total = records.len();
        if total == 0 {
            return Self::default();
        }
        let passed = records
            .iter()
            .filter(|r| r.status == InspectionStatus::Pass)
            .count();
        let total_defects: usize = records.iter().map(|r| r.defect_count).sum();
        let mean = total_defects as f64 / total as f64;
        let var = records
            .iter()
            .map(|r| {
                let d = r.defect_count as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / total as f64;
        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate_percent: (passed * 100 / total) as u32,
            total_defects,
            mean_defects: mean,
            max_defects: records.iter().map(|r| r.defect_count).max().unwrap_or(0),
            std_defects: var.sqrt(),
        }
    }
}
