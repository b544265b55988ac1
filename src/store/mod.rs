//! Append-only metric log and summary snapshots.
//!
//! Each plan owns a directory under the data root:
//!
//! ```text
//! plan_<id>/metrics.jsonl          one JSON record per line
//! plan_<id>/summary.json           latest report snapshot
//! plan_<id>/summary_history/*.json one file per computed report
//! ```
//!
//! Readers tolerate corrupt lines by skipping them, and never see a line
//! whose append is still in flight.

use crate::models::{MetricRecord, PlanSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const METRICS_FILE: &str = "metrics.jsonl";
const SUMMARY_FILE: &str = "summary.json";
const HISTORY_DIR: &str = "summary_history";

/// Locations written by [`MetricStore::save_snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPaths {
    pub summary_path: PathBuf,
    pub history_path: PathBuf,
}

/// Snapshot file contents.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub summary: PlanSummary,
}

/// File-backed per-plan metric log.
#[derive(Debug, Clone)]
pub struct MetricStore {
    root: PathBuf,
}

impl MetricStore {
    /// Create a store rooted at `root`. Nothing is created until the first
    /// append.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn plan_dir(&self, plan_id: i64) -> PathBuf {
        self.root.join(format!("plan_{}", plan_id))
    }

    fn metrics_path(&self, plan_id: i64) -> PathBuf {
        self.plan_dir(plan_id).join(METRICS_FILE)
    }

    /// True once the plan has received at least one append.
    pub fn exists(&self, plan_id: i64) -> bool {
        self.plan_dir(plan_id).is_dir()
    }

    /// Append one record as a single complete line.
    ///
    /// `created_at` is stamped with the current UTC time when absent. The
    /// line is written with one call on an append-mode handle, so
    /// concurrent appends never interleave within a line. Returns the
    /// record as stored.
    pub fn append(&self, plan_id: i64, mut record: MetricRecord) -> io::Result<MetricRecord> {
        let dir = self.plan_dir(plan_id);
        fs::create_dir_all(&dir)?;

        if record.created_at.is_none() {
            record.created_at = Some(Utc::now());
        }

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(METRICS_FILE))?;
        file.write_all(&line)?;

        debug!(
            "Appended record for member {} to plan {}",
            record.member_id, plan_id
        );
        Ok(record)
    }

    /// Replay the plan's log in append order.
    ///
    /// An absent log yields an empty stream. Calling again restarts from
    /// the first line.
    pub fn stream(&self, plan_id: i64) -> RecordStream {
        let path = self.metrics_path(plan_id);
        let reader = match File::open(&path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!("Cannot open {}: {}", path.display(), e);
                }
                None
            }
        };
        RecordStream {
            reader,
            buf: String::new(),
        }
    }

    /// Overwrite the current snapshot and add one history entry.
    pub fn save_snapshot(&self, plan_id: i64, summary: &PlanSummary) -> io::Result<SnapshotPaths> {
        let dir = self.plan_dir(plan_id);
        let history_dir = dir.join(HISTORY_DIR);
        fs::create_dir_all(&history_dir)?;

        let generated_at = Utc::now();
        let snapshot = Snapshot {
            generated_at,
            summary: summary.clone(),
        };
        let content = serde_json::to_vec_pretty(&snapshot)?;

        // Replace the current snapshot atomically.
        let summary_path = dir.join(SUMMARY_FILE);
        let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
        staged.write_all(&content)?;
        staged.persist(&summary_path).map_err(|e| e.error)?;

        let (history_path, mut history_file) = create_history_file(&history_dir, generated_at)?;
        history_file.write_all(&content)?;

        info!(
            "Saved summary snapshot for plan {} ({})",
            plan_id,
            history_path.display()
        );
        Ok(SnapshotPaths {
            summary_path,
            history_path,
        })
    }
}

/// Create a new history file named after `at`, never reusing a name.
fn create_history_file(dir: &Path, at: DateTime<Utc>) -> io::Result<(PathBuf, File)> {
    let stem = at.format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}.json", stem)
        } else {
            format!("{}-{}.json", stem, attempt)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Lazy iterator over a plan's decoded records.
pub struct RecordStream {
    reader: Option<BufReader<File>>,
    buf: String,
}

impl Iterator for RecordStream {
    type Item = MetricRecord;

    fn next(&mut self) -> Option<MetricRecord> {
        let reader = self.reader.as_mut()?;
        loop {
            self.buf.clear();
            match reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    debug!("Skipping non-UTF-8 log line");
                    continue;
                }
                Err(e) => {
                    debug!("Stopping log replay: {}", e);
                    self.reader = None;
                    return None;
                }
            }

            // A line without its newline is an append still in flight.
            if !self.buf.ends_with('\n') {
                self.reader = None;
                return None;
            }

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            let decoded = serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|value| MetricRecord::from_log_value(&value));
            match decoded {
                Some(record) => return Some(record),
                None => debug!("Skipping undecodable log line"),
            }
        }
    }
}
