//! Append-only JSON-lines run log.
//!
//! Every completed run becomes exactly one line in the log: a compact JSON
//! [`RunRecord`] terminated by `\n`. The log is the only durable artifact;
//! summaries are always recomputed from it.
//!
//! **Access rules:**
//! - Single writer per log file. There is no locking.
//! - The file is opened per append and closed right after, so no handle is
//!   held across upstream queries.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use brandlens_shared::{BrandLensError, Result, RunRecord};
use tracing::{debug, warn};

/// Destination for completed runs.
pub trait RunSink {
    /// Durably record one run.
    fn append(&mut self, record: &RunRecord) -> Result<()>;
}

impl<S: RunSink + ?Sized> RunSink for &mut S {
    fn append(&mut self, record: &RunRecord) -> Result<()> {
        (**self).append(record)
    }
}

/// In-memory sink, handy for tests and dry runs.
impl RunSink for Vec<RunRecord> {
    fn append(&mut self, record: &RunRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// A JSON-lines log file on disk.
#[derive(Debug, Clone)]
pub struct JsonlLog {
    path: PathBuf,
}

impl JsonlLog {
    /// Point at `path`. Nothing is created until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back, in file order.
    ///
    /// A missing file reads as an empty log. Blank lines are ignored, and
    /// lines that fail to decode are skipped with a warning so one torn
    /// write does not hide the rest of the history.
    pub fn read_records(&self) -> Result<Vec<RunRecord>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "run log not found, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(BrandLensError::io(&self.path, e)),
        };

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| BrandLensError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RunRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping malformed run log line"
                    );
                }
            }
        }

        debug!(path = %self.path.display(), count = records.len(), "read run log");
        Ok(records)
    }
}

impl RunSink for JsonlLog {
    fn append(&mut self, record: &RunRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| BrandLensError::io(parent, e))?;
            }
        }

        let mut line = serde_json::to_string(record)
            .map_err(|e| BrandLensError::Storage(format!("failed to encode run record: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BrandLensError::io(&self.path, e))?;

        file.write_all(line.as_bytes())
            .map_err(|e| BrandLensError::io(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            prompt = %record.prompt,
            run_index = record.run_index,
            "appended run record"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
