use crate::signal::HrvSummary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One completed measurement, as persisted in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// "basic_hrv" or "cloud"
    pub mode: String,
    pub timestamp_unix: u64,
    #[serde(flatten)]
    pub summary: HrvSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sns: Option<String>,
}

impl HistoryEntry {
    pub fn new(mode: impl Into<String>, summary: HrvSummary) -> Self {
        let timestamp_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            mode: mode.into(),
            timestamp_unix,
            summary,
            pns: None,
            sns: None,
        }
    }

    pub fn with_indices(mut self, pns: String, sns: String) -> Self {
        self.pns = Some(pns);
        self.sns = Some(sns);
        self
    }
}

/// JSON-lines store of completed measurements, trimmed to a fixed capacity
/// with the oldest entries evicted.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    capacity: usize,
}

impl HistoryStore {
    pub const DEFAULT_CAPACITY: usize = 3;

    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Self::DEFAULT_CAPACITY)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.push(entry.clone());
        let keep = entries.len().saturating_sub(self.capacity);
        let entries = &entries[keep..];
        let mut out = String::new();
        for entry in entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        fs::write(&self.path, out)
            .with_context(|| format!("writing history {}", self.path.display()))?;
        Ok(())
    }

    /// Up to `n` entries, newest first. A missing file is an empty history.
    pub fn recent(&self, n: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(n);
        Ok(entries)
    }

    fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading history {}", self.path.display()))
            }
        };
        let mut entries = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: HistoryEntry = serde_json::from_str(line)
                .with_context(|| format!("parsing history line {}", idx + 1))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
