use crate::signal::RawSample;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited raw sensor readings, ignoring blank/comment lines.
pub fn parse_raw_series(text: &str) -> Result<Vec<RawSample>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: RawSample = trimmed
            .parse()
            .with_context(|| format!("line {} is not a raw sample: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no samples found");
    }
    Ok(out)
}

/// Read a newline-delimited raw sample series from disk.
pub fn read_raw_series(path: &Path) -> Result<Vec<RawSample>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_raw_series(&text)
}

/// Parse newline-delimited peak-to-peak intervals in milliseconds.
pub fn parse_ppi_ms(text: &str) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: u32 = trimmed
            .parse()
            .with_context(|| format!("line {} is not an interval in ms: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no intervals found");
    }
    Ok(out)
}

/// Read an interval list from disk.
pub fn read_ppi_ms(path: &Path) -> Result<Vec<u32>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_ppi_ms(&text)
}
