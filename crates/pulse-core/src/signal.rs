use serde::{Deserialize, Serialize};

/// Raw ADC reading from the pulse sensor.
pub type RawSample = u16;

/// Fixed sampling period of the sensor timer (4 ms per sample).
pub const SAMPLE_PERIOD_S: f64 = 0.004;

/// A recorded PPG waveform with its sampling frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpgSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Raw sensor readings
    pub data: Vec<RawSample>,
}

impl PpgSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
}

/// Confirmed beat positions as sample indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Beats {
    pub indices: Vec<u64>,
}

impl Beats {
    pub fn from_indices(indices: Vec<u64>) -> Self {
        Self { indices }
    }
}

/// Valid peak-to-peak intervals in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PpiSeries {
    pub ms: Vec<u32>,
}

impl PpiSeries {
    pub fn from_ms(ms: Vec<u32>) -> Self {
        Self { ms }
    }
    pub fn push(&mut self, interval_ms: u32) {
        self.ms.push(interval_ms);
    }
    pub fn len(&self) -> usize {
        self.ms.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ms.is_empty()
    }
    pub fn clear(&mut self) {
        self.ms.clear();
    }
}

/// Session-level HRV summary. Fields are truncated integers to match the
/// coarse precision of the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrvSummary {
    pub mean_hr: u32,
    pub mean_ppi: u32,
    pub rmssd: u32,
    pub sdnn: u32,
}
