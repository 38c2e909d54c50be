use crate::signal::RawSample;
use std::collections::VecDeque;

/// Parameters of the adaptive threshold and peak tracker.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Relative position of the threshold between window min and max.
    pub threshold_ratio: f64,
    /// Rolling window length used for threshold estimation (samples).
    pub window_capacity: usize,
    /// Minimum window span (ADC counts) below which the signal counts as
    /// flat, i.e. no finger on the sensor.
    pub min_span: u16,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: 0.8,
            window_capacity: 250,
            min_span: 64,
        }
    }
}

impl DetectorConfig {
    /// Variant with the higher threshold ratio used by the stricter modes.
    pub fn strict() -> Self {
        Self {
            threshold_ratio: 0.9,
            ..Self::default()
        }
    }
}

/// Rolling window of recent raw samples, oldest evicted when full.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    buf: VecDeque<RawSample>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: RawSample) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn min(&self) -> Option<RawSample> {
        self.buf.iter().copied().min()
    }

    pub fn max(&self) -> Option<RawSample> {
        self.buf.iter().copied().max()
    }

    /// Peak-to-trough range of the window, 0 for a flat or empty window.
    pub fn span(&self) -> u16 {
        match (self.min(), self.max()) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0,
        }
    }
}

/// Threshold over a window: `min + ratio * (max - min)`.
///
/// For ratio in [0, 1] the result always lies between the window min and max.
/// Returns None for an empty window.
pub fn estimate_threshold(window: &SampleWindow, ratio: f64) -> Option<f64> {
    let lo = window.min()? as f64;
    let hi = window.max()? as f64;
    Some(lo + ratio * (hi - lo))
}

/// Local-maximum tracker that turns a thresholded sample stream into beat
/// events.
///
/// A beat is confirmed retroactively: once the signal has exceeded the
/// threshold and then fallen back below it, the index of the falling sample
/// is recorded and the tracker resets. Only the two most recent beats are
/// retained; older ones are not needed for interval computation.
#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    threshold: f64,
    max_value: f64,
    last: Option<u64>,
    prev: Option<u64>,
}

impl PeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly estimated threshold. Also resets the running max so
    /// a stale candidate from the old threshold cannot leak across.
    pub fn rethreshold(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.max_value = threshold;
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed one sample; returns the beat index when a peak completes.
    pub fn update(&mut self, index: u64, value: RawSample) -> Option<u64> {
        let v = value as f64;
        if v > self.max_value {
            // still rising, or a new candidate (ties do not update)
            self.max_value = v;
            None
        } else if v < self.threshold && self.max_value > self.threshold {
            self.prev = self.last;
            self.last = Some(index);
            self.max_value = self.threshold;
            Some(index)
        } else {
            None
        }
    }

    pub fn last_peak(&self) -> Option<u64> {
        self.last
    }

    /// Sample distance between the two retained beats, if both exist and are
    /// properly ordered.
    pub fn last_interval(&self) -> Option<u64> {
        match (self.prev, self.last) {
            (Some(prev), Some(last)) if last > prev => Some(last - prev),
            _ => None,
        }
    }

    /// Drop the older retained beat so the next interval needs one new beat.
    pub fn retain_latest(&mut self) {
        self.prev = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
