use crate::detect::PeakDetector;
use crate::signal::PpiSeries;

/// Physiologically plausible heart rate band, exclusive at both ends.
#[derive(Debug, Clone, Copy)]
pub struct HrBand {
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for HrBand {
    fn default() -> Self {
        Self {
            min_bpm: 30.0,
            max_bpm: 200.0,
        }
    }
}

impl HrBand {
    /// Narrow resting-rate band used by the stricter modes.
    pub fn strict() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 100.0,
        }
    }

    pub fn accepts(&self, bpm: f64) -> bool {
        bpm > self.min_bpm && bpm < self.max_bpm
    }
}

/// Converts peak distances into instantaneous heart rate and accumulates the
/// accepted values for the session.
///
/// Out-of-band rates are discarded without a trace; only accepted intervals
/// ever reach the HR and PPI series.
#[derive(Debug, Clone)]
pub struct HrCalculator {
    band: HrBand,
    sample_period_s: f64,
    hr: Vec<f64>,
    ppi: PpiSeries,
}

impl HrCalculator {
    pub fn new(band: HrBand, sample_period_s: f64) -> Self {
        Self {
            band,
            sample_period_s,
            hr: Vec::new(),
            ppi: PpiSeries::default(),
        }
    }

    /// Run one cadence step against the detector's retained beats.
    ///
    /// On acceptance the older beat is dropped, so the next interval needs
    /// one new beat rather than two, and the truncated BPM is returned.
    pub fn update(&mut self, detector: &mut PeakDetector, track_ppi: bool) -> Option<u32> {
        let distance = detector.last_interval()?;
        if distance == 0 {
            // detector anomaly (e.g. a reset racing a beat); skip the cycle
            return None;
        }
        let ppi_s = distance as f64 * self.sample_period_s;
        let bpm = 60.0 / ppi_s;
        if !self.band.accepts(bpm) {
            return None;
        }
        self.hr.push(bpm);
        if track_ppi {
            self.ppi.push((ppi_s * 1000.0) as u32);
        }
        detector.retain_latest();
        Some(bpm as u32)
    }

    pub fn hr_values(&self) -> &[f64] {
        &self.hr
    }

    pub fn ppi(&self) -> &PpiSeries {
        &self.ppi
    }

    pub fn clear(&mut self) {
        self.hr.clear();
        self.ppi.clear();
    }
}
