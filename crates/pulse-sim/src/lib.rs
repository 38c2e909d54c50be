use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use pulse_core::cloud::{AnalysisClient, AnalysisRequest, AnalysisResponse};
use pulse_core::signal::{PpgSeries, RawSample};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Synthetic PPG recording parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SimSpec {
    #[serde(default = "default_duration")]
    pub duration_s: f64,
    #[serde(default = "default_fs")]
    pub fs: f64,
    #[serde(default = "default_mean_hr")]
    pub mean_hr_bpm: f64,
    #[serde(default = "default_jitter")]
    pub hr_jitter_bpm: f64,
    #[serde(default = "default_baseline")]
    pub baseline: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default = "default_noise")]
    pub noise: f64,
    #[serde(default)]
    pub seed: u64,
}

fn default_duration() -> f64 {
    45.0
}
fn default_fs() -> f64 {
    250.0
}
fn default_mean_hr() -> f64 {
    72.0
}
fn default_jitter() -> f64 {
    3.0
}
fn default_baseline() -> f64 {
    33000.0
}
fn default_amplitude() -> f64 {
    9000.0
}
fn default_noise() -> f64 {
    300.0
}

impl Default for SimSpec {
    fn default() -> Self {
        Self {
            duration_s: default_duration(),
            fs: default_fs(),
            mean_hr_bpm: default_mean_hr(),
            hr_jitter_bpm: default_jitter(),
            baseline: default_baseline(),
            amplitude: default_amplitude(),
            noise: default_noise(),
            seed: 0,
        }
    }
}

pub fn read_spec(path: &Path) -> Result<SimSpec> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read spec {}", path.display()))?;
    let spec: SimSpec =
        toml::from_str(&contents).with_context(|| format!("parsing spec {}", path.display()))?;
    Ok(spec)
}

/// Generate a pulse train: Gaussian-shaped beats over a noisy baseline, beat
/// spacing jittered around the configured mean rate. Deterministic for a
/// fixed seed.
pub fn generate(spec: &SimSpec) -> PpgSeries {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let mut beats = Vec::new();
    let mut t = 0.5;
    while t < spec.duration_s {
        beats.push(t);
        let bpm = if spec.hr_jitter_bpm > 0.0 {
            spec.mean_hr_bpm + rng.gen_range(-spec.hr_jitter_bpm..=spec.hr_jitter_bpm)
        } else {
            spec.mean_hr_bpm
        };
        t += 60.0 / bpm.max(1.0);
    }

    let width = 0.05;
    let samples = (spec.duration_s * spec.fs) as usize;
    let mut data = Vec::with_capacity(samples);
    let mut beat_idx = 0usize;
    for i in 0..samples {
        let time = i as f64 / spec.fs;
        while beat_idx + 1 < beats.len() && beats[beat_idx] < time - 4.0 * width {
            beat_idx += 1;
        }
        let mut v = spec.baseline;
        for &bt in beats[beat_idx..].iter().take(3) {
            let arg = (time - bt) / width;
            v += spec.amplitude * (-0.5 * arg * arg).exp();
        }
        if spec.noise > 0.0 {
            v += rng.gen_range(-spec.noise..=spec.noise);
        }
        data.push(v.clamp(0.0, u16::MAX as f64) as RawSample);
    }
    PpgSeries { fs: spec.fs, data }
}

/// Write a recording as single-column CSV.
pub fn write_recording(path: &Path, series: &PpgSeries) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating recording {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record(["sample"])?;
    for &value in &series.data {
        writer.write_record([value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a single-column CSV recording. The sampling rate is not stored in
/// the file and must be supplied.
pub fn read_recording(path: &Path, fs_hz: f64) -> Result<PpgSeries> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening recording {}", path.display()))?;
    let mut data = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("reading recording row {}", idx + 1))?;
        let field = row
            .get(0)
            .with_context(|| format!("recording row {} is empty", idx + 1))?;
        let value: RawSample = field
            .parse()
            .with_context(|| format!("recording row {} is not a sample: {}", idx + 1, field))?;
        data.push(value);
    }
    Ok(PpgSeries { fs: fs_hz, data })
}

/// Stand-in analysis collaborator: computes the response locally from the
/// submitted intervals and delivers it on the next poll. The PNS/SNS indices
/// are coarse z-score-like values around typical resting ranges, not a
/// clinical model.
#[derive(Debug, Default)]
pub struct LocalAnalysis {
    pending: Option<AnalysisResponse>,
}

impl LocalAnalysis {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisClient for LocalAnalysis {
    fn submit(&mut self, request: &AnalysisRequest) -> Result<()> {
        let n = request.data.len();
        if n < 2 {
            anyhow::bail!("analysis needs at least 2 intervals, got {n}");
        }
        let mean_rr_ms = request.data.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let rmssd_ms = {
            let sum_sq: f64 = request
                .data
                .windows(2)
                .map(|w| {
                    let d = w[1] as f64 - w[0] as f64;
                    d * d
                })
                .sum();
            (sum_sq / (n - 1) as f64).sqrt()
        };
        let sdnn_ms = {
            let sum_sq: f64 = request
                .data
                .iter()
                .map(|&v| {
                    let d = v as f64 - mean_rr_ms;
                    d * d
                })
                .sum();
            (sum_sq / n as f64).sqrt()
        };
        let mean_hr_bpm = 60_000.0 / mean_rr_ms;
        let pns_index = ((rmssd_ms - 35.0) / 25.0).clamp(-3.0, 3.0);
        let sns_index = ((mean_hr_bpm - 75.0) / 15.0).clamp(-3.0, 3.0);
        self.pending = Some(AnalysisResponse {
            mean_hr_bpm,
            mean_rr_ms,
            rmssd_ms,
            sdnn_ms,
            pns_index,
            sns_index,
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<AnalysisResponse> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::offline::run_offline;
    use pulse_core::session::{AcquisitionConfig, MeasureMode};
    use tempfile::tempdir;

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let spec = SimSpec {
            seed: 42,
            duration_s: 5.0,
            ..SimSpec::default()
        };
        let a = generate(&spec);
        let b = generate(&spec);
        assert_eq!(a.data, b.data);
        assert_eq!(a.len(), (5.0 * spec.fs) as usize);
    }

    #[test]
    fn different_seeds_differ() {
        let base = SimSpec {
            duration_s: 5.0,
            ..SimSpec::default()
        };
        let a = generate(&SimSpec { seed: 1, ..base.clone() });
        let b = generate(&SimSpec { seed: 2, ..base });
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn generated_waveform_is_detectable_end_to_end() {
        let spec = SimSpec {
            seed: 7,
            ..SimSpec::default()
        };
        let series = generate(&spec);
        let result = run_offline(&series, MeasureMode::Hrv, AcquisitionConfig::default());
        let summary = result.summary.expect("summary from synthetic recording");
        assert!(
            summary.mean_hr >= 65 && summary.mean_hr <= 80,
            "mean hr {} out of expected range",
            summary.mean_hr
        );
        assert!(summary.mean_ppi >= 750 && summary.mean_ppi <= 920);
    }

    #[test]
    fn recording_round_trips_through_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.csv");
        let spec = SimSpec {
            duration_s: 2.0,
            seed: 3,
            ..SimSpec::default()
        };
        let series = generate(&spec);
        write_recording(&path, &series).unwrap();
        let back = read_recording(&path, spec.fs).unwrap();
        assert_eq!(back.data, series.data);
        assert_eq!(back.fs, spec.fs);
    }

    #[test]
    fn spec_parses_from_toml_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spec.toml");
        std::fs::write(&path, "mean_hr_bpm = 80.0\nseed = 9\n").unwrap();
        let spec = read_spec(&path).unwrap();
        assert_eq!(spec.mean_hr_bpm, 80.0);
        assert_eq!(spec.seed, 9);
        assert_eq!(spec.fs, 250.0);
    }

    #[test]
    fn local_analysis_responds_only_after_submit() {
        let mut client = LocalAnalysis::new();
        assert!(client.poll().is_none());
        let request = AnalysisRequest::readiness(1, vec![800, 820, 780]);
        client.submit(&request).unwrap();
        let response = client.poll().expect("response after submit");
        assert!((response.mean_rr_ms - 800.0).abs() < 1e-9);
        assert!((response.rmssd_ms - 1000f64.sqrt()).abs() < 1e-9);
        assert!(response.mean_hr_bpm > 74.0 && response.mean_hr_bpm < 76.0);
        // consumed
        assert!(client.poll().is_none());
    }

    #[test]
    fn local_analysis_rejects_degenerate_datasets() {
        let mut client = LocalAnalysis::new();
        let request = AnalysisRequest::readiness(1, vec![800]);
        assert!(client.submit(&request).is_err());
        assert!(client.poll().is_none());
    }
}
