use crate::cloud::AnalysisRequest;
use crate::detect::{estimate_threshold, DetectorConfig, PeakDetector, SampleWindow};
use crate::hr::{HrBand, HrCalculator};
use crate::metrics::hrv;
use crate::signal::{HrvSummary, PpiSeries, RawSample, SAMPLE_PERIOD_S};
use log::debug;
use serde::{Deserialize, Serialize};

/// Acquisition phases of a measurement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No session running; incoming samples are ignored.
    Idle,
    /// Sensor settling; samples are counted and discarded.
    WarmingUp,
    /// Rolling window filling up towards the first threshold estimate.
    Calibrating,
    /// Steady state: peak detection, periodic rethreshold and HR cadence.
    Detecting,
    /// Result produced; sampling should stop.
    Reporting,
}

/// Which downstream computation runs while detecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureMode {
    /// Live heart rate only, runs until stopped.
    Hr,
    /// Accumulate intervals and report local HRV statistics once.
    Hrv,
    /// Accumulate intervals and hand them to the analysis collaborator.
    Cloud,
}

impl MeasureMode {
    pub fn tracks_ppi(&self) -> bool {
        !matches!(self, MeasureMode::Hr)
    }
}

/// Session schedule and detection parameters.
///
/// Defaults mirror the device firmware: 4 ms sampling, the first 1000
/// samples discarded as settling noise, detection from sample 1250 with a
/// rethreshold every 125 samples, an HR calculation every 500 samples, and
/// a 35 s (8750 sample) collection window for the HRV modes.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionConfig {
    pub sample_period_s: f64,
    pub warmup_samples: u64,
    pub detection_start: u64,
    pub rethreshold_every: u64,
    pub hr_every: u64,
    pub hrv_window_samples: u64,
    /// Minimum interval count before a cloud request is worth sending.
    pub min_cloud_ppis: usize,
    pub band: HrBand,
    pub detector: DetectorConfig,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_period_s: SAMPLE_PERIOD_S,
            warmup_samples: 1000,
            detection_start: 1250,
            rethreshold_every: 125,
            hr_every: 500,
            hrv_window_samples: 8750,
            min_cloud_ppis: 16,
            band: HrBand::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Observable outcome of feeding one sample (or a start/stop transition).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    /// A beat was confirmed at this sample index.
    Beat(u64),
    /// A fresh accepted instantaneous heart rate, truncated BPM.
    HrUpdate(u32),
    /// The threshold window went flat; likely no finger on the sensor.
    NoSignal,
    HrvReady(HrvSummary),
    CloudRequest(AnalysisRequest),
    /// The periodic producer should be deactivated.
    SamplingDone,
}

/// One measurement session: owns the sample counter, threshold window, peak
/// retention and the accumulated HR/PPI series. The state machine advances
/// on sample counts only; stopping is always an explicit external event.
#[derive(Debug)]
pub struct Session {
    config: AcquisitionConfig,
    phase: Phase,
    mode: MeasureMode,
    count: u64,
    window: SampleWindow,
    detector: PeakDetector,
    calc: HrCalculator,
    next_request_id: u32,
}

impl Session {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            mode: MeasureMode::Hr,
            count: 0,
            window: SampleWindow::new(config.detector.window_capacity),
            detector: PeakDetector::new(),
            calc: HrCalculator::new(config.band, config.sample_period_s),
            next_request_id: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> MeasureMode {
        self.mode
    }

    pub fn sample_count(&self) -> u64 {
        self.count
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn hr_values(&self) -> &[f64] {
        self.calc.hr_values()
    }

    pub fn ppi(&self) -> &PpiSeries {
        self.calc.ppi()
    }

    /// Begin a fresh session. All per-session state starts from empty; the
    /// mode is fixed for the lifetime of the session.
    pub fn start(&mut self, mode: MeasureMode) -> Vec<SessionEvent> {
        self.reset();
        self.mode = mode;
        self.phase = Phase::WarmingUp;
        vec![SessionEvent::PhaseChanged(Phase::WarmingUp)]
    }

    /// Cooperative stop from any phase: clears the counter, window, retained
    /// beats and both series, and asks for the producer to be deactivated.
    pub fn stop(&mut self) -> Vec<SessionEvent> {
        self.reset();
        self.phase = Phase::Idle;
        vec![
            SessionEvent::PhaseChanged(Phase::Idle),
            SessionEvent::SamplingDone,
        ]
    }

    fn reset(&mut self) {
        self.count = 0;
        self.window.clear();
        self.detector.reset();
        self.calc = HrCalculator::new(self.config.band, self.config.sample_period_s);
    }

    /// Feed one raw sample through the phase schedule.
    pub fn handle_sample(&mut self, raw: RawSample) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.phase == Phase::Idle || self.phase == Phase::Reporting {
            return events;
        }
        self.count += 1;

        if self.phase == Phase::WarmingUp {
            if self.count >= self.config.warmup_samples {
                self.set_phase(Phase::Calibrating, &mut events);
            }
            return events;
        }

        self.window.push(raw);
        if self.count < self.config.detection_start {
            return events;
        }

        if (self.count - self.config.detection_start) % self.config.rethreshold_every == 0 {
            self.rethreshold(&mut events);
        }
        if self.phase == Phase::Calibrating {
            self.set_phase(Phase::Detecting, &mut events);
        }

        if let Some(index) = self.detector.update(self.count, raw) {
            events.push(SessionEvent::Beat(index));
        }
        if self.count % self.config.hr_every == 0 {
            if let Some(bpm) = self.calc.update(&mut self.detector, self.mode.tracks_ppi()) {
                events.push(SessionEvent::HrUpdate(bpm));
            }
        }
        if self.count > self.config.hrv_window_samples {
            self.finish_window(&mut events);
        }
        events
    }

    fn rethreshold(&mut self, events: &mut Vec<SessionEvent>) {
        if self.window.span() < self.config.detector.min_span {
            // flat line; keep the previous threshold rather than locking the
            // detector onto noise
            debug!(
                "window span {} under {}, signal looks flat",
                self.window.span(),
                self.config.detector.min_span
            );
            events.push(SessionEvent::NoSignal);
            return;
        }
        if let Some(threshold) = estimate_threshold(&self.window, self.config.detector.threshold_ratio)
        {
            self.detector.rethreshold(threshold);
        }
    }

    fn finish_window(&mut self, events: &mut Vec<SessionEvent>) {
        match self.mode {
            MeasureMode::Hr => {}
            MeasureMode::Hrv => match hrv::summarize(self.calc.hr_values(), self.calc.ppi()) {
                Ok(summary) => {
                    events.push(SessionEvent::HrvReady(summary));
                    self.enter_reporting(events);
                }
                Err(err) => debug!("hrv summary not ready: {err}"),
            },
            MeasureMode::Cloud => {
                if self.calc.ppi().len() >= self.config.min_cloud_ppis {
                    let request = AnalysisRequest::readiness(
                        self.next_request_id,
                        self.calc.ppi().ms.clone(),
                    );
                    self.next_request_id += 1;
                    events.push(SessionEvent::CloudRequest(request));
                    self.enter_reporting(events);
                }
            }
        }
    }

    fn enter_reporting(&mut self, events: &mut Vec<SessionEvent>) {
        self.set_phase(Phase::Reporting, events);
        events.push(SessionEvent::SamplingDone);
    }

    fn set_phase(&mut self, phase: Phase, events: &mut Vec<SessionEvent>) {
        self.phase = phase;
        events.push(SessionEvent::PhaseChanged(phase));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compressed schedule so tests stay readable: warm up for 10 samples,
    /// detect from 20, rethreshold every 10, HR cadence 50, window 400.
    fn test_config() -> AcquisitionConfig {
        AcquisitionConfig {
            warmup_samples: 10,
            detection_start: 20,
            rethreshold_every: 10,
            hr_every: 50,
            hrv_window_samples: 400,
            min_cloud_ppis: 2,
            detector: DetectorConfig {
                window_capacity: 20,
                ..DetectorConfig::default()
            },
            ..AcquisitionConfig::default()
        }
    }

    /// Square-ish pulse train: baseline 1000, a 3-sample spike to 3000 every
    /// `period` samples. Plenty of span for the 0.8 threshold.
    fn pulse(i: u64, period: u64) -> RawSample {
        if i % period < 3 {
            3000
        } else {
            1000
        }
    }

    fn drain(session: &mut Session, samples: impl Iterator<Item = RawSample>) -> Vec<SessionEvent> {
        let mut all = Vec::new();
        for raw in samples {
            all.extend(session.handle_sample(raw));
        }
        all
    }

    #[test]
    fn default_schedule_matches_device_firmware() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.sample_period_s, 0.004);
        assert_eq!(config.warmup_samples, 1000);
        assert_eq!(config.detection_start, 1250);
        assert_eq!(config.rethreshold_every, 125);
        assert_eq!(config.hr_every, 500);
        assert_eq!(config.hrv_window_samples, 8750);
    }

    #[test]
    fn warmup_discards_samples_without_detection() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hr);
        let events = drain(&mut session, (0..9).map(|i| pulse(i, 5)));
        assert!(events.is_empty());
        assert_eq!(session.phase(), Phase::WarmingUp);
        assert_eq!(session.sample_count(), 9);
    }

    #[test]
    fn phases_advance_on_sample_counts() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hr);
        let events = drain(&mut session, (0..10).map(|i| pulse(i, 5)));
        assert!(events.contains(&SessionEvent::PhaseChanged(Phase::Calibrating)));
        let events = drain(&mut session, (10..20).map(|i| pulse(i, 5)));
        assert!(events.contains(&SessionEvent::PhaseChanged(Phase::Detecting)));
        assert_eq!(session.phase(), Phase::Detecting);
    }

    #[test]
    fn idle_session_ignores_samples() {
        let mut session = Session::new(test_config());
        assert!(session.handle_sample(2000).is_empty());
        assert_eq!(session.sample_count(), 0);
    }

    #[test]
    fn detects_beats_and_reports_hr() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hr);
        // 200-sample period at 4 ms = 0.8 s = 75 BPM
        let events = drain(&mut session, (0..1200).map(|i| pulse(i, 200)));
        let beats: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Beat(_)))
            .collect();
        assert!(beats.len() >= 4, "expected beats, got {beats:?}");
        assert!(events.contains(&SessionEvent::HrUpdate(75)));
        // HR-only mode never reports and never stops on its own
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::HrvReady(_))));
        assert!(!events.contains(&SessionEvent::SamplingDone));
        assert_eq!(session.phase(), Phase::Detecting);
        assert!(session.ppi().is_empty());
    }

    #[test]
    fn beat_indices_are_strictly_increasing() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hrv);
        let events = drain(&mut session, (0..1000).map(|i| pulse(i, 150)));
        let indices: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Beat(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]), "{indices:?}");
    }

    #[test]
    fn hrv_mode_reports_once_after_window_and_stops_sampling() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hrv);
        let events = drain(&mut session, (0..600).map(|i| pulse(i, 100)));
        let summaries: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::HrvReady(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(summaries.len(), 1);
        // 100 samples at 4 ms = 400 ms intervals = 150 BPM
        assert_eq!(summaries[0].mean_ppi, 400);
        assert_eq!(summaries[0].mean_hr, 150);
        assert_eq!(summaries[0].rmssd, 0);
        assert_eq!(summaries[0].sdnn, 0);
        assert!(events.contains(&SessionEvent::SamplingDone));
        assert_eq!(session.phase(), Phase::Reporting);
        // once reporting, further samples are ignored
        assert!(session.handle_sample(3000).is_empty());
    }

    #[test]
    fn hrv_report_waits_for_enough_intervals() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hrv);
        // flat-ish signal with no detectable beats: window passes but the
        // PPI series stays empty, so no report and no stop
        let events = drain(&mut session, (0..500).map(|i| pulse(i, 1000)));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::HrvReady(_))));
        assert_ne!(session.phase(), Phase::Reporting);
    }

    #[test]
    fn cloud_mode_emits_request_with_recorded_intervals() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Cloud);
        let events = drain(&mut session, (0..600).map(|i| pulse(i, 100)));
        let request = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::CloudRequest(r) => Some(r.clone()),
                _ => None,
            })
            .expect("cloud request should be emitted");
        assert_eq!(request.kind, "RRI");
        assert!(request.data.iter().all(|&ms| ms == 400));
        assert!(request.data.len() >= 2);
        assert!(events.contains(&SessionEvent::SamplingDone));
        assert_eq!(session.phase(), Phase::Reporting);
    }

    #[test]
    fn flat_signal_reports_no_signal_instead_of_stalling() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hr);
        let events = drain(&mut session, (0..100).map(|_| 2000));
        assert!(events.contains(&SessionEvent::NoSignal));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::Beat(_))));
    }

    #[test]
    fn stop_mid_detection_clears_all_session_state() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hrv);
        drain(&mut session, (0..300).map(|i| pulse(i, 100)));
        assert!(!session.ppi().is_empty());
        assert!(session.sample_count() > 0);

        let events = session.stop();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(events.contains(&SessionEvent::SamplingDone));
        assert_eq!(session.sample_count(), 0);
        assert!(session.ppi().is_empty());
        assert!(session.hr_values().is_empty());

        // restart begins from a clean slate with no carry-over
        session.start(MeasureMode::Hr);
        let events = drain(&mut session, (0..30).map(|i| pulse(i, 100)));
        assert_eq!(session.sample_count(), 30);
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::HrUpdate(_))));
    }

    #[test]
    fn restart_switches_mode_cleanly() {
        let mut session = Session::new(test_config());
        session.start(MeasureMode::Hrv);
        drain(&mut session, (0..300).map(|i| pulse(i, 100)));
        session.stop();
        session.start(MeasureMode::Hr);
        assert_eq!(session.mode(), MeasureMode::Hr);
        drain(&mut session, (0..300).map(|i| pulse(i, 100)));
        // HR mode does not track intervals
        assert!(session.ppi().is_empty());
    }
}
