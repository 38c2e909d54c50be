use crate::cloud::AnalysisRequest;
use crate::session::{AcquisitionConfig, MeasureMode, Session, SessionEvent};
use crate::signal::{Beats, HrvSummary, PpgSeries, PpiSeries};
use serde::Serialize;

/// Everything a batch run over a recording produced.
#[derive(Debug, Clone, Serialize)]
pub struct OfflineResult {
    pub sample_count: usize,
    pub beats: Beats,
    /// Accepted instantaneous heart rates, truncated BPM, in order.
    pub hr: Vec<u32>,
    pub ppi: PpiSeries,
    pub summary: Option<HrvSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AnalysisRequest>,
    /// Rethreshold cycles that saw a flat signal.
    pub no_signal_cycles: u32,
}

/// Drive the full warm-up/calibrate/detect schedule over a recording.
///
/// The session machinery is the same one the live device runs; the recording
/// simply stands in for the sample queue. Sampling stops early when the
/// session reports, exactly as the live timer would be deactivated.
pub fn run_offline(
    series: &PpgSeries,
    mode: MeasureMode,
    config: AcquisitionConfig,
) -> OfflineResult {
    let mut session = Session::new(config);
    session.start(mode);

    let mut beats = Vec::new();
    let mut hr = Vec::new();
    let mut summary = None;
    let mut request = None;
    let mut no_signal_cycles = 0u32;
    let mut processed = 0usize;

    'feed: for &raw in &series.data {
        processed += 1;
        for event in session.handle_sample(raw) {
            match event {
                SessionEvent::Beat(index) => beats.push(index),
                SessionEvent::HrUpdate(bpm) => hr.push(bpm),
                SessionEvent::HrvReady(s) => summary = Some(s),
                SessionEvent::CloudRequest(r) => request = Some(r),
                SessionEvent::NoSignal => no_signal_cycles += 1,
                SessionEvent::SamplingDone => break 'feed,
                SessionEvent::PhaseChanged(_) => {}
            }
        }
    }

    OfflineResult {
        sample_count: processed,
        beats: Beats::from_indices(beats),
        hr,
        ppi: session.ppi().clone(),
        summary,
        request,
        no_signal_cycles,
    }
}
