use crate::cloud::{AnalysisRequest, AnalysisResponse};
use crate::history::{HistoryEntry, HistoryStore};
use crate::session::{AcquisitionConfig, MeasureMode, Phase, Session, SessionEvent};
use crate::signal::{HrvSummary, RawSample};
use anyhow::Result;
use log::warn;
use std::collections::VecDeque;

/// Debounced front-panel event. The wire form is a small integer code, as
/// delivered by the button/encoder interrupt handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    StartStop,
    ModeNext,
    ModePrev,
    Confirm,
    Back,
}

impl InputEvent {
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Self::StartStop),
            1 => Some(Self::ModeNext),
            -1 => Some(Self::ModePrev),
            2 => Some(Self::Confirm),
            3 => Some(Self::Back),
            _ => None,
        }
    }

    pub fn code(&self) -> i8 {
        match self {
            Self::StartStop => 0,
            Self::ModeNext => 1,
            Self::ModePrev => -1,
            Self::Confirm => 2,
            Self::Back => 3,
        }
    }
}

/// Top-level menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    MeasureHr,
    BasicHrv,
    Cloud,
    History,
}

impl Menu {
    pub const ALL: [Menu; 4] = [Menu::MeasureHr, Menu::BasicHrv, Menu::Cloud, Menu::History];

    pub fn label(&self) -> &'static str {
        match self {
            Menu::MeasureHr => "MEASURE HR",
            Menu::BasicHrv => "BASIC HRV",
            Menu::Cloud => "CLOUD ANALYSIS",
            Menu::History => "HISTORY",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Menu::MeasureHr => Menu::BasicHrv,
            Menu::BasicHrv => Menu::Cloud,
            Menu::Cloud => Menu::History,
            Menu::History => Menu::History,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Menu::MeasureHr => Menu::MeasureHr,
            Menu::BasicHrv => Menu::MeasureHr,
            Menu::Cloud => Menu::BasicHrv,
            Menu::History => Menu::Cloud,
        }
    }

    /// The measurement mode this entry starts, if any.
    pub fn measure_mode(&self) -> Option<MeasureMode> {
        match self {
            Menu::MeasureHr => Some(MeasureMode::Hr),
            Menu::BasicHrv => Some(MeasureMode::Hrv),
            Menu::Cloud => Some(MeasureMode::Cloud),
            Menu::History => None,
        }
    }
}

/// Width of the scrolling live waveform strip, in points.
pub const WAVEFORM_WIDTH: usize = 128;
/// Top of the waveform amplitude range; points are scaled into 0..=63.
pub const WAVEFORM_MAX: u8 = 63;

const WAVEFORM_RESCALE_EVERY: usize = 3 * WAVEFORM_WIDTH;
const WAVEFORM_SMOOTH_LEN: usize = 10;
const WAVEFORM_REFRESH_EVERY: u64 = 5;

/// Live waveform scaler for the measuring view. Amplitude bounds are
/// re-estimated every [`WAVEFORM_RESCALE_EVERY`] raw samples from 5-sample
/// block averages, so the strip stays blank until the first bounds exist.
/// Each point is a 10-sample sliding mean scaled into `0..=WAVEFORM_MAX`.
#[derive(Debug, Clone, Default)]
pub struct WaveformTrace {
    raw: Vec<RawSample>,
    lo: f64,
    hi: f64,
    bounded: bool,
    smooth: VecDeque<RawSample>,
    points: VecDeque<u8>,
}

impl WaveformTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw sample; returns the produced point, if any.
    pub fn push(&mut self, raw: RawSample) -> Option<u8> {
        self.raw.push(raw);
        if self.raw.len() >= WAVEFORM_RESCALE_EVERY {
            self.rescale();
            self.raw.clear();
        }
        if !self.bounded {
            return None;
        }
        self.smooth.push_back(raw);
        if self.smooth.len() < WAVEFORM_SMOOTH_LEN {
            return None;
        }
        let mean =
            self.smooth.iter().map(|&v| f64::from(v)).sum::<f64>() / self.smooth.len() as f64;
        self.smooth.pop_front();
        let point = self.scale(mean);
        if self.points.len() == WAVEFORM_WIDTH {
            self.points.pop_front();
        }
        self.points.push_back(point);
        Some(point)
    }

    /// Current strip, oldest point first.
    pub fn points(&self) -> Vec<u8> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn rescale(&mut self) {
        let mut lo = f64::MAX;
        let mut hi = f64::MIN;
        for block in self.raw.chunks_exact(5) {
            let mean = block.iter().map(|&v| f64::from(v)).sum::<f64>() / block.len() as f64;
            lo = lo.min(mean);
            hi = hi.max(mean);
        }
        // a flat block set carries no dynamic range; keep the old bounds
        if hi > lo {
            self.lo = lo;
            self.hi = hi;
            self.bounded = true;
        }
    }

    fn scale(&self, value: f64) -> u8 {
        let span = self.hi - self.lo;
        let scaled = (value - self.lo) * f64::from(WAVEFORM_MAX) / span;
        scaled.clamp(0.0, f64::from(WAVEFORM_MAX)) as u8
    }
}

/// Rendering request handed to the display sink. Data values only; pixel
/// work belongs to the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum UiRequest {
    Menu { selected: Menu },
    StartInstructions,
    StopInstructions,
    LiveHr { bpm: u32 },
    /// Scrolling live waveform, oldest point first, amplitudes in 0..=63.
    Waveform { points: Vec<u8> },
    NoSignal,
    HrvReport(HrvSummary),
    CloudReport {
        summary: HrvSummary,
        pns: String,
        sns: String,
    },
    HistoryList {
        entries: Vec<HistoryEntry>,
        selected: usize,
    },
    HistoryDetail(HistoryEntry),
}

/// Side effects the runner must perform for the device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOutput {
    Ui(UiRequest),
    /// Hand this dataset to the analysis collaborator (fire and forget).
    Cloud(AnalysisRequest),
    /// Activate the periodic sampling source.
    StartSampling,
    /// Deactivate the periodic sampling source.
    StopSampling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Menu,
    Instructions,
    Measuring,
    Report,
    HistoryList,
    HistoryDetail,
}

/// Menu-and-session controller: the single consumer of both the input queue
/// and the sample queue. Owns the active session exclusively; mode changes
/// require going through Idle.
pub struct Device {
    session: Session,
    menu: Menu,
    history: HistoryStore,
    history_cursor: usize,
    view: View,
    trace: WaveformTrace,
    trace_points: u64,
}

impl Device {
    pub fn new(config: AcquisitionConfig, history: HistoryStore) -> Self {
        Self {
            session: Session::new(config),
            menu: Menu::MeasureHr,
            history,
            history_cursor: 0,
            view: View::Menu,
            trace: WaveformTrace::new(),
            trace_points: 0,
        }
    }

    pub fn menu(&self) -> Menu {
        self.menu
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Result<Vec<DeviceOutput>> {
        match event {
            InputEvent::StartStop => self.toggle_measurement(),
            InputEvent::ModeNext => self.move_selection(true),
            InputEvent::ModePrev => self.move_selection(false),
            InputEvent::Confirm => self.confirm(),
            InputEvent::Back => self.back(),
        }
    }

    /// Feed one raw sample through the session and translate its events.
    pub fn handle_sample(&mut self, raw: RawSample) -> Result<Vec<DeviceOutput>> {
        let mut out = Vec::new();
        for event in self.session.handle_sample(raw) {
            match event {
                SessionEvent::HrUpdate(bpm) => out.push(DeviceOutput::Ui(UiRequest::LiveHr { bpm })),
                SessionEvent::NoSignal => out.push(DeviceOutput::Ui(UiRequest::NoSignal)),
                SessionEvent::HrvReady(summary) => {
                    self.history
                        .append(&HistoryEntry::new("basic_hrv", summary))?;
                    self.view = View::Report;
                    out.push(DeviceOutput::Ui(UiRequest::HrvReport(summary)));
                }
                SessionEvent::CloudRequest(request) => out.push(DeviceOutput::Cloud(request)),
                SessionEvent::SamplingDone => out.push(DeviceOutput::StopSampling),
                SessionEvent::PhaseChanged(_) | SessionEvent::Beat(_) => {}
            }
        }
        // live waveform is an HR-mode feature and only runs once detection is up
        if self.session.mode() == MeasureMode::Hr && self.session.phase() == Phase::Detecting {
            if self.trace.push(raw).is_some() {
                self.trace_points += 1;
                if self.trace_points % WAVEFORM_REFRESH_EVERY == 0 {
                    out.push(DeviceOutput::Ui(UiRequest::Waveform {
                        points: self.trace.points(),
                    }));
                }
            }
        }
        Ok(out)
    }

    /// Consume a late-arriving analysis response.
    pub fn handle_response(&mut self, response: AnalysisResponse) -> Result<Vec<DeviceOutput>> {
        let summary = HrvSummary {
            mean_hr: response.mean_hr_bpm as u32,
            mean_ppi: response.mean_rr_ms as u32,
            rmssd: response.rmssd_ms as u32,
            sdnn: response.sdnn_ms as u32,
        };
        let pns = format!("{:.3} {}", response.pns_index, response.pns_level());
        let sns = format!("{:.3} {}", response.sns_index, response.sns_level());
        self.history.append(
            &HistoryEntry::new("cloud", summary).with_indices(pns.clone(), sns.clone()),
        )?;
        self.view = View::Report;
        Ok(vec![DeviceOutput::Ui(UiRequest::CloudReport {
            summary,
            pns,
            sns,
        })])
    }

    fn toggle_measurement(&mut self) -> Result<Vec<DeviceOutput>> {
        if self.session.is_active() {
            self.session.stop();
            self.trace.clear();
            self.trace_points = 0;
            self.view = View::Menu;
            self.menu = Menu::MeasureHr;
            return Ok(vec![
                DeviceOutput::StopSampling,
                DeviceOutput::Ui(UiRequest::Menu { selected: self.menu }),
            ]);
        }
        // the history entry starts nothing
        let Some(mode) = self.menu.measure_mode() else {
            return Ok(Vec::new());
        };
        self.session.start(mode);
        self.trace.clear();
        self.trace_points = 0;
        self.view = View::Measuring;
        Ok(vec![
            DeviceOutput::StartSampling,
            DeviceOutput::Ui(UiRequest::StopInstructions),
        ])
    }

    fn move_selection(&mut self, forward: bool) -> Result<Vec<DeviceOutput>> {
        if self.session.is_active() {
            // mode is locked while a measurement runs
            return Ok(Vec::new());
        }
        match self.view {
            View::HistoryList => {
                let entries = self.history.recent(HistoryStore::DEFAULT_CAPACITY)?;
                if entries.is_empty() {
                    return Ok(Vec::new());
                }
                if forward {
                    self.history_cursor = (self.history_cursor + 1).min(entries.len() - 1);
                } else {
                    self.history_cursor = self.history_cursor.saturating_sub(1);
                }
                Ok(vec![DeviceOutput::Ui(UiRequest::HistoryList {
                    entries,
                    selected: self.history_cursor,
                })])
            }
            _ => {
                self.menu = if forward {
                    self.menu.next()
                } else {
                    self.menu.prev()
                };
                self.view = View::Menu;
                Ok(vec![DeviceOutput::Ui(UiRequest::Menu {
                    selected: self.menu,
                })])
            }
        }
    }

    fn confirm(&mut self) -> Result<Vec<DeviceOutput>> {
        if self.session.is_active() {
            return Ok(Vec::new());
        }
        match self.view {
            View::HistoryList => {
                let entries = self.history.recent(HistoryStore::DEFAULT_CAPACITY)?;
                match entries.get(self.history_cursor) {
                    Some(entry) => {
                        self.view = View::HistoryDetail;
                        Ok(vec![DeviceOutput::Ui(UiRequest::HistoryDetail(
                            entry.clone(),
                        ))])
                    }
                    None => {
                        warn!("history selection out of range");
                        Ok(Vec::new())
                    }
                }
            }
            _ if self.menu == Menu::History => {
                self.view = View::HistoryList;
                self.history_cursor = 0;
                let entries = self.history.recent(HistoryStore::DEFAULT_CAPACITY)?;
                Ok(vec![DeviceOutput::Ui(UiRequest::HistoryList {
                    entries,
                    selected: 0,
                })])
            }
            _ => {
                self.view = View::Instructions;
                Ok(vec![DeviceOutput::Ui(UiRequest::StartInstructions)])
            }
        }
    }

    fn back(&mut self) -> Result<Vec<DeviceOutput>> {
        match self.view {
            View::HistoryDetail => {
                self.view = View::HistoryList;
                let entries = self.history.recent(HistoryStore::DEFAULT_CAPACITY)?;
                Ok(vec![DeviceOutput::Ui(UiRequest::HistoryList {
                    entries,
                    selected: self.history_cursor,
                })])
            }
            View::HistoryList | View::Instructions | View::Report => {
                self.view = View::Menu;
                self.history_cursor = 0;
                Ok(vec![DeviceOutput::Ui(UiRequest::Menu {
                    selected: self.menu,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}
