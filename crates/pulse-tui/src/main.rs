use std::{
    io::{self, Stdout},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pulse_core::{
    cloud::AnalysisClient,
    device::{Device, DeviceOutput, InputEvent, Menu, UiRequest, WAVEFORM_MAX},
    history::HistoryStore,
    queue::{InputQueue, SampleQueue},
    session::AcquisitionConfig,
};
use pulse_sim::{generate, LocalAnalysis, SimSpec};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Sparkline, Wrap},
    Frame, Terminal,
};

fn main() -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let result = (|| {
        while !app.should_quit {
            terminal.draw(|f| draw(f, &app))?;
            let timeout = tick_rate.saturating_sub(last_tick.elapsed());
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        app.on_key(key);
                    }
                }
            }
            if last_tick.elapsed() >= tick_rate {
                app.on_tick()?;
                last_tick = Instant::now();
            }
        }
        Ok(())
    })();

    app.producer.shutdown();
    restore_terminal()?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

/// Stand-in for the sensor interrupt: a thread replaying a synthetic
/// recording into the shared bounded queue at the 4 ms sample period. The
/// queue never blocks the producer; overflow is counted and dropped.
struct Producer {
    queue: Arc<Mutex<SampleQueue>>,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Producer {
    fn spawn(recording: Vec<u16>, period: Duration) -> Self {
        let queue = Arc::new(Mutex::new(SampleQueue::new(750)));
        let running = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut cursor = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    if running.load(Ordering::Relaxed) && !recording.is_empty() {
                        let raw = recording[cursor];
                        cursor = (cursor + 1) % recording.len();
                        if let Ok(mut queue) = queue.lock() {
                            queue.put(raw);
                        }
                    }
                    thread::sleep(period);
                }
            })
        };
        Self {
            queue,
            running,
            stop,
            handle: Some(handle),
        }
    }

    fn start(&self) -> Result<()> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| anyhow!("sample producer panicked"))?;
        queue.clear();
        drop(queue);
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn pause(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn drain(&self) -> Result<Vec<u16>> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| anyhow!("sample producer panicked"))?;
        let mut batch = Vec::with_capacity(queue.len());
        while let Some(raw) = queue.get() {
            batch.push(raw);
        }
        Ok(batch)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct App {
    device: Device,
    analysis: LocalAnalysis,
    producer: Producer,
    inputs: InputQueue,
    screen: UiRequest,
    waveform: Vec<u64>,
    status: String,
    should_quit: bool,
}

impl App {
    fn new() -> Self {
        let config = AcquisitionConfig::default();
        let history = HistoryStore::open("pulse_history.jsonl");
        let device = Device::new(config, history);
        // a long synthetic recording stands in for the sensor; playback wraps
        let recording = generate(&SimSpec {
            duration_s: 120.0,
            seed: 1,
            ..SimSpec::default()
        })
        .data;
        let producer = Producer::spawn(
            recording,
            Duration::from_secs_f64(config.sample_period_s),
        );
        Self {
            device,
            analysis: LocalAnalysis::new(),
            producer,
            inputs: InputQueue::new(30),
            screen: UiRequest::Menu {
                selected: Menu::MeasureHr,
            },
            waveform: Vec::new(),
            status: "↑/↓ select, Enter confirm, Space start/stop, Esc back, q quit".into(),
            should_quit: false,
        }
    }

    /// Key presses land in the bounded input queue; the device drains it on
    /// the next tick. Quit is the one key handled out of band.
    fn on_key(&mut self, key: KeyEvent) {
        let input = match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Up | KeyCode::Char('k') => Some(InputEvent::ModePrev),
            KeyCode::Down | KeyCode::Char('j') => Some(InputEvent::ModeNext),
            KeyCode::Enter => Some(InputEvent::Confirm),
            KeyCode::Esc => Some(InputEvent::Back),
            KeyCode::Char(' ') | KeyCode::Char('s') => Some(InputEvent::StartStop),
            _ => None,
        };
        if let Some(input) = input {
            self.inputs.put(input);
        }
    }

    fn on_tick(&mut self) -> Result<()> {
        while let Some(input) = self.inputs.get() {
            let outputs = self.device.handle_input(input)?;
            self.apply(outputs)?;
        }
        for raw in self.producer.drain()? {
            let outputs = self.device.handle_sample(raw)?;
            self.apply(outputs)?;
        }
        if let Some(response) = self.analysis.poll() {
            let outputs = self.device.handle_response(response)?;
            self.apply(outputs)?;
        }
        Ok(())
    }

    fn apply(&mut self, outputs: Vec<DeviceOutput>) -> Result<()> {
        for output in outputs {
            match output {
                DeviceOutput::Ui(request) => self.show(request),
                DeviceOutput::Cloud(request) => {
                    self.status = format!("Sent {} intervals for analysis", request.data.len());
                    self.analysis.submit(&request)?;
                }
                DeviceOutput::StartSampling => {
                    self.producer.start()?;
                    self.waveform.clear();
                    self.status = "Measuring".into();
                }
                DeviceOutput::StopSampling => {
                    self.producer.pause();
                }
            }
        }
        Ok(())
    }

    fn show(&mut self, request: UiRequest) {
        match &request {
            UiRequest::LiveHr { bpm } => {
                self.status = format!("Live HR {bpm} BPM");
                self.screen = request;
            }
            UiRequest::NoSignal => {
                self.status = "No signal, check the sensor".into();
            }
            UiRequest::Waveform { points } => {
                self.waveform = points.iter().map(|&p| u64::from(p)).collect();
            }
            _ => self.screen = request,
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let size = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);
    let title = Paragraph::new("Pulse monitor").block(Block::default().borders(Borders::ALL));
    f.render_widget(title, layout[0]);
    match &app.screen {
        UiRequest::Menu { selected } => draw_menu(f, layout[1], *selected),
        UiRequest::StartInstructions => draw_text(
            f,
            layout[1],
            "Instructions",
            vec![
                Line::from("Put your finger on the sensor."),
                Line::from("Press Space to start the measurement."),
            ],
        ),
        UiRequest::StopInstructions => draw_text(
            f,
            layout[1],
            "Measuring",
            vec![
                Line::from("Keep still; the sensor is settling."),
                Line::from("Press Space to stop."),
            ],
        ),
        UiRequest::LiveHr { bpm } => draw_live_hr(f, layout[1], *bpm, &app.waveform),
        // waveform updates land in app.waveform, never on the screen itself
        UiRequest::Waveform { .. } => {}
        UiRequest::NoSignal => draw_text(
            f,
            layout[1],
            "Measuring",
            vec![Line::from("No signal, check the sensor.")],
        ),
        UiRequest::HrvReport(summary) => draw_text(
            f,
            layout[1],
            "HRV report",
            vec![
                Line::from(format!("Mean HR   {} BPM", summary.mean_hr)),
                Line::from(format!("Mean PPI  {} ms", summary.mean_ppi)),
                Line::from(format!("RMSSD     {} ms", summary.rmssd)),
                Line::from(format!("SDNN      {} ms", summary.sdnn)),
                Line::from(""),
                Line::from("Esc returns to the menu."),
            ],
        ),
        UiRequest::CloudReport { summary, pns, sns } => draw_text(
            f,
            layout[1],
            "Analysis report",
            vec![
                Line::from(format!("Mean HR   {} BPM", summary.mean_hr)),
                Line::from(format!("Mean PPI  {} ms", summary.mean_ppi)),
                Line::from(format!("RMSSD     {} ms", summary.rmssd)),
                Line::from(format!("SDNN      {} ms", summary.sdnn)),
                Line::from(format!("PNS       {pns}")),
                Line::from(format!("SNS       {sns}")),
                Line::from(""),
                Line::from("Esc returns to the menu."),
            ],
        ),
        UiRequest::HistoryList { entries, selected } => {
            draw_history_list(f, layout[1], entries, *selected)
        }
        UiRequest::HistoryDetail(entry) => {
            let mut lines = vec![
                Line::from(format!("Mode      {}", entry.mode)),
                Line::from(format!("Mean HR   {} BPM", entry.summary.mean_hr)),
                Line::from(format!("Mean PPI  {} ms", entry.summary.mean_ppi)),
                Line::from(format!("RMSSD     {} ms", entry.summary.rmssd)),
                Line::from(format!("SDNN      {} ms", entry.summary.sdnn)),
            ];
            if let Some(pns) = &entry.pns {
                lines.push(Line::from(format!("PNS       {pns}")));
            }
            if let Some(sns) = &entry.sns {
                lines.push(Line::from(format!("SNS       {sns}")));
            }
            draw_text(f, layout[1], "History entry", lines)
        }
    }
    let status = Paragraph::new(app.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, layout[2]);
}

fn draw_menu(f: &mut Frame, area: Rect, selected: Menu) {
    let items: Vec<ListItem> = Menu::ALL
        .iter()
        .map(|entry| ListItem::new(entry.label()))
        .collect();
    let index = Menu::ALL.iter().position(|m| *m == selected);
    let mut state = ListState::default();
    state.select(index);
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Menu"))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_live_hr(f: &mut Frame, area: Rect, bpm: u32, waveform: &[u64]) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(6)])
        .split(area);
    let strip = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title("PPG"))
        .data(waveform)
        .max(u64::from(WAVEFORM_MAX))
        .style(Style::default().fg(Color::Red));
    f.render_widget(strip, layout[0]);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("{bpm} BPM"),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Press Space to stop."),
    ];
    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Heart rate"))
        .wrap(Wrap { trim: true });
    f.render_widget(body, layout[1]);
}

fn draw_history_list(
    f: &mut Frame,
    area: Rect,
    entries: &[pulse_core::history::HistoryEntry],
    selected: usize,
) {
    if entries.is_empty() {
        draw_text(
            f,
            area,
            "History",
            vec![Line::from("No stored measurements yet.")],
        );
        return;
    }
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            ListItem::new(format!(
                "{}  HR {} BPM  PPI {} ms",
                entry.mode, entry.summary.mean_hr, entry.summary.mean_ppi
            ))
        })
        .collect();
    let mut state = ListState::default();
    state.select(Some(selected.min(entries.len() - 1)));
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_text(f: &mut Frame, area: Rect, title: &str, lines: Vec<Line>) {
    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: true });
    f.render_widget(body, area);
}
