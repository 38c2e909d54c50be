use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plotters::prelude::*;
use pulse_core::{
    cloud::{AnalysisClient, AnalysisResponse},
    detect::DetectorConfig,
    history::{HistoryEntry, HistoryStore},
    hr::HrBand,
    io::text as text_io,
    metrics::hrv::summarize_from_ppi,
    offline::{run_offline, OfflineResult},
    session::{AcquisitionConfig, MeasureMode},
    signal::{HrvSummary, PpgSeries, PpiSeries},
};
use pulse_sim::{generate, read_recording, read_spec, write_recording, LocalAnalysis, SimSpec};
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Pulse: PPG beat detection and HRV tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    Hr,
    Hrv,
    Cloud,
}

impl From<Mode> for MeasureMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Hr => MeasureMode::Hr,
            Mode::Hrv => MeasureMode::Hrv,
            Mode::Cloud => MeasureMode::Cloud,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect beats from newline-delimited ADC samples read from stdin or --input file
    Detect {
        #[arg(long, default_value_t = 0.8)]
        threshold_ratio: f64,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Compute HRV statistics from newline-delimited peak intervals (milliseconds)
    Hrv {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Run the full acquisition schedule over a CSV recording
    Run {
        #[arg(long, default_value = "hrv")]
        mode: Mode,
        #[arg(long, default_value_t = 250.0)]
        fs: f64,
        #[arg(long)]
        input: PathBuf,
        /// In cloud mode, resolve the analysis request locally and print the
        /// response instead of the raw run result
        #[arg(long)]
        analyze: bool,
        /// Append the produced summary to this history file
        #[arg(long)]
        history: Option<PathBuf>,
        /// Use the stricter detection profile: 0.9 threshold ratio and a
        /// 60-100 BPM acceptance band
        #[arg(long)]
        strict: bool,
    },
    /// Generate a synthetic recording and write it as CSV
    Simulate {
        #[arg(long)]
        spec: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        duration_s: Option<f64>,
        #[arg(long)]
        mean_hr_bpm: Option<f64>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Render a recording with detected beats to a PNG via plotters
    Plot {
        #[arg(long, default_value_t = 250.0)]
        fs: f64,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Show recent measurement history entries, newest first
    History {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = 3)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Detect {
            threshold_ratio,
            input,
        } => cmd_detect(threshold_ratio, input.as_deref())?,
        Commands::Hrv { input } => cmd_hrv(input.as_deref())?,
        Commands::Run {
            mode,
            fs,
            input,
            analyze,
            history,
            strict,
        } => cmd_run(mode, fs, &input, analyze, history.as_deref(), strict)?,
        Commands::Simulate {
            spec,
            seed,
            duration_s,
            mean_hr_bpm,
            out,
        } => cmd_simulate(spec.as_deref(), seed, duration_s, mean_hr_bpm, &out)?,
        Commands::Plot { fs, input, out } => cmd_plot(fs, &input, &out)?,
        Commands::History { file, limit } => cmd_history(&file, limit)?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<u16>> {
    match input {
        Some(path) => text_io::read_raw_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_raw_series(&buf)
        }
    }
}

fn read_intervals(input: Option<&Path>) -> Result<Vec<u32>> {
    match input {
        Some(path) => text_io::read_ppi_ms(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_ppi_ms(&buf)
        }
    }
}

fn cmd_detect(threshold_ratio: f64, input: Option<&Path>) -> Result<()> {
    let data = read_samples(input)?;
    let mut config = AcquisitionConfig::default();
    config.detector.threshold_ratio = threshold_ratio;
    let series = PpgSeries {
        fs: 1.0 / config.sample_period_s,
        data,
    };
    let result = run_offline(&series, MeasureMode::Hr, config);
    println!("{}", serde_json::to_string(&result.beats)?);
    Ok(())
}

fn cmd_hrv(input: Option<&Path>) -> Result<()> {
    let ms = read_intervals(input)?;
    let summary = summarize_from_ppi(&PpiSeries::from_ms(ms))?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_run(
    mode: Mode,
    fs: f64,
    input: &Path,
    analyze: bool,
    history: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let series = read_recording(input, fs)?;
    let mut config = AcquisitionConfig::default();
    config.sample_period_s = 1.0 / fs;
    if strict {
        config.detector = DetectorConfig::strict();
        config.band = HrBand::strict();
    }
    let result = run_offline(&series, mode.into(), config);
    if analyze {
        let response = resolve_locally(&result)?;
        if let Some(path) = history {
            append_cloud_entry(path, &response)?;
        }
        println!("{}", serde_json::to_string(&response)?);
    } else {
        if let (Some(path), Some(summary)) = (history, result.summary) {
            HistoryStore::open(path).append(&HistoryEntry::new("basic_hrv", summary))?;
        }
        println!("{}", serde_json::to_string(&result)?);
    }
    Ok(())
}

fn append_cloud_entry(path: &Path, response: &AnalysisResponse) -> Result<()> {
    let summary = HrvSummary {
        mean_hr: response.mean_hr_bpm as u32,
        mean_ppi: response.mean_rr_ms as u32,
        rmssd: response.rmssd_ms as u32,
        sdnn: response.sdnn_ms as u32,
    };
    let pns = format!("{:.3} {}", response.pns_index, response.pns_level());
    let sns = format!("{:.3} {}", response.sns_index, response.sns_level());
    HistoryStore::open(path).append(&HistoryEntry::new("cloud", summary).with_indices(pns, sns))
}

fn resolve_locally(result: &OfflineResult) -> Result<AnalysisResponse> {
    let request = result
        .request
        .as_ref()
        .ok_or_else(|| anyhow!("run produced no analysis request; use --mode cloud"))?;
    let mut client = LocalAnalysis::new();
    client.submit(request)?;
    client
        .poll()
        .ok_or_else(|| anyhow!("local analysis returned no response"))
}

fn cmd_simulate(
    spec: Option<&Path>,
    seed: Option<u64>,
    duration_s: Option<f64>,
    mean_hr_bpm: Option<f64>,
    out: &Path,
) -> Result<()> {
    let mut sim = match spec {
        Some(path) => read_spec(path)?,
        None => SimSpec::default(),
    };
    if let Some(seed) = seed {
        sim.seed = seed;
    }
    if let Some(duration_s) = duration_s {
        sim.duration_s = duration_s;
    }
    if let Some(bpm) = mean_hr_bpm {
        sim.mean_hr_bpm = bpm;
    }
    let series = generate(&sim);
    write_recording(out, &series)?;
    println!(
        "{}",
        serde_json::to_string(&serde_json::json!({
            "samples": series.len(),
            "fs": series.fs,
            "out": out.display().to_string(),
        }))?
    );
    Ok(())
}

fn cmd_plot(fs: f64, input: &Path, out: &Path) -> Result<()> {
    let series = read_recording(input, fs)?;
    let mut config = AcquisitionConfig::default();
    config.sample_period_s = 1.0 / fs;
    let result = run_offline(&series, MeasureMode::Hr, config);
    draw_recording(out, &series, &result.beats.indices)?;
    Ok(())
}

fn draw_recording(path: &Path, series: &PpgSeries, beats: &[u64]) -> Result<()> {
    let backend = BitMapBackend::new(path, (1024, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let y_min = series.data.iter().copied().min().unwrap_or(0) as f64;
    let y_max = series.data.iter().copied().max().unwrap_or(1) as f64;
    let duration = series.duration().max(1.0 / series.fs);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("PPG recording", ("sans-serif", 24))
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..duration, y_min..y_max)?;
    chart.configure_mesh().draw()?;
    chart.draw_series(LineSeries::new(
        series
            .data
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64 / series.fs, v as f64)),
        &BLUE,
    ))?;
    chart.draw_series(beats.iter().filter_map(|&idx| {
        let value = *series.data.get(idx as usize)? as f64;
        Some(Circle::new((idx as f64 / series.fs, value), 4, RED.filled()))
    }))?;
    root.present()?;
    Ok(())
}

fn cmd_history(file: &Path, limit: usize) -> Result<()> {
    let store = HistoryStore::open(file);
    let entries = store.recent(limit)?;
    println!("{}", serde_json::to_string(&entries)?);
    Ok(())
}
