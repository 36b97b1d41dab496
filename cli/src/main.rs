//! `dronewatch` CLI: scenario runs, replay evaluation, default config dump.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracker_core::metrics::TrackingMetrics;
use tracker_core::pipeline::FrameReport;
use tracker_core::{Pipeline, SystemConfig};

#[derive(Parser)]
#[command(name = "dronewatch", about = "Drone tracking and threat assessment CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a named scenario, track it and output metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// JSON configuration file (defaults apply to anything omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the recorded detections and ground truth
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Track a previously recorded detection log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the default configuration as JSON.
    PrintConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            config,
            output,
            save_replay: save_path,
        } => {
            let config = load_config(config.as_deref())?;
            run_scenario(scenario, seed, config, output.as_deref(), save_path.as_deref())?;
        }
        Commands::Replay {
            input,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            run_replay(&input, config, output.as_deref())?;
        }
        Commands::PrintConfig => {
            println!("{}", SystemConfig::default().to_json_pretty()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SystemConfig> {
    let Some(path) = path else {
        return Ok(SystemConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = SystemConfig::from_json_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    config: SystemConfig,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s, {} targets)...",
        scenario.name,
        seed,
        scenario.duration,
        scenario.targets.len()
    );

    let log = scenario.record();

    if let Some(rpath) = replay_path {
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    evaluate(&log, config, output_path)
}

fn run_replay(input: &Path, config: SystemConfig, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input)?;
    println!(
        "Replaying '{}' ({} frames, {} detections)...",
        log.scenario_name,
        log.frames.len(),
        log.total_detections()
    );
    evaluate(&log, config, output_path)
}

/// Track every frame of `log`, print a summary and optionally write metrics.
fn evaluate(log: &ReplayLog, mut config: SystemConfig, output_path: Option<&Path>) -> Result<()> {
    if config.tracker.estimator.dt != log.frame_dt {
        warn!(
            configured = config.tracker.estimator.dt,
            recorded = log.frame_dt,
            "estimator dt overridden by the log's frame interval"
        );
        config.tracker.estimator.dt = log.frame_dt;
    }
    let mut pipeline = Pipeline::new(config).context("building pipeline")?;
    let mut metrics = TrackingMetrics::default();
    let mut births = 0usize;
    let mut deletions = 0usize;
    let mut peak_threat = 0.0f64;
    let mut last: Option<FrameReport> = None;

    let start = std::time::Instant::now();
    for frame in &log.frames {
        let report = pipeline
            .process_frame(&frame.detections)
            .with_context(|| format!("processing frame {}", frame.index))?;
        if !frame.ground_truth.is_empty() {
            metrics.accumulate(&report, &frame.ground_truth);
        }
        births += report.births.len();
        deletions += report.deletions.len();
        peak_threat = report
            .tracks
            .iter()
            .filter_map(|t| t.threat)
            .fold(peak_threat, f64::max);
        last = Some(report);
    }
    let elapsed = start.elapsed();

    let final_tracks = last.as_ref().map_or(0, |r| r.tracks.len());
    println!(
        "Done: {} frames, {} births, {} deletions, {} tracks alive, elapsed={:.3}s",
        log.frames.len(),
        births,
        deletions,
        final_tracks,
        elapsed.as_secs_f64(),
    );
    if let Some(report) = &last {
        for t in &report.tracks {
            let behavior = t
                .behavior
                .as_ref()
                .and_then(|b| b.dominant())
                .map_or_else(|| "-".to_string(), |(k, p)| format!("{k} ({p:.2})"));
            let threat = t.threat.map_or_else(|| "-".to_string(), |s| format!("{s:.1}"));
            println!(
                "  {}  len={:<2} unseen={}  behavior={}  threat={}",
                t.track_id, t.length, t.time_since_last_seen, behavior, threat
            );
        }
    }
    if metrics.n_frames > 0 {
        println!(
            "Metrics: precision={:.3} recall={:.3} id_switches={} rmse_pos={:.2}px \
             rmse_vel={:.2}px/s behavior_acc={}",
            metrics.precision(),
            metrics.recall(),
            metrics.id_switches,
            metrics.rmse_position(),
            metrics.rmse_velocity(),
            metrics
                .behavior_accuracy()
                .map_or_else(|| "-".to_string(), |a| format!("{a:.3}")),
        );
    }

    if let Some(opath) = output_path {
        let json = serde_json::json!({
            "scenario": log.scenario_name,
            "seed": log.seed,
            "frames": log.frames.len(),
            "elapsed_s": elapsed.as_secs_f64(),
            "births": births,
            "deletions": deletions,
            "final_tracks": final_tracks,
            "peak_threat": peak_threat,
            "precision": metrics.precision(),
            "recall": metrics.recall(),
            "id_switches": metrics.id_switches,
            "rmse_position": metrics.rmse_position(),
            "rmse_velocity": metrics.rmse_velocity(),
            "behavior_accuracy": metrics.behavior_accuracy(),
            "counts": metrics,
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("writing metrics to {}", opath.display()))?;
        println!("Metrics saved to {}", opath.display());
    }

    Ok(())
}
