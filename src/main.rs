//! NIADC - continuous acquisition to CSV
//!
//! Entry point for the command line recorder. Runs a session against the
//! simulated source until Ctrl+C, the requested duration or a failure.

use anyhow::{bail, Context, Result};
use niadc::{Session, SessionConfig, SimulatedSource};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Options that map directly onto a config key
const OVERRIDES: &[(&str, &str)] = &[
    ("--device", "device"),
    ("--channels", "channel"),
    ("--sampling-rate", "sampling_rate"),
    ("--read-samples", "read_samples"),
    ("--data-length", "data_length"),
    ("--dir", "save_file_dir"),
    ("--name", "save_file_name"),
    ("--period-ms", "export_period_ms"),
];

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("niadc=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut overrides: Vec<(&str, String)> = Vec::new();
    let mut duration: Option<Duration> = None;
    let mut i = 1;

    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--version" | "-v" => {
                println!("niadc {} ({})", niadc::VERSION, niadc::BUILD_DATE);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {}
        }

        let Some(value) = args.get(i + 1) else {
            print_help();
            bail!("{} requires a value", arg);
        };
        match arg {
            "--config" | "-c" => config_path = Some(PathBuf::from(value)),
            "--duration" | "-t" => {
                let secs: f64 = value
                    .parse()
                    .ok()
                    .filter(|s: &f64| s.is_finite() && *s > 0.0)
                    .with_context(|| format!("invalid duration: {}", value))?;
                duration = Some(Duration::from_secs_f64(secs));
            }
            _ => match OVERRIDES.iter().find(|(flag, _)| *flag == arg) {
                Some((_, key)) => overrides.push((*key, value.clone())),
                None => {
                    print_help();
                    bail!("unknown argument: {}", arg);
                }
            },
        }
        i += 2;
    }

    let mut config = match &config_path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::default(),
    };
    for (key, value) in &overrides {
        config.set(key, value)?;
    }

    run(config, duration)
}

fn print_help() {
    println!("Usage: niadc [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config FILE        Load settings (key: value text or .json)");
    println!("      --device NAME        Device identifier (default: dev0)");
    println!("      --channels LIST      Comma separated channel indices (default: 0,1)");
    println!("      --sampling-rate HZ   Sampling rate (default: 1000)");
    println!("      --read-samples N     Samples per channel per read (default: 100)");
    println!("      --data-length N      Ring buffer capacity per channel (default: 10000)");
    println!("      --dir PATH           Root directory for session folders");
    println!("      --name FILE          Data file name (default: measured_data.csv)");
    println!("      --period-ms MS       Export period (default: 1000)");
    println!("  -t, --duration SECS      Stop after this many seconds");
    println!("  -v, --version            Show version");
    println!("  -h, --help               Show this help");
    println!();
    println!("Examples:");
    println!("  niadc --channels 0,2,3 --sampling-rate 2000 --duration 10");
    println!("  niadc --config previous/20240309070501/setting.txt");
}

fn run(config: SessionConfig, duration: Option<Duration>) -> Result<()> {
    let mut session = Session::create(config, Box::new(SimulatedSource::new()))?;
    let data_path = session.paths().data_path();
    println!("Session directory: {}", session.paths().dir().display());

    session.start()?;
    println!("Recording. Press Ctrl+C to stop.");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .ok();

    let deadline = duration.map(|d| Instant::now() + d);
    let backoff = session.config().export_period() / 2;
    let mut rows_seen = 0u64;
    let mut last_status = String::new();

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Duration elapsed");
            break;
        }
        if session.control().is_failed() {
            break;
        }

        let rows = session.display().poll(backoff);
        let Some(last) = rows.last() else {
            continue;
        };
        rows_seen += rows.len() as u64;

        let values: Vec<String> = last.values.iter().map(|v| format!("{:>8.4}", v)).collect();
        let status_line = format!("Rows: {:>10} | Last: [{}]", rows_seen, values.join(", "));
        if status_line != last_status {
            println!("{}", status_line);
            last_status = status_line;
        }
    }

    println!();
    println!("Stopping...");
    match session.stop() {
        Ok(summary) => {
            println!(
                "Done. {} rows written to {} ({} blocks skipped, {} samples evicted)",
                summary.rows_exported,
                data_path.display(),
                summary.blocks_skipped,
                summary.samples_evicted
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Session failed");
            Err(e).context("session failed")
        }
    }
}
