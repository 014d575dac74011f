//! APM Meter CLI
//!
//! Live actions-per-minute meter for keyboard and mouse input.

use anyhow::{bail, Context, Result};
use apm_meter::{
    collector::InputCollector,
    config::{Config, EngineConfig},
    core::{Clock, EngineSnapshot, ManualClock, MilestoneTracker, RateEngine},
    export::{ExportFormat, SessionReport},
    InputCategory, VERSION,
};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apm-meter")]
#[command(version = VERSION)]
#[command(about = "Live actions-per-minute meter for keyboard and mouse input", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Meter input events read from stdin, one category per line
    ///
    /// Accepted tokens: key, left, right, middle, extra, wheel (or k, l, r, m, x, w).
    Start {
        /// Poll interval in milliseconds (defaults to the configured value)
        #[arg(long)]
        poll_ms: Option<u64>,

        /// Override the EMA smoothing constant
        #[arg(long)]
        alpha: Option<f64>,

        /// Use the slower legacy smoothing
        #[arg(long, conflicts_with = "alpha")]
        legacy: bool,

        /// Export the session report on exit (json or csv)
        #[arg(long)]
        export: Option<ExportFormat>,

        /// Output directory for the report
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Run a deterministic simulation at a constant input rate
    Simulate {
        /// Input rate in actions per minute
        #[arg(long, default_value = "240")]
        apm: f64,

        /// Simulated active time in seconds
        #[arg(long, default_value = "60")]
        seconds: u64,

        /// Idle time appended after the active period, in seconds
        #[arg(long, default_value = "0")]
        idle: u64,

        /// Fraction of events that are key presses (the rest are clicks)
        #[arg(long, default_value = "0.7")]
        keyboard_share: f64,

        /// Use the slower legacy smoothing
        #[arg(long)]
        legacy: bool,

        /// Export the session report (json or csv)
        #[arg(long)]
        export: Option<ExportFormat>,

        /// Output directory for the report
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apm_meter=info")),
        )
        .with_target(false)
        .try_init()
        .ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            poll_ms,
            alpha,
            legacy,
            export,
            output,
        } => cmd_start(poll_ms, alpha, legacy, export, output),
        Commands::Simulate {
            apm,
            seconds,
            idle,
            keyboard_share,
            legacy,
            export,
            output,
        } => cmd_simulate(apm, seconds, idle, keyboard_share, legacy, export, output),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load configuration, using defaults: {e}");
            Config::default()
        }
    }
}

fn engine_config(base: &EngineConfig, alpha: Option<f64>, legacy: bool) -> Result<EngineConfig> {
    let config = match (alpha, legacy) {
        (Some(alpha), _) => base.clone().with_alpha(alpha),
        (None, true) => EngineConfig {
            ema_alpha: EngineConfig::legacy().ema_alpha,
            ..base.clone()
        },
        (None, false) => base.clone(),
    };
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn cmd_start(
    poll_ms: Option<u64>,
    alpha: Option<f64>,
    legacy: bool,
    export: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config();
    let engine_config = engine_config(&config.engine, alpha, legacy)?;
    let poll_interval = poll_ms.map_or(config.poll_interval, Duration::from_millis);
    if poll_interval.is_zero() {
        bail!("poll interval must be positive");
    }

    println!("APM Meter v{VERSION}");
    println!("  Smoothing alpha: {}", engine_config.ema_alpha);
    println!("  Poll interval: {}ms", poll_interval.as_millis());
    println!();
    println!("Reading input events from stdin. Press Ctrl+C to stop.");
    println!();

    let engine = RateEngine::new(engine_config);
    let mut collector = InputCollector::new();
    collector.start()?;

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("could not install Ctrl+C handler")?;

    // stdin stands in for the capture hook
    let input_open = Arc::new(AtomicBool::new(true));
    let sender = collector.sender();
    let open = Arc::clone(&input_open);
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            for token in line.split_whitespace() {
                match token.parse::<InputCategory>() {
                    Ok(category) => {
                        if !sender.send(category) {
                            tracing::debug!(%category, "event not queued");
                        }
                    }
                    Err(e) => tracing::warn!("{e}"),
                }
            }
        }
        open.store(false, Ordering::SeqCst);
    });

    let mut milestones = MilestoneTracker::new();
    let mut last_displayed = None;

    while running.load(Ordering::SeqCst) {
        let tick = Instant::now();
        let input_closed = !input_open.load(Ordering::SeqCst);

        collector.drain_into(&engine);
        let reading = engine.poll();

        if last_displayed != Some(reading.displayed) {
            println!(
                "[{}] {:>4} APM  (peak {})",
                reading.at.format("%H:%M:%S"),
                reading.displayed,
                reading.peak
            );
            last_displayed = Some(reading.displayed);
        }
        if let Some(milestone) = milestones.observe(reading.displayed) {
            tracing::info!("Milestone reached: {milestone}");
        }

        if input_closed {
            tracing::info!("Input closed");
            break;
        }

        thread::sleep(poll_interval.saturating_sub(tick.elapsed()));
    }

    collector.stop()?;
    collector.drain_into(&engine);
    if collector.dropped() > 0 {
        tracing::warn!(dropped = collector.dropped(), "input buffer overflowed");
    }

    finish_session(&engine, export, output, &config)
}

fn cmd_simulate(
    apm: f64,
    seconds: u64,
    idle: u64,
    keyboard_share: f64,
    legacy: bool,
    export: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> Result<()> {
    if !(apm.is_finite() && apm >= 0.0) {
        bail!("--apm must be a non-negative number");
    }
    if !(0.0..=1.0).contains(&keyboard_share) {
        bail!("--keyboard-share must be between 0 and 1");
    }

    let config = load_config();
    let engine_config = engine_config(&config.engine, None, legacy)?;
    let tick_ms = i64::try_from(config.poll_interval.as_millis())
        .ok()
        .filter(|ms| *ms > 0)
        .unwrap_or(200);

    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let engine = RateEngine::with_clock(engine_config, Arc::clone(&clock));
    let mut milestones = MilestoneTracker::new();

    println!("Simulating {apm} APM for {seconds}s, then {idle}s idle ({tick_ms}ms ticks)");
    println!();

    let active_ticks = seconds * 1000 / tick_ms as u64;
    let total_ticks = (seconds + idle) * 1000 / tick_ms as u64;
    let per_tick = apm / 60.0 * tick_ms as f64 / 1000.0;
    let ticks_per_second = (1000 / tick_ms).max(1) as u64;

    let mut owed = 0.0;
    let mut keyboard_owed = 0.0;
    let mut last_displayed = None;

    for tick in 0..total_ticks {
        if tick < active_ticks {
            owed += per_tick;
            while owed >= 1.0 {
                owed -= 1.0;
                keyboard_owed += keyboard_share;
                let category = if keyboard_owed >= 1.0 {
                    keyboard_owed -= 1.0;
                    InputCategory::Keyboard
                } else {
                    InputCategory::MouseLeft
                };
                engine.record_event(category);
            }
        }

        let reading = engine.poll();
        if let Some(milestone) = milestones.observe(reading.displayed) {
            println!("  -- {milestone} reached");
        }
        if tick % ticks_per_second == 0 && last_displayed != Some(reading.displayed) {
            println!(
                "t={:>4}s  raw {:>7.1}  smoothed {:>7.1}  display {:>4}",
                tick / ticks_per_second,
                reading.raw_rate,
                reading.smoothed_rate,
                reading.displayed
            );
            last_displayed = Some(reading.displayed);
        }

        clock.advance_millis(tick_ms);
    }

    finish_session(&engine, export, output, &config)
}

/// Print the session summary and optionally export it.
fn finish_session<C: Clock>(
    engine: &RateEngine<C>,
    export: Option<ExportFormat>,
    output: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let snapshot = engine.snapshot();
    println!();
    println!("{}", summary(&snapshot));

    if let Some(format) = export {
        let dir = output.unwrap_or_else(|| config.export_path.clone());
        let report = SessionReport::from_snapshot(&snapshot);
        let path = report
            .write_to(&dir, format)
            .with_context(|| format!("could not export session report to {}", dir.display()))?;
        println!("Exported session report to {}", path.display());
    }

    Ok(())
}

fn summary(snapshot: &EngineSnapshot) -> String {
    let secs = snapshot.session_duration.num_seconds().max(0);
    format!(
        "Session Statistics:\n\
         - Duration: {:02}:{:02}:{:02}\n\
         - Total actions: {}\n\
         - Keyboard actions: {}\n\
         - Mouse actions: {}\n\
         - Peak APM: {}\n\
         - Min APM: {}\n\
         - Average APM: {:.0}\n\
         - APM (1 min): {:.1}\n\
         - APM (5 min): {:.1}\n\
         - History samples: {}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        snapshot.total_events,
        snapshot.keyboard_events,
        snapshot.mouse_events,
        snapshot.peak_rate,
        snapshot.min_rate,
        snapshot.average_rate,
        snapshot.rate_1min,
        snapshot.rate_5min,
        snapshot.history.len()
    )
}

fn cmd_config() -> Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("could not render configuration")?
    );
    Ok(())
}
