//! adcast-send - Background daemon for scheduled ad publishing
//!
//! Polls the schedule table and publishes every due entry, charging the
//! owning tenant per run.

use chrono::Utc;
use clap::Parser;
use libadcaster::{Config, Result, SchedulerState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "adcast-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled ad publishing")]
#[command(long_about = "\
adcast-send - Background daemon for scheduled ad publishing

DESCRIPTION:
    adcast-send is a long-running daemon that watches the Adcaster schedule
    table and publishes ads when their time comes.

    On every tick it recomputes the due set from the database, so schedules
    created or cancelled by adcast-queue while the daemon runs are picked up
    without any coordination. Each run is billed to the owning tenant; a
    tenant without funds has that run marked failed while other schedules
    proceed normally.

USAGE:
    # Run in foreground (logs to stderr)
    adcast-send

    # Run with custom poll interval
    adcast-send --poll-interval 30

    # Enable verbose logging
    adcast-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current tick)

CONFIGURATION:
    Configuration file: ~/.config/adcaster/config.toml
    Database location: ~/.local/share/adcaster/adcaster.db

    [scheduling]
    poll_interval = 60  # seconds between polls

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error

For more information, visit: https://github.com/adcaster/adcaster
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due schedules (default: from config)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Process due schedules once and exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    libadcaster::logging::init_for_binary(cli.verbose, "info");

    let config = Config::load()?;
    let state = SchedulerState::from_config(&config).await?;

    info!("adcast-send daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.scheduling.poll_interval);
    info!("Poll interval: {}s", poll_interval);

    if cli.once {
        process_tick(&state).await;
        info!("adcast-send: processed schedules once, exiting");
    } else {
        run_daemon_loop(&state, poll_interval, shutdown).await;
    }

    info!("adcast-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libadcaster::AdcasterError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(state: &SchedulerState, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        process_tick(state).await;

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// One tick: publish everything that is due
async fn process_tick(state: &SchedulerState) {
    match state.run_due_jobs(Utc::now()).await {
        Ok(summary) if summary.attempted > 0 => {
            info!(
                "Processed {} due schedule(s): {} published, {} failed",
                summary.attempted, summary.published, summary.failed
            );
        }
        Ok(_) => {}
        Err(e) => error!("Error processing schedules: {}", e),
    }
}
