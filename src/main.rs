use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;

use led_sfm::config::ReconstructorConfig;
use led_sfm::engine::CommandEngine;
use led_sfm::system::{FailureKind, Reconstructor};

/// Reconstruct 3D LED positions from per-viewpoint 2D LED maps.
#[derive(Parser, Debug)]
#[command(name = "led-sfm", version, about)]
struct Cli {
    /// Directory holding `led_map_2d_*.csv` files. The 3D map is written here.
    directory: PathBuf,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rescale the reconstruction to physical units.
    #[arg(long)]
    rescale: bool,

    /// Fill LEDs that failed to triangulate from their neighbours.
    #[arg(long)]
    interpolate: bool,

    /// Polling interval of the change monitor.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Reconstruction engine executable.
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Reconstruct once and exit instead of watching the directory.
    #[arg(long)]
    once: bool,
}

fn load_config(cli: &Cli) -> Result<ReconstructorConfig> {
    let mut config = match &cli.config {
        Some(path) => ReconstructorConfig::from_yaml_file(path)?,
        None => ReconstructorConfig::default(),
    };
    config.rescale |= cli.rescale;
    config.interpolate |= cli.interpolate;
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(program) = &cli.engine {
        config.engine.program = program.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if !cli.directory.is_dir() {
        bail!("{} is not a directory", cli.directory.display());
    }

    let config = load_config(&cli)?;
    let engine = Arc::new(CommandEngine::new(config.engine.clone()));
    let mut reconstructor = Reconstructor::new(&cli.directory, config, engine);

    if cli.once {
        return match reconstructor.reload() {
            Ok(map) => {
                println!(
                    "Reconstructed {} of {} LEDs",
                    map.num_present(),
                    map.len()
                );
                Ok(())
            }
            Err(e) if e.kind() == FailureKind::ResourceFailure => Err(e.into()),
            Err(e) => {
                println!("No map produced: {}", e);
                Ok(())
            }
        };
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nreceived ctrl+c, stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    let updates = reconstructor.updates();
    reconstructor.start()?;

    while running.load(Ordering::SeqCst) {
        match updates.recv_timeout(Duration::from_millis(200)) {
            Ok(update) => println!(
                "Map updated: {}/{} LEDs from {} views in {:.2}s",
                update.map.num_present(),
                update.map.len(),
                update.num_views,
                update.elapsed.as_secs_f64()
            ),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    reconstructor.shutdown();
    reconstructor.join();
    Ok(())
}
