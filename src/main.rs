//! CLI entry point for ljstream
//!
//! Runs one acquisition against the built-in simulated device and reports
//! the outcome.
//!
//! # Usage
//!
//! Run 50 batches, naming artifacts by the current time:
//! ```bash
//! ljstream run --output-dir data --batches 50
//! ```
//!
//! Show the resolved settings:
//! ```bash
//! ljstream show-config --config config/ljstream.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ljstream::config::Settings;
use ljstream::hal::sim::{SimConfig, SimulatedDevice};
use ljstream::{run_acquisition, tracing_init, AcquisitionRequest, CancellationToken};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ljstream")]
#[command(about = "Synchronized stream-in/stream-out acquisition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one acquisition
    Run {
        /// Directory for the data and log files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Number of stream reads
        #[arg(long)]
        batches: u64,

        /// Artifact prefix (default: <output-dir>/<timestamp>)
        #[arg(long)]
        prefix: Option<PathBuf>,

        /// Settings file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the resolved settings as TOML
    ShowConfig {
        /// Settings file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            output_dir,
            batches,
            prefix,
            config,
        } => run(&output_dir, batches, prefix, config.as_deref()),
        Commands::ShowConfig { config } => show_config(config.as_deref()),
    }
}

fn run(output_dir: &Path, batches: u64, prefix: Option<PathBuf>, config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config).context("Failed to load settings")?;
    tracing_init::init_from_settings(&settings).map_err(anyhow::Error::msg)?;

    let prefix = match prefix {
        Some(prefix) => prefix,
        None => {
            std::fs::create_dir_all(output_dir).with_context(|| {
                format!("Failed to create output directory {}", output_dir.display())
            })?;
            let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
            output_dir.join(stamp)
        }
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current batch");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let device = SimulatedDevice::new(SimConfig::from(&settings.simulation));
    info!(prefix = %prefix.display(), batches, "Running acquisition on simulated device");

    let request = AcquisitionRequest::new(prefix, batches, settings).with_cancel(cancel);
    let result = run_acquisition(&device, &request);

    println!("{}", result.message);
    println!("Data: {}", result.data_path.display());
    println!("Log:  {}", result.log_path.display());

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn show_config(config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config).context("Failed to load settings")?;
    let text = toml::to_string_pretty(&settings).context("Failed to serialize settings")?;
    print!("{}", text);
    Ok(())
}
