use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use vmud::inspect::{self, InspectFilter};
use vmud::replay::{self, ReplayOptions};
use vmud::{monitor, Config, Daemon, IngestMetrics};

#[derive(Parser)]
#[command(name = "vmud")]
#[command(about = "VMU telemetry acquisition and archiving daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the acquisition link and store packets in the archive
    Listen {
        /// Path to the TOML configuration
        config: PathBuf,
    },
    /// Send archived VMU packets through the network from an HRDP archive
    Replay {
        /// Remote acquisition endpoint (host:port)
        addr: String,
        /// HRDP archive directory
        archive: PathBuf,
        /// Packets per second
        #[arg(short = 'r', long, default_value_t = 1)]
        rate: u32,
        /// Fragment size in bytes; 0 sends single-shot frames
        #[arg(short = 's', long, default_value_t = 0)]
        chunk: usize,
        /// VMU protocol generation announced in the prefix
        #[arg(short = 't', long, default_value_t = 2)]
        vmu: u8,
        /// Instance byte announced in the prefix
        #[arg(short = 'm', long, default_value_t = 255)]
        instance: u8,
        /// Wrap the framed stream in gzip
        #[arg(short = 'z', long, default_value_t = false)]
        compressed: bool,
    },
    /// Listen to notifier groups and print pool messages
    Monitor {
        /// UDP groups (multicast or unicast host:port)
        groups: Vec<String>,
    },
    /// List the products archived in an HRDP capture tree
    Inspect {
        /// HRDP archive directory
        archive: PathBuf,
        /// VMU protocol generation used for decoding
        #[arg(short = 'u', long, default_value_t = 2)]
        vmu: u8,
        /// Channel keywords (vic1, vic2, lrsd)
        #[arg(short = 'c', long)]
        channels: Vec<String>,
        /// Mode filter: realtime, playback, or empty for both
        #[arg(short = 's', long, default_value = "")]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).format_timestamp_millis().init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Listen { config } => listen(config).await?,
        Commands::Replay { addr, archive, rate, chunk, vmu, instance, compressed } => {
            let options = ReplayOptions { rate, chunk, version: vmu, instance, compressed };
            tokio::task::spawn_blocking(move || replay::run(&addr, &archive, options)).await??;
        }
        Commands::Monitor { groups } => {
            tokio::select! {
                result = monitor::run(groups) => result?,
                _ = signal::ctrl_c() => {}
            }
        }
        Commands::Inspect { archive, vmu, channels, source } => {
            let filter = InspectFilter { channels: inspect::parse_channels(&channels)?, source };
            tokio::task::spawn_blocking(move || inspect::run(&archive, vmu, &filter)).await??;
        }
    }
    Ok(())
}

async fn listen(config: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(&config)?;
    let metrics = Arc::new(IngestMetrics::new());
    let daemon = Daemon::start(config, metrics.clone()).await?;

    signal::ctrl_c().await?;
    info!("shutting down");
    daemon.shutdown();
    // give the pipeline a moment to drain and flush open windows
    tokio::time::sleep(Duration::from_millis(500)).await;

    let snapshot = metrics.snapshot();
    info!(
        "ingest.event=summary connections={} packets={} products={} bytes={} decode_errors={} storage_errors={}",
        snapshot.connections_total,
        snapshot.packets_total,
        snapshot.products_total,
        snapshot.bytes_total,
        snapshot.decode_errors,
        snapshot.storage_errors,
    );
    Ok(())
}
