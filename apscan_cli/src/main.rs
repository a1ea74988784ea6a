mod monitor;
mod report;

use anyhow::Context;
use apscan_lib::{
    decode_capture, AdapterHandle, Bssid, CaptureScanProvider, ScanConfig, ScanController,
    ScanProvider,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// TOML scan settings
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/**
 * Available CLI commands
 */
#[derive(Subcommand)]
enum Commands {
    /// Replay a pcap capture through the scan cycle and build the AP cache
    Replay {
        /// pcap input file
        #[arg(short = 'f', long, value_name = "FILE")]
        pcap_file: PathBuf,

        /// parquet output file
        #[arg(short, long, value_name = "OUTFILE")]
        out_file: Option<PathBuf>,

        /// Whether to print a line per cycle
        #[arg(short, long)]
        print: bool,

        /// Capture time consumed per scan, overrides the config file
        #[arg(long, value_name = "MS")]
        window_ms: Option<u64>,

        /// BSSID to flag as the connected network
        #[arg(long, value_name = "BSSID")]
        connected: Option<Bssid>,
    },
    /// Scan a monitor-mode interface until interrupted
    Monitor {
        /// Chose interface to be used
        #[arg(short = 'i', long, value_name = "INTERFACE")]
        interface: String,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// parquet output file
        #[arg(short, long, value_name = "OUTFILE")]
        out_file: Option<PathBuf>,

        /// Whether to print a line per cycle
        #[arg(short, long)]
        print: bool,
    },
    /// Decode every beacon of a pcap capture without caching
    Decode {
        /// pcap input file
        #[arg(short = 'f', long, value_name = "FILE")]
        pcap_file: PathBuf,

        /// BSSID to flag as the connected network
        #[arg(long, value_name = "BSSID")]
        connected: Option<Bssid>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Replay {
            pcap_file,
            out_file,
            print,
            window_ms,
            connected,
        }) => {
            let mut config = config;
            if let Some(window_ms) = window_ms {
                config.replay_window_ms = window_ms;
            }
            replay(&pcap_file, config, connected, out_file, print).await?;
            println!("Replay completed!\n");
        }

        Some(Commands::Monitor {
            interface,
            cycles,
            out_file,
            print,
        }) => {
            monitor::monitor(interface, config, cycles, out_file, print).await?;
        }

        Some(Commands::Decode {
            pcap_file,
            connected,
        }) => {
            let samples = decode_capture(&pcap_file, connected)
                .with_context(|| format!("decoding {}", pcap_file.display()))?;
            for sample in &samples {
                report::print_sample(sample);
            }
            println!("{} samples decoded", samples.len());
        }
        None => {}
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScanConfig> {
    match path {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ScanConfig::default()),
    }
}

/**
 * Feed a capture file window by window through the scan controller
 */
async fn replay(
    pcap_file: &Path,
    config: ScanConfig,
    connected: Option<Bssid>,
    out_file: Option<PathBuf>,
    print: bool,
) -> anyhow::Result<()> {
    // Replayed data is already complete; nothing to settle.
    let mut provider = CaptureScanProvider::offline(config.replay_window(), Duration::ZERO)
        .with_connected(connected);
    provider.init(Some(AdapterHandle::new(
        pcap_file.to_string_lossy(),
        "capture file",
    )))?;

    let mut controller = ScanController::new(provider, config);
    while !controller.provider().is_exhausted() {
        let cycle = controller.run_cycle().await?;
        if print {
            report::print_cycle(&cycle);
        }
    }

    let cache = controller.cache();
    let cache = cache.read();
    report::print_table(&cache);

    if let Some(out_file) = out_file {
        cache
            .to_parquet(out_file.clone())
            .with_context(|| format!("writing {}", out_file.display()))?;
        println!("Samples written to {}", out_file.display());
    }
    Ok(())
}
