mod commands;
mod server;
mod ui;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "latency-probe")]
#[command(about = "Measures DNS, TCP, TLS and total request latency of HTTP endpoints", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Write logs to this file (rotated daily) instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the configured URLs forever and serve /metrics
    Run {
        /// Config file (JSON, YAML or TOML). Default locations are searched when omitted
        #[arg(short, long, env = "LATENCY_PROBE_CONFIG")]
        config: Option<PathBuf>,

        /// Override the listen port from the config (":9100", "9100" or "host:port")
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Load and validate a config file
    Validate {
        /// Config file. Default locations are searched when omitted
        #[arg(short, long, env = "LATENCY_PROBE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Probe URLs once and print the phase breakdown
    Probe {
        /// URLs to probe, in order
        #[arg(required = true)]
        urls: Vec<String>,

        /// Per-request timeout (e.g. "1s", "500ms")
        #[arg(short, long, default_value = "1s", value_parser = humantime::parse_duration)]
        timeout: Duration,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli)?;

    match cli.command {
        Commands::Run { config, port } => {
            commands::run::execute(config, port).await?;
        }

        Commands::Validate { config } => {
            commands::validate::execute(config).await?;
        }

        Commands::Probe { urls, timeout, json } => {
            commands::probe::execute(urls, timeout, json).await?;
        }
    }

    Ok(())
}

/// Installs the global subscriber. The returned guard flushes the file
/// writer and must live until exit.
fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard) = match &cli.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("--log-file must name a file: {}", path.display()))?;
            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer);

    match cli.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(cli.log_file.is_none()).try_init(),
    }
    .map_err(|e| anyhow!(e))
    .context("failed to install log subscriber")?;

    Ok(guard)
}
