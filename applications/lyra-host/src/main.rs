//! Lyra Host - line-delimited JSON front end for lyra players
//!
//! Reads one request per line on stdin and writes responses and player
//! events as JSON lines on stdout. Logs go to stderr.
mod host;
mod protocol;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver};
use host::Host;
use lyra_playback::simulated::SimulatedDevices;
use lyra_playback::{DeviceHandle, PlayerConfig};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lyra-host")]
#[command(about = "Drive lyra players over line-delimited JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve requests from stdin
    Serve {
        /// Configuration file path
        #[arg(short, long, env = "LYRA_CONFIG")]
        config: Option<PathBuf>,
        /// Output device offered to players, as ID=NAME
        #[arg(short, long = "device", value_parser = parse_device)]
        devices: Vec<DeviceHandle>,
    },
    /// Print the effective configuration
    Config {
        /// Configuration file path
        #[arg(short, long, env = "LYRA_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lyra_playback=info,lyra_host=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, devices } => serve(config, devices),
        Commands::Config { config } => {
            let config = PlayerConfig::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn serve(config: Option<PathBuf>, devices: Vec<DeviceHandle>) -> anyhow::Result<()> {
    let config = PlayerConfig::load(config.as_deref()).context("Failed to load configuration")?;

    tracing::info!("Starting lyra host");
    tracing::info!("Output devices: {}", devices.len());

    let (out_tx, out_rx) = unbounded();
    let writer = thread::Builder::new()
        .name("lyra-host-writer".to_string())
        .spawn(move || write_lines(&out_rx))
        .context("Failed to start output writer")?;

    let mut host = Host::new(config, Arc::new(SimulatedDevices::new(devices)), out_tx);

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read request")?;
        host.handle_line(&line);
    }

    tracing::info!("Input closed, shutting down");
    // Forwarding threads exit once their players are gone, which ends the writer
    drop(host);

    match writer.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Output writer panicked"),
    }
}

fn write_lines(lines: &Receiver<Value>) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        serde_json::to_writer(&mut out, &line)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }
    Ok(())
}

fn parse_device(arg: &str) -> Result<DeviceHandle, String> {
    match arg.split_once('=') {
        Some((id, name)) if !id.is_empty() => Ok(DeviceHandle::new(id, name)),
        _ => Err(format!("expected ID=NAME, got '{arg}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_arguments() {
        let device = parse_device("{0.0.0}.{abc}=Speakers").unwrap();
        assert_eq!(device.id, "{0.0.0}.{abc}");
        assert_eq!(device.name, "Speakers");
        assert!(parse_device("no-separator").is_err());
        assert!(parse_device("=Name").is_err());
    }

    #[test]
    fn cli_parses_serve() {
        let cli = Cli::try_parse_from(["lyra-host", "serve", "--device", "d1=One", "-d", "d2=Two"])
            .unwrap();
        match cli.command {
            Commands::Serve { devices, .. } => assert_eq!(devices.len(), 2),
            Commands::Config { .. } => panic!("expected serve"),
        }
    }
}
