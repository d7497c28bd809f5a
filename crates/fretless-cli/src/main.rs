mod config;
mod script;

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fretless_midi::{ByteSink, Diagnostics, GestureEncoder};
use tracing::{error, info};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "fretless-cli", about = "Demo driver for the fretless gesture-to-MIDI encoder")]
struct Args {
    /// Path to a hint configuration file
    #[arg(short, long, default_value = "config/fretless.toml")]
    config: PathBuf,

    /// Path to a gesture script; reads stdin if omitted
    #[arg(short, long)]
    script: Option<PathBuf>,
}

/// Writes emitted MIDI bytes as hex to stdout, one byte per line.
struct StdoutSink;

impl ByteSink for StdoutSink {
    fn put_byte(&mut self, byte: u8) {
        println!("{byte:02x}");
    }

    fn flush(&mut self) {
        println!("-- flush --");
    }
}

/// Forwards the three diagnostic callbacks to `tracing`.
struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn fail(&mut self, message: &str) {
        error!("{message}");
    }

    fn passed(&mut self) {
        tracing::debug!("self-test passed at quiescence");
    }

    fn log(&mut self, message: &str) {
        info!("{message}");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config: Config = match std::fs::read_to_string(&args.config) {
        Ok(text) => toml::from_str(&text).map_err(|e| {
            error!("failed to parse config {:?}: {e}", args.config);
            e
        })?,
        Err(e) => {
            info!("no config at {:?} ({e}), using defaults", args.config);
            Config::default()
        }
    };

    let script = match &args.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {path:?}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read script from stdin")?;
            buf
        }
    };

    let mut encoder = GestureEncoder::new(StdoutSink, TracingDiagnostics);
    encoder.set_channel_base(config.hints.channel_base);
    encoder.set_channel_span(config.hints.channel_span);
    encoder.set_channel_bend_semis(config.hints.bend_semis);
    encoder.set_suppress_bends(config.hints.suppress_bends);
    encoder.boot();

    info!(
        channel_base = config.hints.channel_base,
        channel_span = config.hints.channel_span,
        bend_semis = config.hints.bend_semis,
        "fretless encoder booted"
    );

    script::run(&mut encoder, &script)?;
    encoder.flush();

    Ok(())
}
