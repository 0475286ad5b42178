//! # bayeux-tail
//!
//! Subscribe to Bayeux channel patterns and print every pushed message to
//! stdout as one JSON object per line. Runs until Ctrl-C, then disconnects.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bayeux_client::{BayeuxClient, Message};
use bayeux_settings::BayeuxSettings;
use clap::Parser;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Tail Bayeux channels.
#[derive(Parser, Debug)]
#[command(name = "bayeux-tail", about = "Print messages pushed on Bayeux channels")]
struct Cli {
    /// Bayeux endpoint, e.g. `https://example.com/cometd`.
    url: String,

    /// Channel pattern to subscribe to (repeatable). `*` matches one
    /// segment, `**` any number.
    #[arg(short, long = "pattern", required = true)]
    patterns: Vec<String>,

    /// JSON extension payload sent with each subscribe.
    #[arg(long)]
    ext: Option<String>,

    /// Settings file (JSON). `BAYEUX_*` environment variables still apply.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter (overrides settings; `RUST_LOG` overrides both).
    #[arg(long)]
    log_level: Option<String>,

    /// Buffer size of the local message channel.
    #[arg(long, default_value = "256")]
    buffer: usize,
}

fn load_settings(path: Option<&Path>) -> Result<BayeuxSettings> {
    match path {
        Some(path) => bayeux_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => bayeux_settings::load_settings().context("Failed to load settings"),
    }
}

fn parse_ext(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|s| serde_json::from_str(s).context("--ext is not valid JSON"))
        .transpose()
}

fn format_line(message: &Message) -> Result<String> {
    serde_json::to_string(message).context("Failed to serialize message")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = load_settings(args.settings.as_deref())?;
    let level = args.log_level.as_deref().unwrap_or(&settings.log_level);
    bayeux_client::logging::init_subscriber(level);

    let ext = parse_ext(args.ext.as_deref())?;
    let client = BayeuxClient::with_reqwest(args.url.clone(), settings);
    let (tx, mut rx) = mpsc::channel(args.buffer.max(1));

    for pattern in &args.patterns {
        client
            .subscribe_ext(pattern, tx.clone(), ext.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {pattern}"))?;
    }
    drop(tx);
    info!(url = %args.url, patterns = ?args.patterns, "tailing");

    let mut stdout = std::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(message) = received else { break };
                let line = format_line(&message)?;
                if writeln!(stdout, "{line}").and_then(|()| stdout.flush()).is_err() {
                    // Reader went away (e.g. `| head`).
                    break;
                }
            }
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("interrupted");
                break;
            }
        }
    }

    if let Err(e) = client.close().await {
        warn!(error = %e, "disconnect failed");
    }
    Ok(())
}
