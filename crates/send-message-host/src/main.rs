// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// send-message host harness.
//
// Replays a scripted method-channel session against a simulated platform and
// prints one JSON line per call as it resolves. Logs go to stderr.

mod session;
mod simulated;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use send_message_core::error::Result;
use send_message_core::BridgeConfig;

use session::Script;

/// Replay a scripted SMS bridge session
#[derive(Parser, Debug)]
#[command(name = "send-message-host")]
#[command(about = "Replays a method-channel session against a simulated SMS platform")]
struct Args {
    /// Session script (JSON)
    script: PathBuf,

    /// Bridge config file (JSON); defaults apply when omitted
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "session failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    let script = Script::load(&args.script)?;
    tracing::info!(
        script = %args.script.display(),
        steps = script.steps.len(),
        channel = %config.channel_name,
        "replaying session"
    );

    for report in session::replay(&script, config) {
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}
