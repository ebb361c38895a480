//! `nfdc`: command-line management for a running rNFD daemon.
//!
//! Commands are `nfdc <noun> <verb> [key=value…]` and travel to the
//! daemon's control socket as one JSON request per line.

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use rust_rnfd_common::Error;
use rust_rnfd_fwd::mgmt::{ControlRequest, ControlResponse};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

mod commands;

/// rNFD management CLI
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long)]
    verbose: bool,

    /// Path to the daemon's control socket
    #[clap(short, long, default_value = "/run/rnfd.sock")]
    socket: String,

    /// Command tokens: <noun> <verb> [key=value…]
    #[clap(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();

    let request = match commands::parse_command(&cli.command) {
        Ok(request) => request,
        Err(e @ Error::NoSuchCommand(_)) => {
            eprintln!("{}", e);
            eprintln!("{}", commands::usage());
            return ExitCode::from(2);
        }
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    match execute(&cli.socket, &request).await {
        Ok(response) if response.ok => {
            if let Some(body) = response.body {
                println!("{}", serde_json::to_string_pretty(&body).expect("body is JSON"));
            }
            ExitCode::SUCCESS
        }
        Ok(response) => {
            eprintln!("{}", response.error.unwrap_or_else(|| "command failed".into()));
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(socket: &str, request: &ControlRequest) -> Result<ControlResponse> {
    debug!("sending {} {} to {}", request.noun, request.verb, socket);
    let stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("connecting to control socket {}", socket))?;
    let (read_half, mut write_half) = stream.into_split();

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;

    let mut reader = BufReader::new(read_half);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .await
        .context("reading control response")?;
    if response_line.is_empty() {
        anyhow::bail!("daemon closed the control connection");
    }

    let response: ControlResponse =
        serde_json::from_str(response_line.trim_end()).context("parsing control response")?;
    Ok(response)
}
