use std::path::PathBuf;

use cd11::prelude::*;
use cd11::{ConfigError, logging};
use clap::Parser;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "cd11-receiver")]
#[command(about = "Receive CD-1.1 frame streams and acknowledge sequence gaps")]
struct Cli {
    #[arg(long, help = "Config file path")]
    config: Option<PathBuf>,

    #[arg(long, help = "Listen address (overrides config)")]
    listen: Option<String>,

    #[arg(long, help = "Log filter when RUST_LOG is unset (overrides config)")]
    log_filter: Option<String>,

    #[arg(long, help = "Print the effective configuration as TOML and exit")]
    print_config: bool,
}

fn load_config(cli: &Cli) -> Result<ReceiverConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => ReceiverConfig::load(path)?,
        None => ReceiverConfig::default(),
    };
    if let Some(listen) = &cli.listen {
        config.listen_address.clone_from(listen);
    }
    if let Some(filter) = &cli.log_filter {
        config.log_filter.clone_from(filter);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Cd11Error> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    logging::init(&config.log_filter)?;

    let (events, mut frames) = mpsc::channel(1024);
    let server = Cd11Server::bind(config, events).await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }
    let receiver = server.receiver();

    // Stand-in for storage and routing: log what arrives.
    tokio::spawn(async move {
        while let Some(event) = frames.recv().await {
            match event {
                ReceiverEvent::Frame { connection, frame } => tracing::info!(
                    %connection,
                    frame_type = %frame.frame_type(),
                    seq = frame.sequence_number(),
                    "frame received"
                ),
                ReceiverEvent::Retransmit { connection, request } => tracing::info!(
                    %connection,
                    frame_set = %request.frame_set,
                    scheduled = request.scheduled.len(),
                    unrecoverable = request.unrecoverable.len(),
                    "retransmit requested"
                ),
                ReceiverEvent::Rejected { connection, error } => {
                    tracing::warn!(%connection, error = %error, "frame rejected");
                }
                ReceiverEvent::Closed { connection, error } => {
                    tracing::info!(%connection, ?error, "connection closed");
                }
            }
        }
    });

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            receiver.shutdown();
            Ok(())
        }
    }
}
