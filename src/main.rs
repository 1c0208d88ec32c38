use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use dpi_matcher::TableMachine;
use dpi_sniffer::{
    capture,
    config::{SnifferConfig, USAGE},
    pipeline::Pipeline,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

/// Scans captured IP payloads against a compiled pattern set and re-injects
/// annotated frames on the output interface.
#[derive(Parser)]
#[clap(name = "dpi-sniffer", version)]
struct Args {
    /// `in:<input-interface> out:<output-interface> rules:<rules file>`, or `auto`
    params: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dpi_sniffer=info,dpi_matcher=info")),
        )
        .init();

    let args = Args::parse();
    let config = match SnifferConfig::from_args(&args.params) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    if let Err(e) = real_main(config).await {
        tracing::error!("process exit: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn real_main(config: SnifferConfig) -> Result<()> {
    let machine = TableMachine::from_catalog(&config.rules)
        .with_context(|| format!("Failed to build matcher from {}", config.rules.display()))?;
    tracing::info!(
        rules = machine.num_rules(),
        states = machine.num_states(),
        "matcher ready"
    );

    let pair = capture::open_pair(&config.input, &config.output)?;
    tracing::info!(
        input = %config.input,
        output = %config.output,
        "capturing; annotated frames go out on the output interface"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_watcher(shutdown.clone())?;

    let pipeline = Pipeline::new(
        machine,
        pair.input,
        pair.output,
        pair.link_header_len,
        shutdown,
    );
    tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .context("capture loop panicked")??;
    Ok(())
}

/// SIGINT, SIGTERM and SIGQUIT all raise the shutdown flag; the capture loop
/// observes it within its read timeout and finishes the in-flight packet.
fn spawn_signal_watcher(shutdown: Arc<AtomicBool>) -> Result<()> {
    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut quit = signal(SignalKind::quit()).context("Failed to install SIGQUIT handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => tracing::info!("interrupted"),
            _ = terminate.recv() => tracing::info!("terminated"),
            _ = quit.recv() => tracing::info!("quitting"),
        }
        shutdown.store(true, Ordering::Relaxed);
    });
    Ok(())
}
