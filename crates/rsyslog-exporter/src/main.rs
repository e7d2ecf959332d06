// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod config;
mod server;
mod tls;

use std::sync::Arc;

use anyhow::anyhow;
use prometheus::Registry;
use tokio::io::BufReader;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use rsyslog_pstats::{Ingestor, PointStore, ScrapeAdapter, Termination};

use crate::config::ExporterConfig;

#[tokio::main]
pub async fn main() {
    let config = match ExporterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    let env_filter = format!("h2=off,hyper=off,{}", config.log_level);

    let filter = match EnvFilter::try_new(env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Could not parse log level {}: {e}", config.log_level);
            std::process::exit(1);
        }
    };
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Setting default subscriber failed: {e}");
    }

    debug!("Logging subsystem enabled");

    // Exit explicitly: a pending stdin read would otherwise hold up runtime shutdown.
    match run(config).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

/// Runs until input ends, the server fails or an interrupt arrives.
async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    let store = Arc::new(PointStore::new());
    let ingestor = Ingestor::new(Arc::clone(&store), config.silent);
    let registry = Registry::new();
    registry.register(Box::new(ScrapeAdapter::new(store)?))?;

    let acceptor = config.tls.as_ref().map(tls::acceptor).transpose()?;
    let listener = tokio::net::TcpListener::bind(config.listen_address).await?;
    if acceptor.is_some() {
        info!("Listening for TLS on {}", config.listen_address);
    } else {
        info!("Listening on {}", config.listen_address);
    }

    let ingest = tokio::spawn(ingestor.run(BufReader::new(tokio::io::stdin())));
    let server = server::serve(
        listener,
        Arc::new(registry),
        Arc::from(config.telemetry_path),
        acceptor,
    );

    tokio::select! {
        termination = ingest => match termination {
            Ok(Termination::EndOfInput) => info!("input ended, exiting normally"),
            Ok(Termination::ReadError(e)) => error!("error reading input: {e}"),
            Err(e) => error!("Ingestion task failed: {e}"),
        },
        result = server => result?,
        result = tokio::signal::ctrl_c() => on_interrupt(result)?,
    }
    Ok(())
}

/// An interrupt ends the run cleanly; failing to listen for one is fatal.
fn on_interrupt(result: std::io::Result<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => {
            info!("interrupt received, exiting");
            Ok(())
        }
        Err(e) => Err(anyhow!("Failed to listen for interrupt signal: {e}")),
    }
}
