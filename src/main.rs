// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Entry point: dispatches to the orchestrator (scan `CONFIG_DIR`) or a
//! single job worker (`--config <file>`).

mod backup;
mod client;
mod config;
mod engine;
mod error;
mod filter;
mod logging;
mod model;
mod orchestrator;
mod planner;
mod scheduler;

use std::{process::ExitCode, time::Duration};

use clap::Parser;

use crate::{
    client::InfluxClient,
    config::JobConfig,
    error::{Error, Result},
};

/// Scheduled time-series replication between InfluxDB 1.x instances.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct ClArgs {
    /// Run a single job from this configuration file instead of scanning
    /// `CONFIG_DIR` for every job.
    #[clap(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let args = ClArgs::parse();

    std::panic::set_hook(Box::new(|p| {
        tracing::error!("{p}");
    }));

    // Single-job mode initializes logging from the job's own
    // `options.log_level` once the config is loaded; the orchestrator has
    // no config of its own to read one from, so it uses the default.
    let result = match &args.config {
        Some(path) => run_worker(path).await,
        None => {
            logging::init(config::LogLevel::Info);
            orchestrator::run().await
        }
    };

    match result {
        Ok(code) => exit_code(code),
        Err(e) => {
            tracing::error!("{e}");
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

/// Runs one job end to end and returns its process exit code:
/// `0` success, `1` fatal init error, `2` partial.
async fn run_worker(config_path: &str) -> Result<i32> {
    let config = JobConfig::from_file(config_path)?;
    logging::init(config.options.log_level);

    let source = InfluxClient::new(
        config.source.url.clone(),
        &config.source.user,
        &config.source.password,
        Duration::from_secs(config.options.timeout_client),
    );
    let dest = InfluxClient::new(
        config.destination.url.clone(),
        &config.destination.user,
        &config.destination.password,
        Duration::from_secs(config.options.timeout_client),
    );

    source.ping().await.map_err(|e| Error::Connection(format!("source unreachable: {e}")))?;
    dest.ping().await.map_err(|e| Error::Connection(format!("destination unreachable: {e}")))?;

    let report = if config.options.incremental.schedule.is_some() {
        scheduler::run_cron(
            std::sync::Arc::new(config),
            std::sync::Arc::new(source),
            std::sync::Arc::new(dest),
            shutdown_signal_listener(),
        )
        .await?
    } else {
        scheduler::run_once(&config, &source, &dest).await?
    };

    Ok(report.exit_code())
}

async fn shutdown_signal_listener() {
    #[cfg(unix)]
    {
        use futures::future;
        use tokio::signal::unix::{signal, SignalKind};

        let mut signals = [SignalKind::interrupt(), SignalKind::terminate()]
            .iter()
            .map(|kind| signal(*kind).expect("failed to install signal handler"))
            .collect::<Vec<_>>();
        let signal_futs = signals.iter_mut().map(|s| Box::pin(s.recv()));
        future::select_all(signal_futs).await;
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
