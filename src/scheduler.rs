// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Runs a job once, or registers it on a cron expression and blocks the
//! worker, suppressing overlapping ticks.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::{
    backup::{self, JobReport},
    client::InfluxClient,
    config::JobConfig,
    error::{Error, Result},
};

/// Runs `config` exactly once and returns its report.
pub async fn run_once(config: &JobConfig, source: &InfluxClient, dest: &InfluxClient) -> Result<JobReport> {
    backup::run_job(config, source, dest).await
}

/// Runs `config` once immediately, then re-runs it on
/// `options.incremental.schedule` until `shutdown` resolves. A tick that
/// fires while the previous run is still active is skipped and logged;
/// the in-flight run is always allowed to finish.
pub async fn run_cron(
    config: Arc<JobConfig>,
    source: Arc<InfluxClient>,
    dest: Arc<InfluxClient>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<JobReport> {
    let schedule = config
        .options
        .incremental
        .schedule
        .clone()
        .ok_or_else(|| Error::Scheduling("cron mode requires `options.incremental.schedule`".into()))?;

    let last_report: Arc<RwLock<Option<JobReport>>> = Arc::new(RwLock::new(None));
    let running: Arc<RwLock<bool>> = Arc::new(RwLock::new(false));

    let initial = run_guarded(&config, &source, &dest, &running).await?;
    *last_report.write().await = Some(initial.clone());

    let mut jobscheduler = JobScheduler::new()
        .await
        .map_err(|e| Error::Scheduling(e.to_string()))?;

    // `tokio-cron-scheduler` expects a 6-field expression (seconds
    // first); the configuration grammar is the standard 5-field form, so
    // a leading "0" seconds field is prepended.
    let six_field = format!("0 {schedule}");

    let job_config = config.clone();
    let job_source = source.clone();
    let job_dest = dest.clone();
    let job_running = running.clone();
    let job_last_report = last_report.clone();

    let job = Job::new_async(six_field.as_str(), move |_uuid, _scheduler| {
        let config = job_config.clone();
        let source = job_source.clone();
        let dest = job_dest.clone();
        let running = job_running.clone();
        let last_report = job_last_report.clone();
        Box::pin(async move {
            if *running.read().await {
                warn!(job = %config.name, "previous run still active, skipping this tick");
                return;
            }
            match run_guarded(&config, &source, &dest, &running).await {
                Ok(report) => *last_report.write().await = Some(report),
                Err(e) => warn!(job = %config.name, error = %e, "scheduled run failed"),
            }
        })
    })
    .map_err(|e| Error::Scheduling(e.to_string()))?;

    jobscheduler
        .add(job)
        .await
        .map_err(|e| Error::Scheduling(e.to_string()))?;
    jobscheduler
        .start()
        .await
        .map_err(|e| Error::Scheduling(e.to_string()))?;

    info!(job = %config.name, schedule, "cron scheduler started");
    shutdown.await;
    info!(job = %config.name, "shutdown requested, stopping scheduler after in-flight run");
    jobscheduler
        .shutdown()
        .await
        .map_err(|e| Error::Scheduling(e.to_string()))?;

    // Wait for an in-flight tick to finish before returning, so shutdown
    // never truncates a running transfer mid-chunk.
    while *running.read().await {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    Ok(last_report.read().await.clone().unwrap_or_default())
}

async fn run_guarded(
    config: &JobConfig,
    source: &InfluxClient,
    dest: &InfluxClient,
    running: &Arc<RwLock<bool>>,
) -> Result<JobReport> {
    *running.write().await = true;
    let result = backup::run_job(config, source, dest).await;
    *running.write().await = false;
    result
}
