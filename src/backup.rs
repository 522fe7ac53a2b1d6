// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Backup Manager (C6): drives one job end to end, one measurement at a
//! time, through:
//!
//! ```text
//! READY → PLAN → (empty? → DONE) → CHUNK_LOOP ⇄ RETRY → WRITTEN → DONE
//!                                          ↘ FAILED
//! ```

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    client::InfluxClient,
    config::JobConfig,
    engine,
    error::Result,
    filter,
    planner::{self, RangeInputs},
};

/// Per-measurement outcome, folded into the job summary.
#[derive(Debug, Clone)]
pub struct MeasurementReport {
    pub database: String,
    pub measurement: String,
    pub status: MeasurementStatus,
    pub points_read: usize,
    pub points_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementStatus {
    Done,
    Skipped,
    Failed,
}

/// Totals and per-measurement ledger for one job run, emitted as the
/// job's summary record.
#[derive(Debug, Default, Clone)]
pub struct JobReport {
    pub measurements: Vec<MeasurementReport>,
}

impl JobReport {
    pub fn points_read(&self) -> usize {
        self.measurements.iter().map(|m| m.points_read).sum()
    }

    pub fn points_written(&self) -> usize {
        self.measurements.iter().map(|m| m.points_written).sum()
    }

    pub fn any_failed(&self) -> bool {
        self.measurements.iter().any(|m| m.status == MeasurementStatus::Failed)
    }

    /// Process exit code for this run: `0` clean, `2` partial.
    pub fn exit_code(&self) -> i32 {
        if self.any_failed() {
            2
        } else {
            0
        }
    }
}

/// Runs one job to completion: resolves database mappings, ensures
/// destination databases exist, and drives C3-C5 for every measurement
/// that survives C4's filters.
pub async fn run_job(config: &JobConfig, source: &InfluxClient, dest: &InfluxClient) -> Result<JobReport> {
    let mut report = JobReport::default();

    let source_databases = source.databases().await?;
    let mappings = config.resolve_mappings(&source_databases);

    for mapping in &mappings {
        dest.ensure_database(&mapping.dest_name).await?;

        let measurements = match source.measurements(&mapping.source_name).await {
            Ok(m) => m,
            Err(e) => {
                error!(database = %mapping.source_name, error = %e, "failed to enumerate measurements");
                return Err(e);
            }
        };

        for measurement in measurements {
            if !filter::measurement_allowed(config, &measurement) {
                continue;
            }

            match run_measurement(config, source, &mapping.source_name, dest, &mapping.dest_name, &measurement).await
            {
                Ok(Some(outcome)) => report.measurements.push(outcome),
                Ok(None) => report.measurements.push(MeasurementReport {
                    database: mapping.dest_name.clone(),
                    measurement: measurement.clone(),
                    status: MeasurementStatus::Skipped,
                    points_read: 0,
                    points_written: 0,
                }),
                Err(e) => {
                    warn!(
                        database = %mapping.dest_name,
                        measurement,
                        error = %e,
                        "measurement failed, continuing with the rest of the job"
                    );
                    report.measurements.push(MeasurementReport {
                        database: mapping.dest_name.clone(),
                        measurement,
                        status: MeasurementStatus::Failed,
                        points_read: 0,
                        points_written: 0,
                    });
                }
            }
        }
    }

    info!(
        points_read = report.points_read(),
        points_written = report.points_written(),
        measurements = report.measurements.len(),
        failed = report.measurements.iter().filter(|m| m.status == MeasurementStatus::Failed).count(),
        "job summary"
    );

    Ok(report)
}

/// Drives one measurement through PLAN -> CHUNK_LOOP -> WRITTEN/DONE.
/// Returns `Ok(None)` when the measurement is obsolete or its plan is
/// empty (both are "DONE", not reported as transferred).
async fn run_measurement(
    config: &JobConfig,
    source: &InfluxClient,
    source_db: &str,
    dest: &InfluxClient,
    dest_db: &str,
    measurement: &str,
) -> Result<Option<MeasurementReport>> {
    let now = Utc::now();

    let configured_fields = source.field_keys(source_db, measurement).await?;
    let configured_fields = filter::filter_fields(config, measurement, &configured_fields);
    if configured_fields.is_empty() {
        return Ok(None);
    }

    let dest_last_ts = dest.last_timestamp(dest_db, measurement).await?;

    let surviving_fields = filter::prune_obsolete_fields(
        config,
        dest,
        dest_db,
        measurement,
        configured_fields.clone(),
        dest_last_ts.is_some(),
        now,
    )
    .await?;
    if filter::measurement_is_obsolete(&configured_fields, &surviving_fields) {
        info!(measurement, "measurement obsolete, skipping");
        return Ok(None);
    }

    let source_first_ts = source.first_timestamp(source_db, measurement).await?;

    let range = planner::resolve_range(&RangeInputs {
        config,
        dest_last_ts,
        source_first_ts,
        now,
    })?;

    let Some((start, end)) = range else {
        return Ok(None);
    };

    let plan = planner::plan_chunks(start, end, config.options.chunk_days);
    if plan.is_empty() {
        return Ok(None);
    }

    let outcome = engine::transfer_measurement(
        source,
        source_db,
        dest,
        dest_db,
        measurement,
        &surviving_fields,
        &plan,
        &config.source.group_by,
        config.options.retries,
        std::time::Duration::from_secs(config.options.retry_delay),
    )
    .await?;

    Ok(Some(MeasurementReport {
        database: dest_db.to_string(),
        measurement: measurement.to_string(),
        status: MeasurementStatus::Done,
        points_read: outcome.points_read,
        points_written: outcome.points_written,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_is_clean_when_nothing_failed() {
        let report = JobReport {
            measurements: vec![MeasurementReport {
                database: "bk_telegraf".into(),
                measurement: "cpu".into(),
                status: MeasurementStatus::Done,
                points_read: 3,
                points_written: 3,
            }],
        };
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.points_written(), 3);
    }

    #[test]
    fn exit_code_is_partial_when_any_measurement_failed() {
        let report = JobReport {
            measurements: vec![
                MeasurementReport {
                    database: "bk_telegraf".into(),
                    measurement: "cpu".into(),
                    status: MeasurementStatus::Done,
                    points_read: 1,
                    points_written: 1,
                },
                MeasurementReport {
                    database: "bk_telegraf".into(),
                    measurement: "mem".into(),
                    status: MeasurementStatus::Failed,
                    points_read: 0,
                    points_written: 0,
                },
            ],
        };
        assert_eq!(report.exit_code(), 2);
        assert!(report.any_failed());
    }
}
