// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Transfer Engine (C5): per-(measurement, chunk) query, post-processing,
//! and retrying batched writes.

use tracing::{info, warn};

use crate::{
    client::InfluxClient,
    error::Result,
    model::{Chunk, Field, Point},
};

fn default_batch_size() -> usize {
    5_000
}

/// Result of copying one chunk: how many points were read and written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub points_read: usize,
    pub points_written: usize,
}

/// Queries one (measurement, chunk) from `source`, then writes the
/// result to `dest_db` on `dest`, retrying the write up to `retries`
/// times with a fixed `retry_delay` on [`Error::Transient`]. An empty
/// query result is not an error and performs no write.
pub async fn transfer_chunk(
    source: &InfluxClient,
    source_db: &str,
    dest: &InfluxClient,
    dest_db: &str,
    measurement: &str,
    fields: &[Field],
    chunk: Chunk,
    group_by: &str,
    retries: u32,
    retry_delay: std::time::Duration,
) -> Result<ChunkOutcome> {
    let (t0, t1) = chunk;
    let points = source
        .query_chunk(source_db, measurement, fields, t0, t1, group_by)
        .await?;

    if points.is_empty() {
        return Ok(ChunkOutcome::default());
    }

    let written = write_with_retry(dest, dest_db, &points, default_batch_size(), retries, retry_delay).await?;

    Ok(ChunkOutcome {
        points_read: points.len(),
        points_written: written,
    })
}

async fn write_with_retry(
    dest: &InfluxClient,
    dest_db: &str,
    points: &[Point],
    batch_size: usize,
    retries: u32,
    retry_delay: std::time::Duration,
) -> Result<usize> {
    let mut attempt = 0;
    loop {
        match dest.write_points(dest_db, points, batch_size).await {
            Ok(()) => return Ok(points.len()),
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!(
                    dest_db,
                    attempt,
                    retries,
                    error = %e,
                    "write failed, retrying after backoff"
                );
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Copies every chunk of `plan` for one measurement, in increasing time
/// order, so the destination's max timestamp stays monotonically
/// non-decreasing. Stops and returns the first error
/// a chunk raises after exhausting retries, letting the caller (C6)
/// promote it to a measurement-level failure without aborting the job.
pub async fn transfer_measurement(
    source: &InfluxClient,
    source_db: &str,
    dest: &InfluxClient,
    dest_db: &str,
    measurement: &str,
    fields: &[Field],
    plan: &[Chunk],
    group_by: &str,
    retries: u32,
    retry_delay: std::time::Duration,
) -> Result<ChunkOutcome> {
    let mut totals = ChunkOutcome::default();
    for &chunk in plan {
        let outcome = transfer_chunk(
            source,
            source_db,
            dest,
            dest_db,
            measurement,
            fields,
            chunk,
            group_by,
            retries,
            retry_delay,
        )
        .await?;
        totals.points_read += outcome.points_read;
        totals.points_written += outcome.points_written;
        info!(
            measurement,
            chunk_start = %chunk.0,
            chunk_end = %chunk.1,
            points_written = outcome.points_written,
            "chunk transferred"
        );
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_outcome_defaults_to_zero() {
        assert_eq!(ChunkOutcome::default(), ChunkOutcome { points_read: 0, points_written: 0 });
    }
}
