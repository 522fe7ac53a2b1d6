// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Time/range planning: resolving `[start, end)` from mode +
//! destination state, and splitting it into chunks bounded by
//! `chunk_days`.

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::{JobConfig, Mode},
    error::{Error, Result},
    model::RangePlan,
};

/// Parses a relative duration string with suffixes `s,m,h,d,w,M,y`.
/// Case-sensitive: `m` is minutes, `M` is months.
pub fn parse_relative_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::Config("empty duration string".into()));
    }
    let (digits, suffix) = s.split_at(
        s.find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| Error::Config(format!("duration `{s}` has no unit suffix")))?,
    );
    let n: i64 = digits
        .parse()
        .map_err(|_| Error::Config(format!("duration `{s}` has no numeric magnitude")))?;
    let duration = match suffix {
        "s" => Duration::seconds(n),
        "m" => Duration::minutes(n),
        "h" => Duration::hours(n),
        "d" => Duration::days(n),
        "w" => Duration::weeks(n),
        "M" => Duration::days(n * 30),
        "y" => Duration::days(n * 365),
        other => return Err(Error::Config(format!("unknown duration suffix `{other}`"))),
    };
    Ok(duration)
}

/// Inputs to range resolution, gathered by the caller from
/// config plus destination/source state.
pub struct RangeInputs<'a> {
    pub config: &'a JobConfig,
    /// The destination's last known timestamp for this measurement, if
    /// any (incremental mode resume point).
    pub dest_last_ts: Option<DateTime<Utc>>,
    /// The source's earliest known timestamp for this measurement, if any
    /// (incremental mode cold-start fallback).
    pub source_first_ts: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

/// Resolves the `[start, end)` range to copy. Returns `None` when
/// `start >= end` (an empty plan).
pub fn resolve_range(inputs: &RangeInputs) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    let options = &inputs.config.options;
    let backup_period = options
        .backup_period
        .as_deref()
        .map(parse_relative_duration)
        .transpose()?;

    let (start, end) = match options.mode {
        Mode::Range => {
            let start = options
                .start_date
                .ok_or_else(|| Error::Config("`options.start_date` is required in range mode".into()))?;
            let end = match options.end_date {
                Some(end) => end,
                None => match backup_period {
                    Some(period) => start + period,
                    None => {
                        return Err(Error::Config(
                            "range mode requires `options.end_date` or `options.backup_period`".into(),
                        ))
                    }
                },
            };
            (start, end)
        }
        Mode::Incremental => {
            let end = inputs.now;
            // `dest_last_ts` was already written in a prior run; nudge past
            // it by one nanosecond so chunk lower bounds (`time >= t0`)
            // never re-select and rewrite that exact boundary point.
            let mut start = match inputs.dest_last_ts {
                Some(ts) => ts + Duration::nanoseconds(1),
                None => match inputs.source_first_ts {
                    Some(ts) => ts,
                    None => inputs.now - Duration::days(options.incremental.fallback_days),
                },
            };
            if let Some(period) = backup_period {
                let clamp = end - period;
                if clamp > start {
                    start = clamp;
                }
            }
            (start, end)
        }
    };

    if start >= end {
        return Ok(None);
    }
    Ok(Some((start, end)))
}

/// Splits `[start, end)` into contiguous half-open chunks of width
/// `chunk_days`, aligned to `start` (not calendar midnight), the last
/// chunk possibly shorter.
pub fn plan_chunks(start: DateTime<Utc>, end: DateTime<Utc>, chunk_days: i64) -> RangePlan {
    if start >= end {
        return Vec::new();
    }
    let width = Duration::days(chunk_days.max(1));
    let mut plan = Vec::new();
    let mut cur = start;
    while cur < end {
        let next = (cur + width).min(end);
        plan.push((cur, next));
        cur = next;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_all_suffixes() {
        assert_eq!(parse_relative_duration("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_relative_duration("5m").unwrap(), Duration::minutes(5));
        assert_eq!(parse_relative_duration("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_relative_duration("1w").unwrap(), Duration::weeks(1));
        assert!(parse_relative_duration("3x").is_err());
    }

    #[test]
    fn chunk_cover_is_exact_and_contiguous() {
        let start = ts("2024-01-01T00:00:00Z");
        let end = ts("2024-01-08T00:00:00Z");
        let plan = plan_chunks(start, end, 7);
        assert_eq!(plan, vec![(start, end)]);

        let plan = plan_chunks(start, end, 1);
        assert_eq!(plan.len(), 7);
        assert_eq!(plan[0].0, start);
        assert_eq!(plan.last().unwrap().1, end);
        for w in plan.windows(2) {
            assert_eq!(w[0].1, w[1].0, "no gap or overlap between chunks");
        }
    }

    #[test]
    fn empty_range_yields_empty_plan() {
        let t = ts("2024-01-01T00:00:00Z");
        assert_eq!(plan_chunks(t, t, 7), Vec::new());
        assert_eq!(plan_chunks(t + Duration::days(1), t, 7), Vec::new());
    }

    #[test]
    fn shorter_last_chunk() {
        let start = ts("2024-01-01T00:00:00Z");
        let end = ts("2024-01-09T12:00:00Z");
        let plan = plan_chunks(start, end, 7);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].1, end);
        assert!(plan[1].1 - plan[1].0 < Duration::days(7));
    }

    #[test]
    fn timestamp_equality_ignores_offsets() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ts("2024-01-01T00:00:00Z"), a);
    }
}
