// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed wrapper over the InfluxDB 1.x HTTP query/write API.

use std::{collections::HashMap, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use influxdb::{Client, Query as InfluxQuery, Timestamp as InfluxTimestamp, WriteQuery};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    model::{Field, FieldKind, FieldValue, Point},
};

/// A connection to one InfluxDB 1.x endpoint. The client switches
/// database context per call rather than holding one connection per
/// database.
#[derive(Clone, Debug)]
pub struct InfluxClient {
    base_url: String,
    user: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl InfluxClient {
    pub fn new(url: impl Into<String>, user: &str, password: &str, timeout: Duration) -> Self {
        Self {
            base_url: url.into(),
            user: (!user.is_empty()).then(|| user.to_string()),
            password: (!password.is_empty()).then(|| password.to_string()),
            timeout,
        }
    }

    /// Builds an `influxdb::Client` scoped to `db`, carrying auth.
    fn client_for(&self, db: &str) -> Client {
        let mut client = Client::new(&self.base_url, db);
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            client = client.with_auth(user, password);
        }
        client
    }

    /// Classifies a raw `influxdb` crate error into one of this crate's
    /// error kinds by inspecting its message, since the crate's error
    /// enum does not expose a structured status code.
    fn classify(err: influxdb::Error) -> Error {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("404") {
            Error::Permanent(msg)
        } else if lower.contains("400")
            || lower.contains("invalid")
            || lower.contains("syntax")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
        {
            Error::Permanent(msg)
        } else if lower.contains("deserial") || lower.contains("parse") {
            Error::Data(msg)
        } else {
            Error::Transient(msg)
        }
    }

    /// Runs `fut`, bounding it by the configured client timeout. A timeout
    /// or transport failure becomes `kind_on_timeout`; anything the
    /// request itself returned is classified via [`Self::classify`].
    async fn with_timeout<T, Fut>(&self, kind_on_timeout: impl Fn(String) -> Error, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, influxdb::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(Self::classify(e)),
            Err(_) => Err(kind_on_timeout(format!(
                "request to {} timed out after {:?}",
                self.base_url, self.timeout
            ))),
        }
    }

    /// Verifies reachability; timeouts and non-2xx responses surface as
    /// [`Error::Connection`].
    pub async fn ping(&self) -> Result<()> {
        self.with_timeout(Error::Connection, self.client_for("").ping())
            .await?;
        Ok(())
    }

    /// Lists every database name, including `_internal`; callers exclude
    /// it where required.
    pub async fn databases(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Row {
            name: String,
        }
        let query = <dyn InfluxQuery>::raw_read_query("SHOW DATABASES");
        let mut result = self
            .with_timeout(Error::Transient, self.client_for("").json_query(query))
            .await?;
        let rows: Vec<Row> = result
            .deserialize_next::<Row>()
            .map_err(Self::classify)?
            .series
            .into_iter()
            .flat_map(|s| s.values)
            .collect();
        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    pub async fn measurements(&self, db: &str) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Row {
            name: String,
        }
        let query = <dyn InfluxQuery>::raw_read_query("SHOW MEASUREMENTS");
        let mut result = self
            .with_timeout(Error::Transient, self.client_for(db).json_query(query))
            .await?;
        let rows: Vec<Row> = result
            .deserialize_next::<Row>()
            .map_err(Self::classify)?
            .series
            .into_iter()
            .flat_map(|s| s.values)
            .collect();
        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    /// Returns `[{name, kind}]` for `measurement`, with Influx field types
    /// mapped to [`FieldKind`].
    pub async fn field_keys(&self, db: &str, measurement: &str) -> Result<Vec<Field>> {
        #[derive(Deserialize)]
        struct Row {
            #[serde(rename = "fieldKey")]
            field_key: String,
            #[serde(rename = "fieldType")]
            field_type: String,
        }
        let query =
            <dyn InfluxQuery>::raw_read_query(format!(r#"SHOW FIELD KEYS FROM "{measurement}""#));
        let mut result = self
            .with_timeout(Error::Transient, self.client_for(db).json_query(query))
            .await?;
        let rows: Vec<Row> = result
            .deserialize_next::<Row>()
            .map_err(Self::classify)?
            .series
            .into_iter()
            .flat_map(|s| s.values)
            .collect();
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                FieldKind::from_influx_type(&r.field_type).map(|kind| Field {
                    name: r.field_key,
                    kind,
                })
            })
            .collect())
    }

    async fn single_timestamp(&self, db: &str, query: String) -> Result<Option<DateTime<Utc>>> {
        #[derive(Deserialize)]
        struct Row {
            time: String,
        }
        let query = <dyn InfluxQuery>::raw_read_query(query);
        let mut result = self
            .with_timeout(Error::Transient, self.client_for(db).json_query(query))
            .await?;
        let series = result.deserialize_next::<Row>().map_err(Self::classify)?.series;
        let Some(serie) = series.into_iter().next() else {
            return Ok(None);
        };
        let Some(row) = serie.values.into_iter().next() else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&row.time)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| Error::Data(format!("malformed timestamp `{}`: {e}", row.time)))
    }

    /// The measurement's earliest timestamp, or `None` if it is empty.
    pub async fn first_timestamp(&self, db: &str, measurement: &str) -> Result<Option<DateTime<Utc>>> {
        self.single_timestamp(
            db,
            format!(r#"SELECT * FROM "{measurement}" ORDER BY time ASC LIMIT 1"#),
        )
        .await
    }

    /// The measurement's latest timestamp, or `None` if it is empty.
    pub async fn last_timestamp(&self, db: &str, measurement: &str) -> Result<Option<DateTime<Utc>>> {
        self.single_timestamp(
            db,
            format!(r#"SELECT * FROM "{measurement}" ORDER BY time DESC LIMIT 1"#),
        )
        .await
    }

    /// The latest timestamp at which `field` carries a value, used for
    /// per-field obsolescence checks.
    pub async fn last_field_timestamp(
        &self,
        db: &str,
        measurement: &str,
        field: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        self.single_timestamp(
            db,
            format!(r#"SELECT last("{field}") FROM "{measurement}""#),
        )
        .await
    }

    /// Executes the read query for one (measurement, chunk) and returns
    /// rows keyed by `(timestamp, tag set)`, with non-finite numeric
    /// cells already dropped. Issues at most two sub-queries: one
    /// `mean()` over the numeric fields, one `last()` over the string
    /// and boolean fields together (§4.5). When `group_by` is empty,
    /// aggregation is omitted entirely and raw field values are selected
    /// instead.
    pub async fn query_chunk(
        &self,
        db: &str,
        measurement: &str,
        fields: &[Field],
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
        group_by: &str,
    ) -> Result<Vec<Point>> {
        let mut rows: HashMap<(DateTime<Utc>, Vec<(String, String)>), Point> = HashMap::new();
        let mut dropped_non_finite = 0usize;
        let aggregated = !group_by.is_empty();

        let numeric: Vec<&Field> = fields.iter().filter(|f| f.kind == FieldKind::Numeric).collect();
        let non_numeric: Vec<&Field> = fields.iter().filter(|f| f.kind != FieldKind::Numeric).collect();

        for subset in [numeric, non_numeric] {
            if subset.is_empty() {
                continue;
            }
            let select = subset
                .iter()
                .map(|f| match aggregated {
                    true => format!(r#"{}("{}")"#, f.kind.aggregation_fn(), f.name),
                    false => format!(r#""{}""#, f.name),
                })
                .collect::<Vec<_>>()
                .join(", ");
            let group_clause = if aggregated {
                format!(" GROUP BY time({group_by}), *")
            } else {
                String::new()
            };
            let sql = format!(
                r#"SELECT {select} FROM "{measurement}" WHERE time >= '{}' AND time < '{}'{group_clause}"#,
                t0.to_rfc3339(),
                t1.to_rfc3339(),
            );
            debug!(measurement, %sql, "querying chunk");
            let query = <dyn InfluxQuery>::raw_read_query(sql);
            let mut result = self
                .with_timeout(Error::Transient, self.client_for(db).json_query(query))
                .await?;

            #[derive(Deserialize)]
            struct Row {
                time: String,
                #[serde(flatten)]
                tags: HashMap<String, serde_json::Value>,
            }

            let series = match result.deserialize_next::<Row>() {
                Ok(r) => r.series,
                Err(e) => {
                    warn!(measurement, error = %e, "malformed query response, treating as empty");
                    continue;
                }
            };

            for serie in series {
                for row in serie.values {
                    let ts = match DateTime::parse_from_rfc3339(&row.time) {
                        Ok(ts) => ts.with_timezone(&Utc),
                        Err(_) => continue,
                    };
                    let mut tags = Vec::new();
                    let mut point_fields = Vec::new();
                    for (col, value) in row.tags {
                        let field_name = if aggregated {
                            col.strip_prefix("mean_").or_else(|| col.strip_prefix("last_"))
                        } else {
                            Some(col.as_str())
                        };
                        let matched = field_name.and_then(|name| subset.iter().find(|f| f.name == name));
                        if let Some(field) = matched {
                            match field_value_from_json(field.kind, &value) {
                                Some(fv) => {
                                    if fv.is_non_finite() {
                                        dropped_non_finite += 1;
                                    } else {
                                        point_fields.push((field.name.clone(), fv));
                                    }
                                }
                                None => continue,
                            }
                        } else if let Some(s) = value.as_str() {
                            tags.push((col, s.to_string()));
                        }
                    }
                    let key = (ts, {
                        let mut t = tags.clone();
                        t.sort();
                        t
                    });
                    let point = rows.entry(key).or_insert_with(|| {
                        let mut p = Point::new(measurement, ts);
                        p.tags = tags.into_iter().collect();
                        p
                    });
                    for (name, value) in point_fields {
                        point.fields.insert(name, value);
                    }
                }
            }
        }

        if dropped_non_finite > 0 {
            warn!(
                measurement,
                dropped_non_finite, "dropped non-finite numeric cells from query result"
            );
        }

        Ok(rows.into_values().collect())
    }

    /// Creates `db` if it does not already exist.
    pub async fn ensure_database(&self, db: &str) -> Result<()> {
        let existing = self.databases().await?;
        if existing.iter().any(|d| d == db) {
            return Ok(());
        }
        let query = <dyn InfluxQuery>::raw_read_query(format!(r#"CREATE DATABASE "{db}""#));
        self.with_timeout(Error::Transient, self.client_for("").query(&query))
            .await?;
        Ok(())
    }

    /// Writes `points` to `db` in batches of at most `batch_size`.
    /// Caller is responsible for retrying on [`Error::Transient`].
    pub async fn write_points(&self, db: &str, points: &[Point], batch_size: usize) -> Result<()> {
        let client = self.client_for(db);
        for batch in points.chunks(batch_size.max(1)) {
            for point in batch {
                let mut query = WriteQuery::new(
                    InfluxTimestamp::Nanoseconds(point.timestamp.timestamp_nanos_opt().unwrap_or_default() as u128),
                    point.measurement.clone(),
                );
                for (k, v) in &point.tags {
                    query = query.add_tag(k.clone(), v.clone());
                }
                for (k, v) in &point.fields {
                    query = match v {
                        FieldValue::Float(f) => query.add_field(k.clone(), *f),
                        FieldValue::Str(s) => query.add_field(k.clone(), s.clone()),
                        FieldValue::Bool(b) => query.add_field(k.clone(), *b),
                    };
                }
                self.with_timeout(Error::Transient, client.query(&query)).await?;
            }
        }
        Ok(())
    }
}

fn field_value_from_json(kind: FieldKind, value: &serde_json::Value) -> Option<FieldValue> {
    match kind {
        FieldKind::Numeric => value.as_f64().map(FieldValue::Float),
        FieldKind::String => value.as_str().map(|s| FieldValue::Str(s.to_string())),
        FieldKind::Boolean => value.as_bool().map(FieldValue::Bool),
    }
}
