// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Error kinds for the replication engine.

use thiserror::Error;

/// Errors that can occur while loading config, talking to InfluxDB, or
/// running a job.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration. Fatal at job start.
    #[error("configuration error: {0}")]
    Config(String),
    /// Cannot reach an endpoint. Fatal at job start, transient mid-job.
    #[error("connection error: {0}")]
    Connection(String),
    /// 5xx / timeout / network reset during a query or write. Retried.
    #[error("transient error: {0}")]
    Transient(String),
    /// 4xx from a query (bad field, syntax). Aborts the current measurement.
    #[error("permanent error: {0}")]
    Permanent(String),
    /// Malformed response or non-finite-only numeric column.
    #[error("data error: {0}")]
    Data(String),
    /// Invalid cron expression. Fatal at job start.
    #[error("scheduling error: {0}")]
    Scheduling(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Influx(#[from] influxdb::Error),
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error not defined by another variant.
    pub fn other<S: Into<String>>(s: S) -> Self {
        Error::Other(s.into())
    }

    /// Maps an error to the process exit code it implies.
    /// `1` for anything fatal at job start, `2` is reserved for the
    /// "partial" job outcome and is never produced from an `Error` alone.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Connection(_) | Error::Scheduling(_) => 1,
            _ => 1,
        }
    }

    /// True if this error should be retried by the caller: only
    /// transient, connection-level failures are retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Connection(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
