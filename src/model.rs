// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Data model shared by the planner, filter, engine, and client.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three field types InfluxDB 1.x field keys can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    String,
    Boolean,
}

impl FieldKind {
    /// Maps an Influx `fieldKeys` type string to a [`FieldKind`].
    pub fn from_influx_type(ty: &str) -> Option<Self> {
        match ty {
            "integer" | "float" => Some(FieldKind::Numeric),
            "string" => Some(FieldKind::String),
            "boolean" => Some(FieldKind::Boolean),
            _ => None,
        }
    }

    /// The aggregation function used when querying a field of this kind:
    /// `mean` for numeric, `last` for string/boolean.
    pub fn aggregation_fn(self) -> &'static str {
        match self {
            FieldKind::Numeric => "mean",
            FieldKind::String | FieldKind::Boolean => "last",
        }
    }
}

/// One field within a measurement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// A scalar value carried by a [`Point`], tagged with its declared kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Str(String),
    Bool(bool),
}

impl FieldValue {
    /// `true` for a numeric value that is NaN or infinite; such cells
    /// must be dropped before a write.
    pub fn is_non_finite(&self) -> bool {
        matches!(self, FieldValue::Float(f) if !f.is_finite())
    }
}

/// One timestamped row: tags plus a field set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }
}

/// A source→destination database pairing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMapping {
    pub source_name: String,
    pub dest_name: String,
}

impl DatabaseMapping {
    /// Derives the destination name from `source_name` plus an optional
    /// prefix/suffix, unless `destination` was given explicitly.
    pub fn derive(
        source_name: impl Into<String>,
        destination: Option<String>,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Self {
        let source_name = source_name.into();
        let dest_name = destination.unwrap_or_else(|| {
            format!(
                "{}{}{}",
                prefix.unwrap_or_default(),
                source_name,
                suffix.unwrap_or_default()
            )
        });
        Self {
            source_name,
            dest_name,
        }
    }
}

/// An ordered, half-open time interval `[start, end)`.
pub type Chunk = (DateTime<Utc>, DateTime<Utc>);

/// An ordered list of half-open intervals covering the planned range.
/// Empty ⇒ nothing to do.
pub type RangePlan = Vec<Chunk>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_detection() {
        assert!(FieldValue::Float(f64::NAN).is_non_finite());
        assert!(FieldValue::Float(f64::INFINITY).is_non_finite());
        assert!(FieldValue::Float(f64::NEG_INFINITY).is_non_finite());
        assert!(!FieldValue::Float(1.0).is_non_finite());
        assert!(!FieldValue::Bool(true).is_non_finite());
    }

    #[test]
    fn mapping_derives_name_from_prefix_suffix() {
        let m = DatabaseMapping::derive("telegraf", None, Some("bk_"), None);
        assert_eq!(m.dest_name, "bk_telegraf");
        let m = DatabaseMapping::derive("telegraf", Some("custom".into()), Some("bk_"), None);
        assert_eq!(m.dest_name, "custom");
    }

    #[test]
    fn field_kind_maps_influx_types() {
        assert_eq!(FieldKind::from_influx_type("integer"), Some(FieldKind::Numeric));
        assert_eq!(FieldKind::from_influx_type("float"), Some(FieldKind::Numeric));
        assert_eq!(FieldKind::from_influx_type("string"), Some(FieldKind::String));
        assert_eq!(FieldKind::from_influx_type("boolean"), Some(FieldKind::Boolean));
        assert_eq!(FieldKind::from_influx_type("nonsense"), None);
    }
}
