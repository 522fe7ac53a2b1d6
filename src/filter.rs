// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement and field filtering: include/exclude lists,
//! type restriction, and obsolescence pruning against the destination.

use chrono::{DateTime, Utc};

use crate::{
    client::InfluxClient,
    config::{FieldsPolicy, JobConfig, Mode},
    error::Result,
    model::{Field, FieldKind},
};

/// `true` if `name` survives the measurement include/exclude lists.
/// Names are matched case-sensitively.
pub fn measurement_allowed(config: &JobConfig, name: &str) -> bool {
    let m = &config.measurements;
    if !m.include.is_empty() {
        return m.include.iter().any(|n| n == name);
    }
    !m.exclude.iter().any(|n| n == name)
}

/// Resolves the field policy to apply to `measurement`: its
/// `measurements.specific` override if present, else the global
/// `source.fields`-less default (an empty policy, i.e. keep everything
/// subject to type).
fn policy_for<'a>(config: &'a JobConfig, measurement: &str) -> Option<&'a FieldsPolicy> {
    config
        .measurements
        .specific
        .get(measurement)
        .and_then(|s| s.fields.as_ref())
}

/// Applies the field filter: restrict to declared
/// `types`, then `include` (if non-empty), then drop `exclude`.
pub fn filter_fields(config: &JobConfig, measurement: &str, fields: &[Field]) -> Vec<Field> {
    let policy = policy_for(config, measurement);

    let mut kept: Vec<Field> = match policy.and_then(|p| p.types.as_ref()) {
        Some(types) => fields
            .iter()
            .filter(|f| types.iter().any(|t| type_matches(*t, f.kind)))
            .cloned()
            .collect(),
        None => fields.to_vec(),
    };

    if let Some(policy) = policy {
        if !policy.include.is_empty() {
            kept.retain(|f| policy.include.iter().any(|n| n == &f.name));
        }
        kept.retain(|f| !policy.exclude.iter().any(|n| n == &f.name));
    }

    kept
}

fn type_matches(filter: crate::config::FieldTypeFilter, kind: FieldKind) -> bool {
    use crate::config::FieldTypeFilter as F;
    matches!(
        (filter, kind),
        (F::Numeric, FieldKind::Numeric) | (F::String, FieldKind::String) | (F::Boolean, FieldKind::Boolean)
    )
}

/// Applies the obsolescence filter against the
/// destination. Returns the fields that are *not* obsolete, i.e. the set
/// to keep querying/writing. In `range` mode, or when the destination
/// measurement has no data at all yet (a cold-start replica), the input
/// is returned unchanged: obsolescence is a staleness judgement against
/// existing destination history, and a destination that has never been
/// written to has no history to judge against.
pub async fn prune_obsolete_fields(
    config: &JobConfig,
    dest: &InfluxClient,
    dest_db: &str,
    measurement: &str,
    fields: Vec<Field>,
    dest_has_data: bool,
    now: DateTime<Utc>,
) -> Result<Vec<Field>> {
    if !matches!(config.options.mode, Mode::Incremental) || !dest_has_data {
        return Ok(fields);
    }
    let threshold = now - chrono::Duration::days(config.options.obsolete_days);
    let mut kept = Vec::with_capacity(fields.len());
    for field in fields {
        let last = dest.last_field_timestamp(dest_db, measurement, &field.name).await?;
        let fresh = last.map(|ts| ts > threshold).unwrap_or(false);
        if fresh {
            kept.push(field);
        }
    }
    Ok(kept)
}

/// `true` if every field in `fields` is obsolete, meaning the whole
/// measurement should be skipped. An empty field set
/// (nothing left after type/include/exclude filtering) is also
/// considered obsolete: there is nothing to copy.
pub fn measurement_is_obsolete(configured: &[Field], surviving: &[Field]) -> bool {
    !configured.is_empty() && surviving.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldTypeFilter, FieldsPolicy, JobConfig, SpecificMeasurement};

    fn field(name: &str, kind: FieldKind) -> Field {
        Field {
            name: name.to_string(),
            kind,
        }
    }

    fn base_config() -> JobConfig {
        let dir = std::env::temp_dir().join(format!("influx-relay-filter-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("job.yaml");
        std::fs::write(
            &path,
            r#"
source:
  url: "http://source:8086"
destination:
  url: "http://dest:8086"
options: {}
"#,
        )
        .unwrap();
        let config = JobConfig::from_file(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        config
    }

    #[test]
    fn include_list_wins_over_exclude() {
        let mut config = base_config();
        config.measurements.include = vec!["cpu".into()];
        config.measurements.exclude = vec!["cpu".into()];
        assert!(measurement_allowed(&config, "cpu"));
        assert!(!measurement_allowed(&config, "mem"));
    }

    #[test]
    fn exclude_list_applies_when_include_empty() {
        let mut config = base_config();
        config.measurements.exclude = vec!["mem".into()];
        assert!(measurement_allowed(&config, "cpu"));
        assert!(!measurement_allowed(&config, "mem"));
    }

    #[test]
    fn per_measurement_policy_overrides_global() {
        let mut config = base_config();
        config.measurements.specific.insert(
            "cpu".into(),
            SpecificMeasurement {
                fields: Some(FieldsPolicy {
                    include: vec!["usage_idle".into()],
                    exclude: vec![],
                    types: Some(vec![FieldTypeFilter::Numeric]),
                }),
            },
        );
        let fields = vec![
            field("usage_idle", FieldKind::Numeric),
            field("usage_user", FieldKind::Numeric),
            field("host_state", FieldKind::String),
        ];
        let kept = filter_fields(&config, "cpu", &fields);
        assert_eq!(kept, vec![field("usage_idle", FieldKind::Numeric)]);
    }

    #[test]
    fn no_policy_keeps_all_fields() {
        let config = base_config();
        let fields = vec![field("a", FieldKind::Numeric), field("b", FieldKind::String)];
        assert_eq!(filter_fields(&config, "cpu", &fields), fields);
    }

    #[test]
    fn empty_surviving_set_marks_measurement_obsolete() {
        let configured = vec![field("a", FieldKind::Numeric)];
        assert!(measurement_is_obsolete(&configured, &[]));
        assert!(!measurement_is_obsolete(&configured, &configured));
        assert!(!measurement_is_obsolete(&[], &[]));
    }
}
