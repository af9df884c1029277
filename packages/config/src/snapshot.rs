//! Versioned on-disk form of a saved configuration.
//!
//! Version history:
//!
//! - **1**: legacy snapshots with no `schema_version` key. Any field may be
//!   missing and some still carry the session-scoped `excel_filepath`.
//! - **2**: complete records stamped with `schema_version` and `saved_at`.
//!
//! [`upgrade`] walks a raw snapshot forward one version at a time, so each
//! gap has exactly one migration function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tableau_export_config_models::{
    ConditionRule, Configuration, FilterRule, ParameterOverride,
};

use crate::StoreError;

/// Version written by this build.
pub const CURRENT_SCHEMA_VERSION: u64 = 2;

const VERSION_KEY: &str = "schema_version";
const FILE_HANDLE_KEY: &str = "excel_filepath";

/// A named configuration as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedConfiguration {
    /// Snapshot layout version.
    pub schema_version: u64,
    /// When the snapshot was written. Absent for migrated legacy entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    /// The configuration itself, without its file handle.
    #[serde(flatten)]
    pub config: Configuration,
}

impl SavedConfiguration {
    /// Takes a deep copy of `config` at the current version, dropping the
    /// file handle.
    #[must_use]
    pub fn capture(config: &Configuration) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at: Some(Utc::now()),
            config: config.without_source_file(),
        }
    }
}

/// Brings a raw stored snapshot up to [`CURRENT_SCHEMA_VERSION`] and
/// decodes it.
///
/// # Errors
///
/// * [`StoreError::UnsupportedVersion`] for snapshots from a newer build
/// * [`StoreError::InvalidSnapshot`] if the value is not a configuration
pub fn upgrade(name: &str, raw: Value) -> Result<SavedConfiguration, StoreError> {
    let Value::Object(mut fields) = raw else {
        return Err(invalid(name, "snapshot is not a JSON object"));
    };

    let mut version = match fields.get(VERSION_KEY) {
        None | Some(Value::Null) => 1,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| invalid(name, "schema_version is not a whole number"))?,
    };

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            name: name.to_string(),
            version,
        });
    }

    while version < CURRENT_SCHEMA_VERSION {
        fields = match version {
            1 => migrate_v1_to_v2(fields),
            other => {
                return Err(StoreError::UnsupportedVersion {
                    name: name.to_string(),
                    version: other,
                });
            }
        };
        version += 1;
        log::debug!("Migrated configuration '{name}' to schema version {version}");
    }

    serde_json::from_value(Value::Object(fields)).map_err(|e| invalid(name, &e.to_string()))
}

/// Fills every missing or null field with its model default and drops the
/// file handle.
fn migrate_v1_to_v2(mut fields: Map<String, Value>) -> Map<String, Value> {
    fields.remove(FILE_HANDLE_KEY);

    for (key, default) in default_fields::<Configuration>() {
        if fields.get(&key).is_none_or(Value::is_null) {
            fields.insert(key, default);
        }
    }

    backfill_rows::<FilterRule>(&mut fields, "filters");
    backfill_rows::<ConditionRule>(&mut fields, "conditions");
    backfill_rows::<ParameterOverride>(&mut fields, "parameters");

    fields.insert(VERSION_KEY.to_string(), Value::from(2_u64));
    fields
}

fn backfill_rows<T: Serialize + Default>(fields: &mut Map<String, Value>, key: &str) {
    let Some(Value::Array(rows)) = fields.get_mut(key) else {
        return;
    };
    let defaults = default_fields::<T>();

    for row in rows.iter_mut() {
        if let Value::Object(row) = row {
            for (k, default) in &defaults {
                if row.get(k).is_none_or(Value::is_null) {
                    row.insert(k.clone(), default.clone());
                }
            }
        }
    }
}

fn default_fields<T: Serialize + Default>() -> Map<String, Value> {
    match serde_json::to_value(T::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn invalid(name: &str, message: &str) -> StoreError {
    StoreError::InvalidSnapshot {
        name: name.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tableau_export_config_models::{ComparisonType, ExportFormat, FileNaming};

    use super::*;

    #[test]
    fn legacy_snapshot_is_backfilled_with_defaults() {
        let raw = json!({
            "server_url": "https://tableau.example.com",
            "token_secret": "abc",
            "excel_filepath": "uploaded_configs/old.xlsx",
            "file_naming_option": "Store",
            "conditions": [{ "field": "Region", "type": "Is Blank" }]
        });

        let saved = upgrade("legacy", raw).unwrap();

        assert_eq!(saved.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(saved.saved_at.is_none());
        let config = saved.config;
        assert_eq!(config.server_url, "https://tableau.example.com");
        assert_eq!(config.token_secret, "abc");
        assert!(config.excel_filepath.is_none());
        assert!(config.numbering_enabled);
        assert_eq!(config.export_format, ExportFormat::Pdf);
        assert_eq!(
            config.file_naming_option,
            FileNaming::Column("Store".to_string())
        );
        assert_eq!(config.conditions[0].comparison, ComparisonType::IsBlank);
        assert_eq!(config.conditions[0].excluded_views_str, "");
    }

    #[test]
    fn null_fields_count_as_missing_in_legacy_snapshots() {
        let raw = json!({ "numbering_enabled": null, "filters": null });
        let saved = upgrade("nulls", raw).unwrap();
        assert!(saved.config.numbering_enabled);
        assert!(saved.config.filters.is_empty());
    }

    #[test]
    fn current_snapshot_decodes_unchanged() {
        let mut config = Configuration::default();
        config.workbook_name = "Sales".to_string();
        let saved = SavedConfiguration::capture(&config);

        let raw = serde_json::to_value(&saved).unwrap();
        assert_eq!(raw["schema_version"], 2);
        assert_eq!(upgrade("current", raw).unwrap(), saved);
    }

    #[test]
    fn newer_versions_are_rejected() {
        let err = upgrade("future", json!({ "schema_version": 9 })).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedVersion { version: 9, .. }
        ));
    }

    #[test]
    fn non_objects_are_invalid() {
        let err = upgrade("bad", json!(["not", "a", "config"])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSnapshot { .. }));
    }
}
