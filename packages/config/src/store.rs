//! Named configuration snapshots.
//!
//! All snapshots live in one JSON object (`name → snapshot`) stored under
//! [`STORAGE_KEY`]. Every mutation rewrites the whole object. Entries are
//! kept as raw JSON and only upgraded when loaded, so a snapshot from an
//! older build never blocks listing or deleting the others.

use std::collections::BTreeMap;

use serde_json::Value;
use tableau_export_config_models::Configuration;

use crate::StoreError;
use crate::secrets::{PlaintextSecrets, SecretCodec};
use crate::snapshot::{SavedConfiguration, upgrade};
use crate::storage::KeyValueStorage;

/// Key of the durable blob holding every snapshot.
pub const STORAGE_KEY: &str = "tableau_exporter_configs";

/// Longest accepted configuration name, in characters.
pub const MAX_NAME_LENGTH: usize = 50;

/// Checks a user-supplied configuration name and returns it trimmed.
///
/// # Errors
///
/// Returns [`StoreError::InvalidName`] if the trimmed name is empty or
/// longer than [`MAX_NAME_LENGTH`] characters.
pub fn check_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::InvalidName {
            reason: "name cannot be empty".to_string(),
        });
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(StoreError::InvalidName {
            reason: format!("name cannot be longer than {MAX_NAME_LENGTH} characters"),
        });
    }
    Ok(name)
}

/// Save/load/delete of named [`Configuration`] snapshots.
pub struct ConfigStore<S, C = PlaintextSecrets> {
    storage: S,
    codec: C,
    entries: BTreeMap<String, Value>,
}

impl<S: KeyValueStorage> ConfigStore<S> {
    /// Creates an empty store over `storage` with plaintext secrets.
    /// Call [`ConfigStore::reload`] to read existing snapshots.
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self::with_codec(storage, PlaintextSecrets)
    }
}

impl<S: KeyValueStorage, C: SecretCodec> ConfigStore<S, C> {
    /// Creates an empty store with a custom secret codec.
    #[must_use]
    pub const fn with_codec(storage: S, codec: C) -> Self {
        Self {
            storage,
            codec,
            entries: BTreeMap::new(),
        }
    }

    /// Re-reads the mapping from durable storage.
    ///
    /// A blob that fails to parse is not repaired: the store resets to
    /// empty, the durable key is wiped, and [`StoreError::Corrupted`] is
    /// returned so the caller can tell the user once.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Io`] if storage cannot be read
    /// * [`StoreError::Corrupted`] if the blob was malformed (store is now
    ///   empty and usable)
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let Some(blob) = self.storage.get(STORAGE_KEY)? else {
            self.entries.clear();
            return Ok(());
        };

        match serde_json::from_str::<BTreeMap<String, Value>>(&blob) {
            Ok(entries) => {
                log::debug!("Loaded {} saved configuration(s)", entries.len());
                self.entries = entries;
                Ok(())
            }
            Err(source) => {
                log::error!("Saved configurations are corrupted, clearing them: {source}");
                self.entries.clear();
                self.storage.remove(STORAGE_KEY)?;
                Err(StoreError::Corrupted { source })
            }
        }
    }

    /// Saved names in lexicographic order.
    #[must_use]
    pub fn list_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Whether a snapshot named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name.trim())
    }

    /// Stores a deep copy of `config` under `name`, silently replacing any
    /// existing snapshot. The file handle is never stored.
    ///
    /// # Errors
    ///
    /// * [`StoreError::InvalidName`] if `name` is empty or too long
    /// * [`StoreError::Io`] if the mapping cannot be persisted; the
    ///   previous snapshot is kept in that case
    pub fn save(&mut self, name: &str, config: &Configuration) -> Result<(), StoreError> {
        let name = check_name(name)?.to_string();

        let mut saved = SavedConfiguration::capture(config);
        saved.config.token_secret = self.codec.seal(&saved.config.token_secret);
        let value = serde_json::to_value(&saved)?;

        let previous = self.entries.insert(name.clone(), value);
        if let Err(e) = self.persist() {
            match previous {
                Some(previous) => self.entries.insert(name, previous),
                None => self.entries.remove(&name),
            };
            return Err(e);
        }

        log::info!("Saved configuration '{name}'");
        Ok(())
    }

    /// Returns a fresh [`Configuration`] built from the snapshot named
    /// `name`, upgraded to the current schema, with the file handle
    /// cleared.
    ///
    /// # Errors
    ///
    /// * [`StoreError::NotFound`] if no such snapshot exists
    /// * [`StoreError::UnsupportedVersion`] / [`StoreError::InvalidSnapshot`]
    ///   if the snapshot cannot be decoded
    pub fn load(&self, name: &str) -> Result<Configuration, StoreError> {
        let name = name.trim();
        let raw = self
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })?;

        let mut config = upgrade(name, raw)?.config;
        config.token_secret = self.codec.open(&config.token_secret)?;
        config.excel_filepath = None;

        log::info!("Loaded configuration '{name}'");
        Ok(config)
    }

    /// Removes the snapshot named `name` if present and re-persists.
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the mapping cannot be persisted.
    pub fn delete(&mut self, name: &str) -> Result<bool, StoreError> {
        let removed = self.entries.remove(name.trim()).is_some();
        self.persist()?;
        if removed {
            log::info!("Deleted configuration '{}'", name.trim());
        }
        Ok(removed)
    }

    /// Underlying storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let blob = serde_json::to_string(&self.entries)?;
        self.storage.set(STORAGE_KEY, &blob)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tableau_export_config_models::{ExportFormat, FilterRule, ParameterOverride};

    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn sample() -> Configuration {
        Configuration {
            server_url: "https://tableau.example.com".to_string(),
            site_id: "finance".to_string(),
            token_name: "exporter".to_string(),
            token_secret: "pat-secret-value".to_string(),
            workbook_name: "Sales".to_string(),
            excel_filepath: Some("uploaded_configs/stores.xlsx".to_string()),
            sheet_name: "Stores".to_string(),
            tableau_filter_field: "Store".to_string(),
            export_format: ExportFormat::Png,
            numbering_enabled: false,
            excluded_views: vec!["Cover".to_string()],
            filters: vec![
                FilterRule {
                    field: "Region".to_string(),
                    values_str: "East,West".to_string(),
                },
                FilterRule {
                    field: "Region".to_string(),
                    values_str: "East,West".to_string(),
                },
            ],
            parameters: vec![ParameterOverride {
                name: "Year".to_string(),
                value: "2024".to_string(),
            }],
            ..Configuration::default()
        }
    }

    #[test]
    fn save_then_load_round_trips_without_file_handle() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        let config = sample();

        store.save("Prod", &config).unwrap();
        let loaded = store.load("Prod").unwrap();

        assert_eq!(loaded, config.without_source_file());
        assert_eq!(loaded.token_secret, "pat-secret-value");
        assert_eq!(store.list_names(), vec!["Prod".to_string()]);
    }

    #[test]
    fn persisted_blob_never_contains_file_handle() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        store.save("Prod", &sample()).unwrap();

        let blob = store.storage().get(STORAGE_KEY).unwrap().unwrap();
        assert!(!blob.contains("excel_filepath"));
        assert!(blob.contains("pat-secret-value"));
    }

    #[test]
    fn names_are_sorted_and_overwrite_is_silent() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        let mut config = sample();
        store.save("beta", &config).unwrap();
        store.save("Alpha", &config).unwrap();
        config.workbook_name = "Ops".to_string();
        store.save("beta", &config).unwrap();

        assert_eq!(store.list_names(), vec!["Alpha", "beta"]);
        assert_eq!(store.load("beta").unwrap().workbook_name, "Ops");
    }

    #[test]
    fn delete_twice_is_same_as_once() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        store.save("Prod", &sample()).unwrap();

        assert!(store.delete("Prod").unwrap());
        let after_first = store.storage().get(STORAGE_KEY).unwrap();
        assert!(!store.delete("Prod").unwrap());

        assert_eq!(store.storage().get(STORAGE_KEY).unwrap(), after_first);
        assert!(store.list_names().is_empty());
    }

    #[test]
    fn load_missing_is_not_found() {
        let store = ConfigStore::new(MemoryStorage::new());
        assert!(matches!(
            store.load("nope"),
            Err(StoreError::NotFound { name }) if name == "nope"
        ));
    }

    #[test]
    fn rejects_empty_and_long_names() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        assert!(matches!(
            store.save("   ", &sample()),
            Err(StoreError::InvalidName { .. })
        ));
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(store.save(&long, &sample()).is_err());
        assert!(store.save(&"x".repeat(MAX_NAME_LENGTH), &sample()).is_ok());
    }

    #[test]
    fn corrupted_blob_resets_and_wipes() {
        let mut storage = MemoryStorage::new();
        storage.set(STORAGE_KEY, "{not json").unwrap();
        let mut store = ConfigStore::new(storage);

        assert!(matches!(store.reload(), Err(StoreError::Corrupted { .. })));
        assert!(store.list_names().is_empty());
        assert_eq!(store.storage().get(STORAGE_KEY).unwrap(), None);

        // The store stays usable after the reset.
        store.save("Fresh", &sample()).unwrap();
        assert_eq!(store.list_names(), vec!["Fresh"]);
    }

    #[test]
    fn reload_reads_legacy_entries_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(tmp.path());
        storage
            .set(
                STORAGE_KEY,
                r#"{"Old":{"server_url":"https://t.example.com","excel_filepath":"x.xlsx"}}"#,
            )
            .unwrap();

        let mut store = ConfigStore::new(storage);
        store.reload().unwrap();

        let loaded = store.load("Old").unwrap();
        assert_eq!(loaded.server_url, "https://t.example.com");
        assert!(loaded.excel_filepath.is_none());
        assert!(loaded.numbering_enabled);
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();

        let mut store = ConfigStore::new(FileStorage::new(tmp.path()));
        store.save("Prod", &sample()).unwrap();

        let mut reopened = ConfigStore::new(FileStorage::new(tmp.path()));
        reopened.reload().unwrap();
        assert_eq!(
            reopened.load("Prod").unwrap(),
            sample().without_source_file()
        );
    }

    struct Reversed;

    impl SecretCodec for Reversed {
        fn seal(&self, secret: &str) -> String {
            secret.chars().rev().collect()
        }

        fn open(&self, stored: &str) -> Result<String, StoreError> {
            Ok(stored.chars().rev().collect())
        }
    }

    #[test]
    fn secrets_pass_through_codec() {
        let mut store = ConfigStore::with_codec(MemoryStorage::new(), Reversed);
        store.save("Prod", &sample()).unwrap();

        let blob = store.storage().get(STORAGE_KEY).unwrap().unwrap();
        assert!(blob.contains("eulav-terces-tap"));
        assert_eq!(store.load("Prod").unwrap().token_secret, "pat-secret-value");
    }
}
