#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Validation and persistence for export configurations.
//!
//! - [`validate`] checks a [`Configuration`] against the columns of the
//!   currently loaded sheet and reports every problem at once.
//! - [`store::ConfigStore`] keeps named snapshots in a single JSON blob
//!   behind the [`storage::KeyValueStorage`] trait.
//!
//! [`Configuration`]: tableau_export_config_models::Configuration

pub mod secrets;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod validate;

pub use store::ConfigStore;
pub use validate::{Violation, validate};

/// Errors from configuration persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the durable storage failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the mapping failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The durable blob could not be parsed; the store was reset.
    #[error("Saved configurations were corrupted and have been cleared: {source}")]
    Corrupted {
        /// Parse failure of the stored blob.
        source: serde_json::Error,
    },

    /// No snapshot is stored under this name.
    #[error("Configuration '{name}' not found")]
    NotFound {
        /// Requested name.
        name: String,
    },

    /// The name is empty or too long.
    #[error("Invalid configuration name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },

    /// The snapshot was written by a newer version of this tool.
    #[error("Configuration '{name}' uses unsupported schema version {version}")]
    UnsupportedVersion {
        /// Snapshot name.
        name: String,
        /// Version found in the snapshot.
        version: u64,
    },

    /// The snapshot exists but does not describe a configuration.
    #[error("Configuration '{name}' is malformed: {message}")]
    InvalidSnapshot {
        /// Snapshot name.
        name: String,
        /// What was wrong with it.
        message: String,
    },

    /// The stored secret could not be decoded.
    #[error("Could not decode stored secret: {message}")]
    Secret {
        /// Codec-specific failure description.
        message: String,
    },
}
