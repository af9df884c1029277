#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Orchestration of Tableau export runs.
//!
//! [`ExportController`] validates a configuration, submits it to the
//! backend and follows the resulting task with a [`Poller`] until it
//! succeeds, fails or is stopped. The backend is any
//! [`ExportBackend`](tableau_export_client::ExportBackend), so the same
//! controller runs against HTTP in the CLI and against a fake in tests.

pub mod controller;
pub mod poller;
pub mod progress;
pub mod task;

pub use controller::{
    ExportController, LifecycleState, PollOutcome, STOP_MESSAGE, StopHandle, SubmitOutcome,
};
pub use poller::{DEFAULT_POLL_INTERVAL, Poller};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use task::{ExportTask, LogSource};
