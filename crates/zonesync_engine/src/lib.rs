//! # zonesync engine
//!
//! Client-side synchronization engine that keeps a local cache of typed
//! records consistent with a multi-database remote record store.
//!
//! This crate provides:
//! - `RecordCache`, the single source of truth read by the UI
//! - `CursorStore`, the last-seen change cursor per database and per zone
//! - `ErrorClassifier`, mapping remote failures to a `RetryStrategy`
//! - Two-phase delta sync (zone discovery, then zone record deltas)
//! - Server-confirmed saves, deletes and record creation
//! - Share creation and removal
//! - Typed `RecordsChanged` events
//!
//! ## Architecture
//!
//! Every sync of a database runs in two phases:
//! 1. Page through database-level changes to learn which zones changed,
//!    were purged or were deleted
//! 2. Fetch the record deltas of the changed zones in one combined request
//!
//! Databases sync concurrently and independently. Writes go to the remote
//! store first; the cache only ever holds what the server confirmed.
//!
//! ## Key Invariants
//!
//! - The cache holds at most one entry per `(database, record id)`
//! - A cursor is never stored ahead of the changes it covers
//! - A failed write leaves the cache untouched
//! - Raw remote error codes are interpreted only by the classifier
//! - One `RecordsChanged` event per sync or write that changed something

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod classifier;
mod config;
mod cursor_store;
mod engine;
mod error;
mod events;
mod gateway;
mod orchestrator;
mod remote;
mod sharing;
mod snapshot;

pub use cache::{CachedRecord, RecordCache};
pub use classifier::{ClassifierPolicy, ErrorClassifier, RetryStrategy};
pub use config::{EngineConfig, RetryConfig};
pub use cursor_store::{CursorSnapshot, CursorStore};
pub use engine::{SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use events::RecordsChanged;
pub use orchestrator::SyncReport;
pub use remote::{MockCall, MockRemote, RemoteStore};
pub use snapshot::{EngineSnapshot, SNAPSHOT_VERSION};

pub use zonesync_protocol as protocol;
