//! # zonesync server
//!
//! Reference in-memory remote record store for zonesync.
//!
//! This crate provides:
//! - `MemoryRemoteStore`, an implementation of the engine's `RemoteStore`
//! - Private, shared and public databases partitioned into zones
//! - Database- and zone-level change logs with paging and opaque cursors
//! - Change tags with server-side conflict detection
//! - Atomic batches, cascading deletes and share uniqueness
//! - Zone purge and deletion, cursor expiry and fault injection
//!
//! # Architecture
//!
//! Each database keeps a log of zone-level changes; each zone keeps its
//! records, the history of their versions and a log of record-level changes.
//! Cursors encode a position in one of these logs together with the epoch
//! (and zone generation) they were issued in, so expiring tokens or purging
//! a zone invalidates every cursor handed out before.
//!
//! The store is used by the engine's integration tests and the CLI demo.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod cursor;
mod database;
mod error;
mod store;
mod zone;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::{FaultPoint, MemoryRemoteStore};
