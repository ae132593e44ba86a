//! plum-state — tombstone persistence for plum.
//!
//! A tombstone is a snapshot of every check's mutable status taken at
//! shutdown, so a restart within [`MAX_TOMBSTONE_AGE`] resumes where the
//! previous process left off instead of re-settling (and re-alerting).
//!
//! # Architecture
//!
//! The snapshot lives in a single [redb](https://docs.rs/redb) file. The
//! capture time sits in the `tombstone` table; each check's
//! [`CheckTombStone`] is JSON-serialized into `tombstone_checks` under its
//! name. [`TombStoneStore::save`] replaces both in one write transaction,
//! so a reader sees either the old snapshot or the new one.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::TombStoneStore;
pub use types::*;
