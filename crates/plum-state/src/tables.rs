//! redb table definitions for the tombstone file.

use redb::TableDefinition;

/// Snapshot metadata; holds the capture time under [`CAPTURED_KEY`].
pub const TOMBSTONE: TableDefinition<&str, &[u8]> = TableDefinition::new("tombstone");

/// Per-check snapshots keyed by check name.
pub const TOMBSTONE_CHECKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tombstone_checks");

pub const CAPTURED_KEY: &str = "captured";
