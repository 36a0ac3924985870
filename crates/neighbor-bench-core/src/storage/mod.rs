//! # Persistent Storage
//!
//! Disk-backed graph engine built on the redb embedded database.

mod redb_store;

pub use redb_store::{RedbStore, RedbView};
