//! Storage layer for Wharf: schema versioning and legacy-claim migration.
//!
//! [`StorageManager`] decorates any [`BackingStore`] so downstream
//! repositories can use it transparently, while it tracks the on-disk schema
//! version and, when asked, converts legacy per-bundle claim files into
//! grouped installation records.
//!
//! [`BackingStore`]: wharf_core::BackingStore

mod legacy;
mod migrate;

pub mod config;
pub mod error;
pub mod manager;
pub mod schema;
pub mod tee;

pub use config::StorageConfig;
pub use error::{Error, Result};
pub use manager::StorageManager;
pub use migrate::MigrationReport;
pub use schema::Schema;

#[cfg(test)]
mod tests;
