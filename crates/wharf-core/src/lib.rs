//! Core types and trait definitions for the Wharf installation store.
//!
//! This crate defines the claim / installation data contract and the keyed
//! blob-storage abstraction every backend implements. It knows nothing about
//! directories, schema versions or migrations.

pub mod claim;
pub mod error;
pub mod installation;
pub mod memory;
pub mod repository;
pub mod store;

pub use error::{Error, Result};
pub use store::{BackingStore, RecordKey};
