//! Filesystem backend for the Wharf backing store.
//!
//! Each record is one JSON file under a home directory, laid out as
//! `<home>/<group>/<item_type>/<name>.json` with empty components skipped.

mod store;

pub use store::FilesystemStore;
