//! The `BackingStore` trait and its record addressing.
//!
//! A backing store is an opaque keyed blob store: `(group, item_type, name)`
//! maps to bytes. Backends (`wharf-store-fs`, [`MemoryStore`]) implement it;
//! the storage manager decorates it; repositories consume it.
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use std::{fmt, sync::Arc};

use crate::{Error, Result};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Full address of a record in a backing store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
  /// Data domain, e.g. `"claims"`. Empty for the schema document.
  pub group:     String,
  /// Sub-partition inside the group; usually empty.
  pub item_type: String,
  pub name:      String,
}

impl RecordKey {
  pub fn new(group: &str, item_type: &str, name: &str) -> Self {
    Self {
      group:     group.to_owned(),
      item_type: item_type.to_owned(),
      name:      name.to_owned(),
    }
  }

  /// Reject keys that could escape their partition, or share a file with
  /// another key, on a path-based backend.
  pub fn validate(&self) -> Result<()> {
    if self.name.is_empty() {
      return Err(self.invalid("empty record name"));
    }
    if self.group.is_empty() && !self.item_type.is_empty() {
      return Err(self.invalid("item type without a group"));
    }
    for part in [&self.group, &self.item_type, &self.name] {
      if part.contains(['/', '\\']) {
        return Err(self.invalid("path separator in key component"));
      }
      if part == "." || part == ".." {
        return Err(self.invalid("relative path component"));
      }
    }
    Ok(())
  }

  fn invalid(&self, reason: &'static str) -> Error {
    Error::InvalidKey { key: self.clone(), reason }
  }
}

impl fmt::Display for RecordKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.group, self.item_type, self.name)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a keyed blob-storage backend.
///
/// Calls are synchronous and carry no cross-call ordering or transactional
/// guarantee. `read` and `delete` fail with [`Error::NotFound`] for absent
/// names; transport failures surface as [`Error::Io`].
pub trait BackingStore {
  /// Create or replace the record at `(group, item_type, name)`.
  fn save(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
    data: &[u8],
  ) -> Result<()>;

  fn read(&self, group: &str, item_type: &str, name: &str) -> Result<Vec<u8>>;

  /// Names of every record in the partition, sorted ascending. An unknown
  /// partition is empty, not an error.
  fn list(&self, group: &str, item_type: &str) -> Result<Vec<String>>;

  fn delete(&self, group: &str, item_type: &str, name: &str) -> Result<()>;

  /// Like [`read`](Self::read), but an absent record is `Ok(None)`.
  fn read_optional(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
  ) -> Result<Option<Vec<u8>>> {
    match self.read(group, item_type, name) {
      Ok(data) => Ok(Some(data)),
      Err(e) if e.is_not_found() => Ok(None),
      Err(e) => Err(e),
    }
  }
}

impl<S: BackingStore + ?Sized> BackingStore for &S {
  fn save(&self, group: &str, item_type: &str, name: &str, data: &[u8]) -> Result<()> {
    (**self).save(group, item_type, name, data)
  }

  fn read(&self, group: &str, item_type: &str, name: &str) -> Result<Vec<u8>> {
    (**self).read(group, item_type, name)
  }

  fn list(&self, group: &str, item_type: &str) -> Result<Vec<String>> {
    (**self).list(group, item_type)
  }

  fn delete(&self, group: &str, item_type: &str, name: &str) -> Result<()> {
    (**self).delete(group, item_type, name)
  }
}

impl<S: BackingStore + ?Sized> BackingStore for Box<S> {
  fn save(&self, group: &str, item_type: &str, name: &str, data: &[u8]) -> Result<()> {
    (**self).save(group, item_type, name, data)
  }

  fn read(&self, group: &str, item_type: &str, name: &str) -> Result<Vec<u8>> {
    (**self).read(group, item_type, name)
  }

  fn list(&self, group: &str, item_type: &str) -> Result<Vec<String>> {
    (**self).list(group, item_type)
  }

  fn delete(&self, group: &str, item_type: &str, name: &str) -> Result<()> {
    (**self).delete(group, item_type, name)
  }
}

impl<S: BackingStore + ?Sized> BackingStore for Arc<S> {
  fn save(&self, group: &str, item_type: &str, name: &str, data: &[u8]) -> Result<()> {
    (**self).save(group, item_type, name, data)
  }

  fn read(&self, group: &str, item_type: &str, name: &str) -> Result<Vec<u8>> {
    (**self).read(group, item_type, name)
  }

  fn list(&self, group: &str, item_type: &str) -> Result<Vec<String>> {
    (**self).list(group, item_type)
  }

  fn delete(&self, group: &str, item_type: &str, name: &str) -> Result<()> {
    (**self).delete(group, item_type, name)
  }
}
