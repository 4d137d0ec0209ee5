//! [`MemoryStore`] — an in-process [`BackingStore`], used as the mock backend
//! in tests and for throwaway sessions.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::{BackingStore, Error, RecordKey, Result};

/// A backing store that keeps every record in a sorted map.
#[derive(Debug, Default)]
pub struct MemoryStore {
  records: Mutex<BTreeMap<RecordKey, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Total number of records across all partitions.
  pub fn len(&self) -> usize { self.records.lock().len() }

  pub fn is_empty(&self) -> bool { self.records.lock().is_empty() }
}

impl BackingStore for MemoryStore {
  fn save(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
    data: &[u8],
  ) -> Result<()> {
    let key = RecordKey::new(group, item_type, name);
    key.validate()?;
    self.records.lock().insert(key, data.to_vec());
    Ok(())
  }

  fn read(&self, group: &str, item_type: &str, name: &str) -> Result<Vec<u8>> {
    let key = RecordKey::new(group, item_type, name);
    self
      .records
      .lock()
      .get(&key)
      .cloned()
      .ok_or(Error::NotFound(key))
  }

  fn list(&self, group: &str, item_type: &str) -> Result<Vec<String>> {
    RecordKey::new(group, item_type, "*").validate()?;
    // BTreeMap iteration is already sorted by (group, item_type, name).
    Ok(
      self
        .records
        .lock()
        .keys()
        .filter(|k| k.group == group && k.item_type == item_type)
        .map(|k| k.name.clone())
        .collect(),
    )
  }

  fn delete(&self, group: &str, item_type: &str, name: &str) -> Result<()> {
    let key = RecordKey::new(group, item_type, name);
    match self.records.lock().remove(&key) {
      Some(_) => Ok(()),
      None => Err(Error::NotFound(key)),
    }
  }
}
