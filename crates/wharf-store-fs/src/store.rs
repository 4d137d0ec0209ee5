//! [`FilesystemStore`] — the directory-backed implementation of
//! [`BackingStore`].

use std::{
  fs,
  io::{self, Write as _},
  path::{Path, PathBuf},
};

use uuid::Uuid;
use wharf_core::{BackingStore, Error, RecordKey, Result};

const EXTENSION: &str = "json";

/// A backing store rooted at a home directory.
///
/// Cloning is cheap; the store holds nothing but its root path.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
  home: PathBuf,
}

impl FilesystemStore {
  /// Use `home` as the store root. The directory is created lazily on the
  /// first save.
  pub fn new(home: impl Into<PathBuf>) -> Self { Self { home: home.into() } }

  pub fn home(&self) -> &Path { &self.home }

  fn partition_dir(&self, group: &str, item_type: &str) -> PathBuf {
    let mut dir = self.home.clone();
    for part in [group, item_type] {
      if !part.is_empty() {
        dir.push(part);
      }
    }
    dir
  }

  /// Resolve and validate the file path for a record.
  pub fn record_path(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
  ) -> Result<PathBuf> {
    RecordKey::new(group, item_type, name).validate()?;
    Ok(
      self
        .partition_dir(group, item_type)
        .join(format!("{name}.{EXTENSION}")),
    )
  }
}

fn io_error(op: &'static str, key: RecordKey, source: io::Error) -> Error {
  if source.kind() == io::ErrorKind::NotFound {
    Error::NotFound(key)
  } else {
    Error::Io { op, key, source }
  }
}

/// Write `data` next to `path` and rename it into place, so readers only
/// ever observe the previous or the complete new contents.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
  let dir = path.parent().unwrap_or(Path::new("."));
  fs::create_dir_all(dir)?;

  let file_name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

  let result = (|| {
    let mut file = fs::File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
  })();
  if result.is_err() {
    let _ = fs::remove_file(&tmp);
  }
  result
}

impl BackingStore for FilesystemStore {
  fn save(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
    data: &[u8],
  ) -> Result<()> {
    let path = self.record_path(group, item_type, name)?;
    write_atomic(&path, data)
      .map_err(|e| io_error("save", RecordKey::new(group, item_type, name), e))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "saved record");
    Ok(())
  }

  fn read(&self, group: &str, item_type: &str, name: &str) -> Result<Vec<u8>> {
    let path = self.record_path(group, item_type, name)?;
    fs::read(&path)
      .map_err(|e| io_error("read", RecordKey::new(group, item_type, name), e))
  }

  fn list(&self, group: &str, item_type: &str) -> Result<Vec<String>> {
    let key = || RecordKey::new(group, item_type, "*");
    key().validate()?;
    let dir = self.partition_dir(group, item_type);

    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::Io { op: "list", key: key(), source: e }),
    };

    let mut names = Vec::new();
    for entry in entries {
      let entry =
        entry.map_err(|e| Error::Io { op: "list", key: key(), source: e })?;
      let file_type = entry
        .file_type()
        .map_err(|e| Error::Io { op: "list", key: key(), source: e })?;
      if !file_type.is_file() {
        continue;
      }
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        names.push(stem.to_owned());
      }
    }
    names.sort();
    Ok(names)
  }

  fn delete(&self, group: &str, item_type: &str, name: &str) -> Result<()> {
    let path = self.record_path(group, item_type, name)?;
    fs::remove_file(&path)
      .map_err(|e| io_error("delete", RecordKey::new(group, item_type, name), e))?;
    tracing::debug!(path = %path.display(), "deleted record");
    Ok(())
  }
}
