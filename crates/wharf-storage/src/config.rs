//! Storage configuration, deserialised from the CLI config file / env.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::schema::Schema;

/// Settings for a [`StorageManager`](crate::StorageManager) session.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// Root of the storage home.
  pub home:     PathBuf,
  /// Where migration logfiles are written; defaults to `<home>/logs`.
  #[serde(default)]
  pub log_dir:  Option<PathBuf>,
  /// Schema versions this build reads and writes. Overridable so tests can
  /// stand in for older or newer builds.
  #[serde(default = "Schema::current")]
  pub versions: Schema,
}

impl StorageConfig {
  pub fn new(home: impl Into<PathBuf>) -> Self {
    Self { home: home.into(), log_dir: None, versions: Schema::current() }
  }

  pub fn with_versions(mut self, versions: Schema) -> Self {
    self.versions = versions;
    self
  }

  pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.log_dir = Some(dir.into());
    self
  }

  pub fn log_dir(&self) -> PathBuf {
    self
      .log_dir
      .clone()
      .unwrap_or_else(|| self.home.join("logs"))
  }

  pub fn home(&self) -> &Path { &self.home }
}
