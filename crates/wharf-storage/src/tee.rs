//! The dual-sink migration log.
//!
//! [`MigrationLog`] duplicates every write to an interactive diagnostic
//! stream and to a logfile created for the run, so the logfile always holds
//! exactly what the user saw.

use std::{
  fs::{self, File},
  io::{self, Write},
  path::{Path, PathBuf},
};

use chrono::Utc;
use uuid::Uuid;

use crate::{Error, Result};

pub struct MigrationLog<W: Write> {
  interactive: W,
  file:        File,
  path:        PathBuf,
}

impl<W: Write> MigrationLog<W> {
  /// Create a fresh logfile in `dir` and pair it with `interactive`.
  pub fn create(dir: &Path, interactive: W) -> Result<Self> {
    let name = format!(
      "migrate-{}-{}.log",
      Utc::now().format("%Y%m%dT%H%M%S"),
      &Uuid::new_v4().simple().to_string()[..8],
    );
    let path = dir.join(name);

    let file = fs::create_dir_all(dir)
      .and_then(|()| File::options().write(true).create_new(true).open(&path))
      .map_err(|source| Error::Logfile { path: path.clone(), source })?;

    Ok(Self { interactive, file, path })
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Flush both sinks and hand back the logfile path.
  pub fn finish(mut self) -> Result<PathBuf> {
    self.flush().map_err(Error::Narration)?;
    self.file.sync_all().map_err(Error::Narration)?;
    Ok(self.path.clone())
  }
}

impl<W: Write> Write for MigrationLog<W> {
  // Whole buffers go to both sinks, otherwise a short write on one side
  // would make the two copies diverge.
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.file.write_all(buf)?;
    self.interactive.write_all(buf)?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.file.flush()?;
    self.interactive.flush()
  }
}

impl<W: Write> Drop for MigrationLog<W> {
  fn drop(&mut self) {
    let _ = self.flush();
  }
}
