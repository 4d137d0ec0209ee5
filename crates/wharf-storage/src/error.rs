//! Error type for `wharf-storage`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Store(#[from] wharf_core::Error),

  #[error("could not parse storage schema document: {0}")]
  SchemaParse(#[source] serde_json::Error),

  #[error("could not encode storage schema document: {0}")]
  SchemaEncode(#[source] serde_json::Error),

  #[error("could not create migration logfile {}: {source}", path.display())]
  Logfile {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not write migration log: {0}")]
  Narration(#[source] std::io::Error),
}

/// Lets the manager surface its own failures through the `BackingStore`
/// contract. Plain store errors pass through untouched.
impl From<Error> for wharf_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Store(inner) => inner,
      other => wharf_core::Error::Backend(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
