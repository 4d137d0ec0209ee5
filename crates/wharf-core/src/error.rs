//! Error types for `wharf-core`.

use thiserror::Error;

use crate::store::RecordKey;

#[derive(Debug, Error)]
pub enum Error {
  /// The record addressed by the key does not exist.
  #[error("record not found: {0}")]
  NotFound(RecordKey),

  #[error("invalid record key {key}: {reason}")]
  InvalidKey { key: RecordKey, reason: &'static str },

  /// The underlying storage rejected or failed the operation.
  #[error("{op} {key}: {source}")]
  Io {
    op:     &'static str,
    key:    RecordKey,
    #[source]
    source: std::io::Error,
  },

  #[error("installation not found: {0}")]
  InstallationNotFound(String),

  #[error("installation {0} has no claims")]
  NoClaims(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// An error raised by a store decorator that is not a plain storage fault.
  #[error("{0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
