//! Installation — a named instance of a bundle and the ordered history of
//! claims made against it.

use serde::{Deserialize, Serialize};

use crate::claim::{Claim, Status};

/// Group under which installation records are stored.
pub const INSTALLATIONS_GROUP: &str = "installations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
  pub name:   String,
  /// Claims, oldest first.
  #[serde(default)]
  pub claims: Vec<Claim>,
}

impl Installation {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), claims: Vec::new() }
  }

  pub fn last_claim(&self) -> Option<&Claim> { self.claims.last() }

  /// Status of the most recent claim; [`Status::Unknown`] when there is none.
  pub fn last_status(&self) -> Status {
    self.last_claim().map_or(Status::Unknown, Claim::status)
  }
}
