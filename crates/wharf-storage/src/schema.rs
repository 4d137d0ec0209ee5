//! The storage schema document: one format version per governed data domain.
//!
//! Stored as JSON at group `""`, type `""`, name `"schema"`. An absent
//! document is a valid state; see [`StorageManager::load_schema`].
//!
//! [`StorageManager::load_schema`]: crate::StorageManager::load_schema

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const SCHEMA_GROUP: &str = "";
pub const SCHEMA_TYPE: &str = "";
pub const SCHEMA_NAME: &str = "schema";

pub const CLAIMS_GROUP: &str = "claims";
pub const CREDENTIALS_GROUP: &str = "credentials";
pub const PARAMETERS_GROUP: &str = "parameters";

/// Groups whose presence marks a home as already holding user data.
pub const GOVERNED_GROUPS: [&str; 3] =
  [CLAIMS_GROUP, CREDENTIALS_GROUP, PARAMETERS_GROUP];

pub const CLAIM_SCHEMA_VERSION: &str = "cnab-claim-1.0.0-DRAFT+b5ed2f3";
pub const CREDENTIALS_SCHEMA_VERSION: &str =
  "cnab-credentials-1.0.0-DRAFT-b6c701f";
pub const PARAMETERS_SCHEMA_VERSION: &str =
  "cnab-parametersets-1.0.0-DRAFT+TODO";

/// Version strings per domain. Empty means "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
  #[serde(default)]
  pub claims:      String,
  #[serde(default)]
  pub credentials: String,
  #[serde(default)]
  pub parameters:  String,
}

impl Schema {
  /// The versions written by this build.
  pub fn current() -> Self {
    Self {
      claims:      CLAIM_SCHEMA_VERSION.to_owned(),
      credentials: CREDENTIALS_SCHEMA_VERSION.to_owned(),
      parameters:  PARAMETERS_SCHEMA_VERSION.to_owned(),
    }
  }

  pub fn is_empty(&self) -> bool { *self == Self::default() }

  pub fn parse(data: &[u8]) -> Result<Self> {
    serde_json::from_slice(data).map_err(Error::SchemaParse)
  }

  pub fn to_json(&self) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(self).map_err(Error::SchemaEncode)
  }

  /// Record the current claims version after a claims migration. Other
  /// domains keep their stored version unless it is unknown.
  pub(crate) fn mark_claims_migrated(&mut self, current: &Schema) {
    self.claims = current.claims.clone();
    if self.credentials.is_empty() {
      self.credentials = current.credentials.clone();
    }
    if self.parameters.is_empty() {
      self.parameters = current.parameters.clone();
    }
  }
}
