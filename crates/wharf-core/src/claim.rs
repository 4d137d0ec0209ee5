//! Claims — the record of one lifecycle action performed against an
//! installation, together with the results reported for it.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Action ──────────────────────────────────────────────────────────────────

/// The lifecycle action a claim records. Bundles may define custom actions,
/// so anything outside the three built-ins is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
  Install,
  Upgrade,
  Uninstall,
  Custom(String),
}

impl Action {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Install => "install",
      Self::Upgrade => "upgrade",
      Self::Uninstall => "uninstall",
      Self::Custom(name) => name,
    }
  }
}

impl From<String> for Action {
  fn from(s: String) -> Self {
    match s.as_str() {
      "install" => Self::Install,
      "upgrade" => Self::Upgrade,
      "uninstall" => Self::Uninstall,
      _ => Self::Custom(s),
    }
  }
}

impl From<&str> for Action {
  fn from(s: &str) -> Self { Self::from(s.to_owned()) }
}

impl From<Action> for String {
  fn from(a: Action) -> Self {
    match a {
      Action::Custom(name) => name,
      other => other.as_str().to_owned(),
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Outcome of a claim as reported by its results.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Created,
  Running,
  Pending,
  /// `success` is the spelling used by early claim files.
  #[serde(alias = "success")]
  Succeeded,
  #[serde(alias = "failure")]
  Failed,
  Canceled,
  /// No result was recorded, or the recorded one cannot be interpreted.
  #[default]
  #[serde(other)]
  Unknown,
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Created => "created",
      Self::Running => "running",
      Self::Pending => "pending",
      Self::Succeeded => "succeeded",
      Self::Failed => "failed",
      Self::Canceled => "canceled",
      Self::Unknown => "unknown",
    };
    f.write_str(s)
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A status report for a claim. A claim may collect several while it runs
/// (e.g. `running` then `succeeded`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResult {
  pub id:      String,
  pub created: DateTime<Utc>,
  pub status:  Status,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub outputs: BTreeMap<String, serde_json::Value>,
}

/// A single lifecycle action against an installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
  pub id:           String,
  pub installation: String,
  #[serde(default)]
  pub revision:     String,
  pub created:      DateTime<Utc>,
  pub action:       Action,
  /// The bundle definition the action ran against, kept opaque.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bundle:       Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub parameters:   BTreeMap<String, serde_json::Value>,
  /// Free-form data attached by the tool that ran the action.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub custom:       Option<serde_json::Value>,
  /// Status reports, oldest first.
  #[serde(default)]
  pub results:      Vec<ClaimResult>,
}

impl Claim {
  /// The most recent result, if any was recorded.
  pub fn last_result(&self) -> Option<&ClaimResult> { self.results.last() }

  /// Status of the most recent result, or [`Status::Unknown`].
  pub fn status(&self) -> Status {
    self.last_result().map_or(Status::Unknown, |r| r.status)
  }
}
