//! Parsing of legacy per-bundle claim files.
//!
//! Older homes kept one file per bundle under `claims/`, holding either a
//! single claim object or an array of claims in the order they were made.
//! Entries name their installation through `installation` (newer) or `name`
//! (older). Which one applied is decided here, once, and carried as the
//! [`LegacyClaim`] variant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;
use wharf_core::claim::{Action, Claim, ClaimResult, Status};

// ─── Raw shapes ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFile {
  Many(Vec<RawEntry>),
  One(Box<RawEntry>),
}

#[derive(Deserialize)]
struct RawEntry {
  #[serde(default)]
  id:           Option<String>,
  #[serde(default)]
  installation: Option<String>,
  #[serde(default)]
  name:         Option<String>,
  #[serde(default)]
  revision:     Option<String>,
  #[serde(default)]
  created:      Option<DateTime<Utc>>,
  #[serde(default)]
  modified:     Option<DateTime<Utc>>,
  #[serde(default)]
  action:       Option<String>,
  #[serde(default)]
  bundle:       Option<Value>,
  #[serde(default)]
  parameters:   BTreeMap<String, Value>,
  #[serde(default)]
  outputs:      BTreeMap<String, Value>,
  #[serde(default)]
  result:       Option<RawResult>,
  #[serde(default)]
  results:      Vec<ClaimResult>,
  #[serde(default)]
  custom:       Option<Value>,
  #[serde(flatten)]
  unknown:      BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawResult {
  #[serde(default)]
  id:      Option<String>,
  #[serde(default)]
  created: Option<DateTime<Utc>>,
  #[serde(default)]
  action:  Option<String>,
  #[serde(default)]
  status:  Option<Status>,
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  outputs: BTreeMap<String, Value>,
  #[serde(flatten)]
  unknown: BTreeMap<String, Value>,
}

// ─── Resolved shape ──────────────────────────────────────────────────────────

/// A legacy entry converted to the current claim model, tagged with where
/// its installation name came from.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyClaim {
  /// The entry already carried `installation`.
  InstallationNamed(Claim),
  /// Only the legacy `name` field was set.
  LegacyNamed(Claim),
  /// Neither field was set; the file's record name was used.
  FileNamed(Claim),
}

impl LegacyClaim {
  pub fn claim(&self) -> &Claim {
    match self {
      Self::InstallationNamed(c) | Self::LegacyNamed(c) | Self::FileNamed(c) => c,
    }
  }

  pub fn into_claim(self) -> Claim {
    match self {
      Self::InstallationNamed(c) | Self::LegacyNamed(c) | Self::FileNamed(c) => c,
    }
  }
}

/// A parsed legacy entry and the fields it carried that the current claim
/// model has no place for.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEntry {
  pub kind:    LegacyClaim,
  /// Dotted names of dropped fields, e.g. `modified` or `result.extra`.
  pub dropped: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
  #[error("invalid json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("entry {0} has no action")]
  MissingAction(usize),
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse the contents of the legacy file stored under `file`.
///
/// Blank files and empty arrays yield no entries. Any entry that cannot be
/// converted fails the whole file, so a file is migrated entirely or not at
/// all.
pub fn parse_file(
  file: &str,
  data: &[u8],
) -> Result<Vec<LegacyEntry>, ParseError> {
  if data.iter().all(u8::is_ascii_whitespace) {
    return Ok(Vec::new());
  }

  let entries = match serde_json::from_slice::<RawFile>(data)? {
    RawFile::Many(entries) => entries,
    RawFile::One(entry) => vec![*entry],
  };

  entries
    .into_iter()
    .enumerate()
    .map(|(index, entry)| resolve(file, index, entry))
    .collect()
}

fn non_empty(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.is_empty())
}

/// Stable id for values the legacy record never had, so replaying a
/// migration produces byte-identical installations.
fn derived_id(seed: &str) -> String {
  Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

fn resolve(
  file: &str,
  index: usize,
  entry: RawEntry,
) -> Result<LegacyEntry, ParseError> {
  let RawEntry {
    id,
    installation,
    name,
    revision,
    created,
    modified,
    action,
    bundle,
    parameters,
    outputs,
    result,
    results,
    custom,
    unknown,
  } = entry;

  let action = non_empty(action)
    .or_else(|| result.as_ref().and_then(|r| non_empty(r.action.clone())))
    .map(Action::from)
    .ok_or(ParseError::MissingAction(index))?;

  let mut dropped: Vec<String> = unknown.into_keys().collect();
  let mut modified_used = created.is_none();

  let revision = non_empty(revision).unwrap_or_default();
  let id = non_empty(id)
    .or_else(|| (!revision.is_empty()).then(|| revision.clone()))
    .unwrap_or_else(|| derived_id(&format!("{file}/{index}")));
  let created = created.or(modified).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
  let result_id = || derived_id(&format!("{id}/result"));

  let mut results = if !results.is_empty() {
    if result.is_some() {
      dropped.push("result".to_owned());
    }
    results
  } else if let Some(r) = result {
    modified_used |= r.created.is_none();
    dropped.extend(r.unknown.into_keys().map(|k| format!("result.{k}")));
    vec![ClaimResult {
      id:      non_empty(r.id).unwrap_or_else(result_id),
      created: r.created.or(modified).unwrap_or(created),
      status:  r.status.unwrap_or(Status::Unknown),
      message: non_empty(r.message),
      outputs: r.outputs,
    }]
  } else {
    Vec::new()
  };

  // Top-level outputs belong to the latest result. With no result to hold
  // them, one with an unknown status is made up.
  if !outputs.is_empty() {
    if results.is_empty() {
      modified_used = true;
      results.push(ClaimResult {
        id:      result_id(),
        created: modified.unwrap_or(created),
        status:  Status::Unknown,
        message: None,
        outputs: BTreeMap::new(),
      });
    }
    if let Some(last) = results.last_mut() {
      for (key, value) in outputs {
        let conflict = last.outputs.get(&key).is_some_and(|v| *v != value);
        if conflict {
          dropped.push(format!("outputs.{key}"));
        } else {
          last.outputs.insert(key, value);
        }
      }
    }
  }

  if modified.is_some() && !modified_used {
    dropped.push("modified".to_owned());
  }
  dropped.sort();

  let mut claim = Claim {
    id,
    installation: String::new(),
    revision,
    created,
    action,
    bundle,
    parameters,
    custom,
    results,
  };

  let kind = match (non_empty(installation), non_empty(name)) {
    (Some(installation), _) => {
      claim.installation = installation;
      LegacyClaim::InstallationNamed(claim)
    }
    (None, Some(name)) => {
      claim.installation = name;
      LegacyClaim::LegacyNamed(claim)
    }
    (None, None) => {
      claim.installation = file.to_owned();
      LegacyClaim::FileNamed(claim)
    }
  };
  Ok(LegacyEntry { kind, dropped })
}
