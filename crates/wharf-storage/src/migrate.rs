//! Conversion of legacy per-bundle claim files into installation records.
//!
//! The pass runs in four phases so that no legacy data is removed before
//! its replacement exists:
//!
//! 1. read and parse every file under `claims/`;
//! 2. group the claims by installation, in discovery order;
//! 3. write one installation record per group, replacing any prior record;
//! 4. delete the legacy files that were converted.
//!
//! Updating the schema document is left to the caller, after all four
//! phases succeed. A failed run leaves the schema untouched, and a rerun
//! rewrites the same installations.

use std::{collections::HashMap, io::Write};

use wharf_core::{
  BackingStore, claim::Claim, installation::Installation,
  repository::ClaimStore,
};

use crate::{
  Error, Result,
  legacy::{self, LegacyClaim, LegacyEntry},
  schema::CLAIMS_GROUP,
};

/// What a claims migration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
  /// Legacy files converted and removed.
  pub migrated_files: Vec<String>,
  /// Legacy files left in place because they could not be parsed.
  pub skipped_files:  Vec<String>,
  /// Installations written, in the order they were first seen.
  pub installations:  Vec<String>,
  /// Claims whose installation came from the legacy `name` field.
  pub renamed_claims: usize,
}

/// Claims grouped by installation, keeping first-seen order.
#[derive(Default)]
struct Groups {
  order:  Vec<Installation>,
  lookup: HashMap<String, usize>,
}

impl Groups {
  fn push(&mut self, claim: Claim) {
    let idx = match self.lookup.get(&claim.installation) {
      Some(&idx) => idx,
      None => {
        self.order.push(Installation::new(claim.installation.clone()));
        self.lookup.insert(claim.installation.clone(), self.order.len() - 1);
        self.order.len() - 1
      }
    };
    self.order[idx].claims.push(claim);
  }
}

macro_rules! narrate {
  ($log:expr, $($arg:tt)*) => {
    writeln!($log, $($arg)*).map_err(Error::Narration)
  };
}

/// Move every legacy claim file in `store` into installation records,
/// narrating each step to `log`.
pub(crate) fn migrate_claims<S, W>(store: &S, log: &mut W) -> Result<MigrationReport>
where
  S: BackingStore,
  W: Write,
{
  let mut report = MigrationReport::default();
  let mut groups = Groups::default();

  // ── Read and group ──────────────────────────────────────────────────────

  for file in store.list(CLAIMS_GROUP, "")? {
    let data = store.read(CLAIMS_GROUP, "", &file)?;
    narrate!(log, "Processing claims file {file}")?;

    let entries = match legacy::parse_file(&file, &data) {
      Ok(entries) => entries,
      Err(e) => {
        tracing::debug!(file = %file, error = %e, "skipping malformed claims file");
        narrate!(log, "!!! Skipping malformed claims file {file}: {e}")?;
        report.skipped_files.push(file);
        continue;
      }
    };
    if entries.is_empty() {
      narrate!(log, "  - no claims found in {file}")?;
    }

    for LegacyEntry { kind: entry, dropped } in entries {
      let claim = entry.claim();
      match &entry {
        LegacyClaim::InstallationNamed(_) => {}
        LegacyClaim::LegacyNamed(_) => {
          report.renamed_claims += 1;
          narrate!(
            log,
            "  - Migrating claim.Name to claim.Installation for claim {} (installation {})",
            claim.id,
            claim.installation,
          )?;
        }
        LegacyClaim::FileNamed(_) => {
          narrate!(
            log,
            "  - Claim {} has no installation name, using the file name {}",
            claim.id,
            claim.installation,
          )?;
        }
      }
      if !dropped.is_empty() {
        narrate!(
          log,
          "  - Dropping unsupported field(s) {} from claim {}",
          dropped.join(", "),
          claim.id,
        )?;
      }
      groups.push(entry.into_claim());
    }
    report.migrated_files.push(file);
  }

  // ── Write installations ─────────────────────────────────────────────────

  let repo = ClaimStore::new(store);
  for installation in &groups.order {
    repo.save_installation(installation)?;
    narrate!(
      log,
      "Saved installation {} with {} claim(s)",
      installation.name,
      installation.claims.len(),
    )?;
    report.installations.push(installation.name.clone());
  }

  // ── Remove converted legacy files ───────────────────────────────────────

  for file in &report.migrated_files {
    store.delete(CLAIMS_GROUP, "", file)?;
    narrate!(log, "Removed legacy claims file {file}")?;
  }

  Ok(report)
}
