//! [`StorageManager`] — schema tracking and migration in front of a
//! [`BackingStore`].

use std::{
  io::{self, Write},
  path::PathBuf,
};

use parking_lot::Mutex;
use wharf_core::BackingStore;

use crate::{
  Error, Result, StorageConfig,
  migrate::{self, MigrationReport},
  schema::{GOVERNED_GROUPS, SCHEMA_GROUP, SCHEMA_NAME, SCHEMA_TYPE, Schema},
  tee::MigrationLog,
};

/// Per-process view of the home's schema state.
#[derive(Debug, Default)]
struct Session {
  loaded:    bool,
  /// Whether `schema` matches a document that exists in the store.
  persisted: bool,
  schema:    Schema,
}

/// Decorates a backing store with schema loading and claims migration.
///
/// It implements [`BackingStore`] itself, forwarding every call to the inner
/// store once the schema has been loaded, so repositories can be layered on
/// top of it unchanged. Migration is never implicit: call
/// [`migrate`](Self::migrate) when it is safe to rewrite legacy data.
pub struct StorageManager<S> {
  store:       S,
  config:      StorageConfig,
  diagnostics: Mutex<Box<dyn Write + Send>>,
  session:     Mutex<Session>,
}

impl<S: BackingStore> StorageManager<S> {
  /// Wrap `store`. Migration narration goes to stderr unless replaced with
  /// [`with_diagnostics`](Self::with_diagnostics).
  pub fn new(config: StorageConfig, store: S) -> Self {
    Self {
      store,
      config,
      diagnostics: Mutex::new(Box::new(io::stderr())),
      session: Mutex::new(Session::default()),
    }
  }

  /// Send migration narration to `writer` instead of stderr.
  pub fn with_diagnostics(mut self, writer: impl Write + Send + 'static) -> Self {
    self.diagnostics = Mutex::new(Box::new(writer));
    self
  }

  pub fn config(&self) -> &StorageConfig { &self.config }

  pub fn inner(&self) -> &S { &self.store }

  /// The schema as loaded (or last written) in this session.
  pub fn schema(&self) -> Schema { self.session.lock().schema.clone() }

  // ── Schema ──────────────────────────────────────────────────────────────

  /// Load the schema document, once per session.
  ///
  /// - Present: parsed and kept as-is. A document that does not parse is an
  ///   error and leaves the in-memory schema empty.
  /// - Absent, home empty: initialised in memory to the current versions;
  ///   nothing is written until the first save.
  /// - Absent, legacy data present: left empty, which reads as "needs
  ///   migration".
  pub fn load_schema(&self) -> Result<()> {
    let mut session = self.session.lock();
    if session.loaded {
      return Ok(());
    }

    match self.store.read_optional(SCHEMA_GROUP, SCHEMA_TYPE, SCHEMA_NAME)? {
      Some(data) => {
        session.schema = Schema::parse(&data)?;
        session.persisted = true;
        tracing::debug!(schema = ?session.schema, "loaded storage schema");
      }
      None if self.home_has_data()? => {
        session.schema = Schema::default();
        session.persisted = false;
        tracing::debug!("storage home has data but no schema document");
      }
      None => {
        session.schema = self.config.versions.clone();
        session.persisted = false;
        tracing::debug!("initialised schema for an empty storage home");
      }
    }
    session.loaded = true;
    Ok(())
  }

  fn home_has_data(&self) -> Result<bool> {
    for group in GOVERNED_GROUPS {
      if !self.store.list(group, "")?.is_empty() {
        return Ok(true);
      }
    }
    Ok(false)
  }

  fn write_schema(&self, schema: &Schema) -> Result<()> {
    let data = schema.to_json()?;
    self
      .store
      .save(SCHEMA_GROUP, SCHEMA_TYPE, SCHEMA_NAME, &data)?;
    Ok(())
  }

  /// Persist an auto-initialised schema before the first write to a fresh
  /// home.
  fn ensure_schema_persisted(&self) -> Result<()> {
    let mut session = self.session.lock();
    if session.persisted || session.schema.is_empty() {
      return Ok(());
    }
    self.write_schema(&session.schema)?;
    session.persisted = true;
    tracing::info!("created storage schema document");
    Ok(())
  }

  /// True when the loaded claims version is unknown or differs from the
  /// version this build writes. Comparison is exact.
  pub fn should_migrate_claims(&self) -> bool {
    let session = self.session.lock();
    let claims = &session.schema.claims;
    claims.is_empty() || *claims != self.config.versions.claims
  }

  // ── Migration ───────────────────────────────────────────────────────────

  /// Convert legacy claims to installation records if the schema calls for
  /// it, and return the path of the migration logfile.
  ///
  /// Returns `Ok(None)` without writing anything when the claims data is
  /// already current.
  pub fn migrate(&self) -> Result<Option<PathBuf>> {
    self.migrate_with_report().map(|r| r.map(|(path, _)| path))
  }

  /// As [`migrate`](Self::migrate), also returning what was converted.
  pub fn migrate_with_report(
    &self,
  ) -> Result<Option<(PathBuf, MigrationReport)>> {
    self.load_schema()?;
    if !self.should_migrate_claims() {
      tracing::debug!("claims schema is current, nothing to migrate");
      return Ok(None);
    }

    let mut diagnostics = self.diagnostics.lock();
    let mut log = MigrationLog::create(&self.config.log_dir(), &mut *diagnostics)?;
    let logfile = log.path().to_path_buf();
    let versions = &self.config.versions;

    writeln!(
      log,
      "!!! Migrating claims data to match the current schema version {}. \
       A log of the migration is saved to {}",
      versions.claims,
      logfile.display(),
    )
    .map_err(Error::Narration)?;

    let report = migrate::migrate_claims(&self.store, &mut log)?;

    let mut schema = self.schema();
    schema.mark_claims_migrated(versions);
    self.write_schema(&schema)?;
    {
      let mut session = self.session.lock();
      session.schema = schema;
      session.persisted = true;
    }

    writeln!(
      log,
      "Claims migration complete: {} file(s) converted into {} installation(s), {} skipped",
      report.migrated_files.len(),
      report.installations.len(),
      report.skipped_files.len(),
    )
    .map_err(Error::Narration)?;

    let path = log.finish()?;
    tracing::debug!(
      logfile = %path.display(),
      installations = report.installations.len(),
      "migrated claims data"
    );
    Ok(Some((path, report)))
  }
}

// ─── Pass-through store ──────────────────────────────────────────────────────

impl<S: BackingStore> BackingStore for StorageManager<S> {
  fn save(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
    data: &[u8],
  ) -> wharf_core::Result<()> {
    self.load_schema()?;
    self.ensure_schema_persisted()?;
    self.store.save(group, item_type, name, data)
  }

  fn read(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
  ) -> wharf_core::Result<Vec<u8>> {
    self.load_schema()?;
    self.store.read(group, item_type, name)
  }

  fn list(&self, group: &str, item_type: &str) -> wharf_core::Result<Vec<String>> {
    self.load_schema()?;
    self.store.list(group, item_type)
  }

  fn delete(
    &self,
    group: &str,
    item_type: &str,
    name: &str,
  ) -> wharf_core::Result<()> {
    self.load_schema()?;
    self.store.delete(group, item_type, name)
  }
}
