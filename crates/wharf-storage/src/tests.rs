//! Tests for schema loading and claims migration, against both the in-memory
//! and the filesystem backends.

use std::{fs, io, path::Path, sync::Arc};

use parking_lot::Mutex;
use tempfile::TempDir;
use wharf_core::{
  BackingStore, RecordKey,
  claim::{Action, Status},
  memory::MemoryStore,
  repository::ClaimStore,
};
use wharf_store_fs::FilesystemStore;

use crate::{
  Schema, StorageConfig, StorageManager,
  schema::{CLAIM_SCHEMA_VERSION, CLAIMS_GROUP},
};

const INSTALLATION: &str = "example-exec-outputs";
const BANNER: &str = "!!! Migrating claims data";
const RENAME_NOTE: &str = "claim.Name to claim.Installation";

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Captures what the manager writes to its interactive stream.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
  fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock()).into_owned()
  }

  fn clear(&self) { self.0.lock().clear(); }
}

impl io::Write for SharedBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

fn fixture(name: &str) -> &'static [u8] {
  match name {
    "has-installation" => &include_bytes!("../testdata/has-installation.json")[..],
    "has-name" => &include_bytes!("../testdata/has-name.json")[..],
    "installed" => &include_bytes!("../testdata/installed.json")[..],
    "upgraded" => &include_bytes!("../testdata/upgraded.json")[..],
    other => panic!("no fixture named {other}"),
  }
}

fn copy_migrated_home(home: &Path) {
  fs::create_dir_all(home.join("installations")).unwrap();
  fs::write(
    home.join("schema.json"),
    include_bytes!("../testdata/migrated/schema.json"),
  )
  .unwrap();
  fs::write(
    home.join("installations/example-exec-outputs.json"),
    include_bytes!("../testdata/migrated/installations/example-exec-outputs.json"),
  )
  .unwrap();
}

fn add_legacy_file(home: &Path, name: &str) {
  let dir = home.join("claims");
  fs::create_dir_all(&dir).unwrap();
  fs::write(dir.join(format!("{name}.json")), fixture(name)).unwrap();
}

/// A manager over a filesystem home inside `dir`, capturing diagnostics.
fn fs_manager(dir: &TempDir) -> (StorageManager<FilesystemStore>, SharedBuffer) {
  let stderr = SharedBuffer::default();
  let mgr = StorageManager::new(
    StorageConfig::new(dir.path()),
    FilesystemStore::new(dir.path()),
  )
  .with_diagnostics(stderr.clone());
  (mgr, stderr)
}

fn memory_manager<'a>(
  dir: &TempDir,
  store: &'a MemoryStore,
) -> (StorageManager<&'a MemoryStore>, SharedBuffer) {
  let stderr = SharedBuffer::default();
  let mgr = StorageManager::new(StorageConfig::new(dir.path()), store)
    .with_diagnostics(stderr.clone());
  (mgr, stderr)
}

fn save_schema(store: &impl BackingStore, schema: &Schema) {
  store
    .save("", "", "schema", &serde_json::to_vec(schema).unwrap())
    .unwrap();
}

fn old_schema() -> Schema {
  Schema {
    claims:      "cnab-claim-1.0.0-DRAFT".into(),
    credentials: "cnab-credentials-1.0.0-DRAFT".into(),
    parameters:  String::new(),
  }
}

// ─── load_schema ─────────────────────────────────────────────────────────────

#[test]
fn load_schema_valid_document() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  save_schema(&store, &old_schema());
  let (mgr, _) = memory_manager(&dir, &store);

  mgr.load_schema().unwrap();
  assert!(!mgr.schema().is_empty());
  assert_eq!(mgr.schema(), old_schema());
}

#[test]
fn load_schema_missing_schema_empty_home() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  let (mgr, _) = memory_manager(&dir, &store);

  mgr.load_schema().unwrap();
  assert_eq!(mgr.schema(), Schema::current());
  assert!(!mgr.should_migrate_claims());
  assert!(store.is_empty(), "loading must not persist a schema document");
}

#[test]
fn load_schema_missing_schema_existing_home_data() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save(CLAIMS_GROUP, "", "mybun", b"").unwrap();
  let (mgr, _) = memory_manager(&dir, &store);

  mgr.load_schema().unwrap();
  assert!(mgr.schema().is_empty());
  assert!(mgr.should_migrate_claims());
}

#[test]
fn load_schema_invalid_document() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save("", "", "schema", b"invalid schema").unwrap();
  let (mgr, _) = memory_manager(&dir, &store);

  let err = mgr.load_schema().unwrap_err();
  assert!(
    err.to_string().contains("could not parse storage schema document"),
    "{err}"
  );
  assert!(mgr.schema().is_empty());
}

#[test]
fn invalid_schema_fails_pass_through_reads() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save("", "", "schema", b"{not json").unwrap();
  let (mgr, _) = memory_manager(&dir, &store);

  let err = ClaimStore::new(&mgr).list_installations().unwrap_err();
  assert!(err.to_string().contains("could not parse storage schema document"));
}

// ─── should_migrate_claims ───────────────────────────────────────────────────

#[test]
fn should_migrate_claims_by_version() {
  let cases = [
    ("old schema", "cnab-claim-1.0.0-DRAFT", true),
    ("missing schema", "", true),
    ("current schema", CLAIM_SCHEMA_VERSION, false),
  ];

  for (name, version, want) in cases {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    save_schema(&store, &Schema { claims: version.into(), ..Schema::default() });
    let (mgr, _) = memory_manager(&dir, &store);

    mgr.load_schema().unwrap();
    assert_eq!(mgr.should_migrate_claims(), want, "{name}");
  }
}

#[test]
fn should_migrate_claims_follows_injected_version() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  save_schema(&store, &Schema::current());

  let newer = Schema { claims: "cnab-claim-2.0.0".into(), ..Schema::current() };
  let mgr = StorageManager::new(
    StorageConfig::new(dir.path()).with_versions(newer),
    &store,
  );
  mgr.load_schema().unwrap();
  assert!(mgr.should_migrate_claims());
}

// ─── Migrate: filesystem ─────────────────────────────────────────────────────

#[test]
fn migrate_claims_rewrites_legacy_files() {
  for (file, renamed) in [("has-installation", false), ("has-name", true)] {
    let dir = TempDir::new().unwrap();
    add_legacy_file(dir.path(), file);
    let (mgr, stderr) = fs_manager(&dir);
    let claims = ClaimStore::new(&mgr);

    let logfile = mgr.migrate().unwrap().expect("a migration should run");

    let c = claims.read_last_claim(INSTALLATION).unwrap();
    assert_eq!(c.installation, INSTALLATION, "{file}");

    let output = stderr.contents();
    assert!(output.contains(BANNER), "{file}: {output}");
    assert_eq!(output.contains(RENAME_NOTE), renamed, "{file}: {output}");

    let logged = fs::read_to_string(&logfile).unwrap();
    assert_eq!(logged, output, "{file}: logfile must mirror stderr");

    // Second pass in the same session: nothing left to do.
    stderr.clear();
    claims.read_last_claim(INSTALLATION).unwrap();
    assert_eq!(mgr.migrate().unwrap(), None);
    assert!(!stderr.contents().contains(BANNER));
  }
}

#[test]
fn migrate_writes_log_into_configured_directory() {
  let dir = TempDir::new().unwrap();
  let logs = TempDir::new().unwrap();
  add_legacy_file(dir.path(), "has-name");
  let mgr = StorageManager::new(
    StorageConfig::new(dir.path()).with_log_dir(logs.path()),
    FilesystemStore::new(dir.path()),
  )
  .with_diagnostics(SharedBuffer::default());

  let logfile = mgr.migrate().unwrap().unwrap();
  assert_eq!(logfile.parent(), Some(logs.path()));
}

#[test]
fn no_migration_for_migrated_home() {
  let dir = TempDir::new().unwrap();
  copy_migrated_home(dir.path());
  let record = dir.path().join("installations/example-exec-outputs.json");
  let before = fs::read(&record).unwrap();

  let (mgr, stderr) = fs_manager(&dir);
  let claims = ClaimStore::new(&mgr);

  let c = claims.read_last_claim(INSTALLATION).unwrap();
  assert_eq!(c.installation, INSTALLATION);
  assert_eq!(mgr.migrate().unwrap(), None);
  assert!(!stderr.contents().contains(BANNER));
  assert_eq!(fs::read(&record).unwrap(), before);
}

#[test]
fn no_migration_for_empty_home() {
  let dir = TempDir::new().unwrap();
  let (mgr, stderr) = fs_manager(&dir);
  let claims = ClaimStore::new(&mgr);

  assert!(claims.list_installations().unwrap().is_empty());
  assert_eq!(mgr.migrate().unwrap(), None);
  assert!(stderr.contents().is_empty());
  assert!(!dir.path().join("logs").exists());
}

#[test]
fn migrate_install() {
  let dir = TempDir::new().unwrap();
  add_legacy_file(dir.path(), "installed");
  let (mgr, _) = fs_manager(&dir);
  let claims = ClaimStore::new(&mgr);

  mgr.migrate().unwrap();

  assert!(
    !dir.path().join("claims/installed.json").exists(),
    "the legacy claims file should be removed"
  );
  let i = claims.read_installation("mybun").unwrap();
  assert_eq!(i.name, "mybun");
  assert_eq!(i.claims.len(), 1);
  assert_eq!(i.last_claim().unwrap().action, Action::Install);
  assert_eq!(i.last_status(), Status::Succeeded);
}

#[test]
fn migrate_upgrade() {
  let dir = TempDir::new().unwrap();
  add_legacy_file(dir.path(), "upgraded");
  let (mgr, _) = fs_manager(&dir);
  let claims = ClaimStore::new(&mgr);

  mgr.migrate().unwrap();

  assert!(!dir.path().join("claims/upgraded.json").exists());
  let i = claims.read_installation("mybun").unwrap();
  assert_eq!(i.name, "mybun");
  assert_eq!(i.claims.len(), 2);

  let last = i.last_claim().unwrap();
  assert_eq!(last.action, Action::Upgrade);
  assert_eq!(i.last_status(), Status::Succeeded);

  let install = &i.claims[0];
  assert_eq!(install.action, Action::Install);
  assert_eq!(install.status(), Status::Unknown);
}

#[test]
fn migrate_keeps_outputs() {
  let dir = TempDir::new().unwrap();
  add_legacy_file(dir.path(), "has-installation");
  let (mgr, _) = fs_manager(&dir);

  mgr.migrate().unwrap().unwrap();
  let c = ClaimStore::new(&mgr).read_last_claim(INSTALLATION).unwrap();
  let result = c.last_result().unwrap();
  assert_eq!(result.status, Status::Succeeded);
  assert_eq!(result.outputs["kubeconfig"], "apiVersion: v1");
}

#[test]
fn migrate_keeps_outputs_and_custom_data_of_claims_without_results() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store
    .save(
      CLAIMS_GROUP,
      "",
      "mybun",
      br#"[{"name": "mybun", "revision": "r1", "action": "install",
            "custom": {"team": "ops"}, "labels": ["blue"],
            "outputs": {"kubeconfig": "apiVersion: v1"}}]"#,
    )
    .unwrap();
  let (mgr, stderr) = memory_manager(&dir, &store);

  mgr.migrate().unwrap().unwrap();

  let record = String::from_utf8(store.read("installations", "", "mybun").unwrap()).unwrap();
  assert!(record.contains("kubeconfig"), "{record}");
  let c = ClaimStore::new(&mgr).read_last_claim("mybun").unwrap();
  assert_eq!(c.status(), Status::Unknown);
  assert_eq!(c.last_result().unwrap().outputs["kubeconfig"], "apiVersion: v1");
  assert_eq!(c.custom, Some(serde_json::json!({"team": "ops"})));

  let output = stderr.contents();
  assert!(
    output.contains("Dropping unsupported field(s) labels from claim r1"),
    "{output}"
  );
}

#[test]
fn migrated_schema_survives_a_new_session() {
  let dir = TempDir::new().unwrap();
  add_legacy_file(dir.path(), "installed");
  {
    let (mgr, _) = fs_manager(&dir);
    mgr.migrate().unwrap().unwrap();
  }

  let (mgr, stderr) = fs_manager(&dir);
  mgr.load_schema().unwrap();
  assert!(!mgr.should_migrate_claims());
  assert_eq!(mgr.migrate().unwrap(), None);
  assert!(stderr.contents().is_empty());
}

// ─── Migrate: grouping and edge cases ────────────────────────────────────────

#[test]
fn migrate_is_idempotent() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save(CLAIMS_GROUP, "", "mybun", fixture("upgraded")).unwrap();
  let (mgr, stderr) = memory_manager(&dir, &store);

  mgr.migrate().unwrap().unwrap();
  let installation = store.read("installations", "", "mybun").unwrap();
  let schema = store.read("", "", "schema").unwrap();

  stderr.clear();
  assert_eq!(mgr.migrate().unwrap(), None);
  assert!(stderr.contents().is_empty());
  assert_eq!(store.read("installations", "", "mybun").unwrap(), installation);
  assert_eq!(store.read("", "", "schema").unwrap(), schema);
  assert!(store.list(CLAIMS_GROUP, "").unwrap().is_empty());
}

#[test]
fn claims_are_grouped_across_files_in_discovery_order() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store
    .save(
      CLAIMS_GROUP,
      "",
      "a",
      br#"[{"installation": "x", "id": "x1", "action": "install"},
           {"installation": "y", "id": "y1", "action": "install"}]"#,
    )
    .unwrap();
  store
    .save(
      CLAIMS_GROUP,
      "",
      "b",
      br#"[{"name": "x", "id": "x2", "action": "upgrade"}]"#,
    )
    .unwrap();
  let (mgr, _) = memory_manager(&dir, &store);

  let (_, report) = mgr.migrate_with_report().unwrap().unwrap();
  assert_eq!(report.installations, vec!["x", "y"]);
  assert_eq!(report.migrated_files, vec!["a", "b"]);
  assert_eq!(report.renamed_claims, 1);

  let claims = ClaimStore::new(&mgr);
  let x = claims.read_installation("x").unwrap();
  let ids: Vec<_> = x.claims.iter().map(|c| c.id.as_str()).collect();
  assert_eq!(ids, vec!["x1", "x2"]);
  assert_eq!(claims.read_installation("y").unwrap().claims.len(), 1);
}

#[test]
fn malformed_file_is_skipped_and_kept() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save(CLAIMS_GROUP, "", "broken", b"{{{").unwrap();
  store.save(CLAIMS_GROUP, "", "mybun", fixture("installed")).unwrap();
  let (mgr, stderr) = memory_manager(&dir, &store);

  let (_, report) = mgr.migrate_with_report().unwrap().unwrap();
  assert_eq!(report.skipped_files, vec!["broken"]);
  assert_eq!(report.migrated_files, vec!["mybun"]);
  assert!(stderr.contents().contains("Skipping malformed claims file broken"));

  assert_eq!(store.list(CLAIMS_GROUP, "").unwrap(), vec!["broken"]);
  assert!(!mgr.should_migrate_claims());
}

#[test]
fn info_logging_does_not_split_stderr_from_logfile() {
  let dir = TempDir::new().unwrap();
  add_legacy_file(dir.path(), "installed");
  fs::write(dir.path().join("claims/broken.json"), b"{{{").unwrap();
  let (mgr, stderr) = fs_manager(&dir);

  // Log events share the interactive stream, as they do in the binary.
  let events = stderr.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_writer(move || events.clone())
    .with_max_level(tracing::Level::INFO)
    .finish();
  let logfile = tracing::subscriber::with_default(subscriber, || mgr.migrate())
    .unwrap()
    .unwrap();

  let output = stderr.contents();
  assert!(output.contains("Skipping malformed claims file broken"), "{output}");
  assert_eq!(fs::read_to_string(&logfile).unwrap(), output);
}

#[test]
fn empty_file_is_removed_without_installations() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save(CLAIMS_GROUP, "", "mybun", b"").unwrap();
  let (mgr, _) = memory_manager(&dir, &store);

  let (_, report) = mgr.migrate_with_report().unwrap().unwrap();
  assert!(report.installations.is_empty());
  assert!(store.list(CLAIMS_GROUP, "").unwrap().is_empty());
  assert!(store.list("installations", "").unwrap().is_empty());
  assert_eq!(mgr.schema().claims, CLAIM_SCHEMA_VERSION);
}

#[test]
fn migration_keeps_known_versions_of_other_domains() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  save_schema(&store, &old_schema());
  let (mgr, _) = memory_manager(&dir, &store);

  mgr.migrate().unwrap().unwrap();
  let stored = Schema::parse(&store.read("", "", "schema").unwrap()).unwrap();
  assert_eq!(stored.claims, CLAIM_SCHEMA_VERSION);
  assert_eq!(stored.credentials, "cnab-credentials-1.0.0-DRAFT");
  assert_eq!(stored.parameters, Schema::current().parameters);
}

/// Fails every delete, as a read-only or unreachable store would.
struct NoDeleteStore<'a>(&'a MemoryStore);

impl BackingStore for NoDeleteStore<'_> {
  fn save(&self, group: &str, item_type: &str, name: &str, data: &[u8]) -> wharf_core::Result<()> {
    self.0.save(group, item_type, name, data)
  }

  fn read(&self, group: &str, item_type: &str, name: &str) -> wharf_core::Result<Vec<u8>> {
    self.0.read(group, item_type, name)
  }

  fn list(&self, group: &str, item_type: &str) -> wharf_core::Result<Vec<String>> {
    self.0.list(group, item_type)
  }

  fn delete(&self, group: &str, item_type: &str, name: &str) -> wharf_core::Result<()> {
    Err(wharf_core::Error::Io {
      op:     "delete",
      key:    RecordKey::new(group, item_type, name),
      source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
    })
  }
}

#[test]
fn failed_delete_aborts_without_schema_update() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save(CLAIMS_GROUP, "", "mybun", fixture("upgraded")).unwrap();

  let failing = StorageManager::new(StorageConfig::new(dir.path()), NoDeleteStore(&store))
    .with_diagnostics(SharedBuffer::default());
  let err = failing.migrate().unwrap_err();
  assert!(err.to_string().contains("read-only"), "{err}");
  assert!(store.read_optional("", "", "schema").unwrap().is_none());
  assert_eq!(store.list(CLAIMS_GROUP, "").unwrap(), vec!["mybun"]);
  let partial = store.read("installations", "", "mybun").unwrap();

  // A retry on a healthy store finishes the job with the same result.
  let (mgr, _) = memory_manager(&dir, &store);
  mgr.migrate().unwrap().unwrap();
  assert_eq!(store.read("installations", "", "mybun").unwrap(), partial);
  assert!(store.list(CLAIMS_GROUP, "").unwrap().is_empty());
  assert!(!mgr.should_migrate_claims());
}

// ─── Pass-through store ──────────────────────────────────────────────────────

#[test]
fn first_save_persists_initialised_schema() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  let (mgr, _) = memory_manager(&dir, &store);

  ClaimStore::new(&mgr)
    .save_installation(&wharf_core::installation::Installation::new("mybun"))
    .unwrap();

  let stored = Schema::parse(&store.read("", "", "schema").unwrap()).unwrap();
  assert_eq!(stored, Schema::current());
  assert_eq!(store.list("installations", "").unwrap(), vec!["mybun"]);
}

#[test]
fn save_into_legacy_home_does_not_write_schema() {
  let dir = TempDir::new().unwrap();
  let store = MemoryStore::new();
  store.save(CLAIMS_GROUP, "", "mybun", fixture("installed")).unwrap();
  let (mgr, _) = memory_manager(&dir, &store);

  mgr.save("credentials", "", "creds", b"{}").unwrap();
  assert!(store.read_optional("", "", "schema").unwrap().is_none());
  assert!(mgr.should_migrate_claims());
}
