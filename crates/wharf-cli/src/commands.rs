//! Subcommand implementations.

use anyhow::{Context, Result};
use wharf_core::repository::ClaimStore;
use wharf_store_fs::FilesystemStore;
use wharf_storage::{StorageConfig, StorageManager};

pub type Manager = StorageManager<FilesystemStore>;

pub fn open(config: StorageConfig) -> Manager {
  let store = FilesystemStore::new(config.home());
  StorageManager::new(config, store)
}

fn warn_if_stale(mgr: &Manager) {
  if mgr.should_migrate_claims() {
    tracing::warn!(
      "claims data in {} uses an older format; run `wharf storage migrate`",
      mgr.config().home().display()
    );
  }
}

// ─── storage ─────────────────────────────────────────────────────────────────

pub fn status(mgr: &Manager) -> Result<()> {
  mgr.load_schema().context("failed to load storage schema")?;
  let stored = mgr.schema();
  let current = &mgr.config().versions;
  let or_unknown = |v: &str| if v.is_empty() { "(unknown)".to_owned() } else { v.to_owned() };

  println!("home:        {}", mgr.config().home().display());
  println!("claims:      {} (current {})", or_unknown(&stored.claims), current.claims);
  println!(
    "credentials: {} (current {})",
    or_unknown(&stored.credentials),
    current.credentials
  );
  println!(
    "parameters:  {} (current {})",
    or_unknown(&stored.parameters),
    current.parameters
  );
  println!(
    "migration:   {}",
    if mgr.should_migrate_claims() { "required" } else { "not required" }
  );
  Ok(())
}

pub fn migrate(mgr: &Manager) -> Result<()> {
  match mgr.migrate().context("claims migration failed")? {
    Some(logfile) => println!("migration log: {}", logfile.display()),
    None => println!("no migration required"),
  }
  Ok(())
}

// ─── installations ───────────────────────────────────────────────────────────

pub fn list_installations(mgr: &Manager) -> Result<()> {
  let claims = ClaimStore::new(mgr);
  let names = claims
    .list_installations()
    .context("failed to list installations")?;
  warn_if_stale(mgr);

  for name in names {
    let installation = claims
      .read_installation(&name)
      .with_context(|| format!("failed to read installation {name}"))?;
    let action = installation
      .last_claim()
      .map_or("-".to_owned(), |c| c.action.to_string());
    println!("{name:<32} {action:<12} {}", installation.last_status());
  }
  Ok(())
}

pub fn show_installation(mgr: &Manager, name: &str) -> Result<()> {
  let claims = ClaimStore::new(mgr);
  let installation = claims
    .read_installation(name)
    .with_context(|| format!("failed to read installation {name}"))?;
  warn_if_stale(mgr);

  println!("installation: {}", installation.name);
  println!("last status:  {}", installation.last_status());
  for claim in &installation.claims {
    println!(
      "  {}  {:<12} {:<10} {}",
      claim.created.to_rfc3339(),
      claim.action.as_str(),
      claim.status().to_string(),
      claim.id
    );
  }
  Ok(())
}
