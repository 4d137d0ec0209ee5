//! `wharf` — inspect and migrate a Wharf storage home.
//!
//! # Usage
//!
//! ```
//! wharf storage status
//! wharf storage migrate
//! wharf installations list
//! wharf --home /srv/wharf installations show mybun
//! ```

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use wharf_storage::StorageConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "wharf", version, about = "Manage the Wharf installation store")]
struct Cli {
  /// Path to a TOML config file (home, log_dir).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Storage home directory (default: ~/.wharf).
  #[arg(long, env = "WHARF_HOME")]
  home: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Inspect or migrate the storage schema.
  Storage {
    #[command(subcommand)]
    command: StorageCommand,
  },
  /// Read installation records.
  Installations {
    #[command(subcommand)]
    command: InstallationsCommand,
  },
}

#[derive(Subcommand, Debug)]
enum StorageCommand {
  /// Show stored and current schema versions.
  Status,
  /// Convert legacy claims data to the current format.
  Migrate,
}

#[derive(Subcommand, Debug)]
enum InstallationsCommand {
  /// List installations with their last status.
  List,
  /// Show the claim history of one installation.
  Show { name: String },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref(), cli.home)?;
  let mgr = commands::open(config);

  match cli.command {
    Command::Storage { command: StorageCommand::Status } => commands::status(&mgr),
    Command::Storage { command: StorageCommand::Migrate } => commands::migrate(&mgr),
    Command::Installations { command: InstallationsCommand::List } => {
      commands::list_installations(&mgr)
    }
    Command::Installations { command: InstallationsCommand::Show { name } } => {
      commands::show_installation(&mgr, &name)
    }
  }
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// Defaults, then the config file, then `WHARF_*` env vars, then flags.
fn load_config(
  file: Option<&Path>,
  home: Option<PathBuf>,
) -> anyhow::Result<StorageConfig> {
  let mut builder = config::Config::builder().set_default("home", "~/.wharf")?;
  if let Some(file) = file {
    builder = builder.add_source(config::File::from(file).required(true));
  }
  let settings = builder
    .add_source(config::Environment::with_prefix("WHARF"))
    .set_override_option("home", home.map(|h| h.to_string_lossy().into_owned()))?
    .build()
    .context("failed to read configuration")?;

  let mut cfg: StorageConfig = settings
    .try_deserialize()
    .context("failed to deserialise storage configuration")?;
  cfg.home = expand_tilde(&cfg.home);
  cfg.log_dir = cfg.log_dir.as_deref().map(expand_tilde);
  Ok(cfg)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flag_overrides_default_home() {
    let cfg = load_config(None, Some(PathBuf::from("/srv/wharf"))).unwrap();
    assert_eq!(cfg.home, PathBuf::from("/srv/wharf"));
    assert_eq!(cfg.log_dir(), PathBuf::from("/srv/wharf/logs"));
    assert_eq!(cfg.versions, wharf_storage::Schema::current());
  }

  #[test]
  fn config_file_sets_log_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("wharf.toml");
    std::fs::write(&file, "home = \"/data/wharf\"\nlog_dir = \"/var/log/wharf\"\n")
      .unwrap();

    let cfg = load_config(Some(&file), None).unwrap();
    assert_eq!(cfg.home, PathBuf::from("/data/wharf"));
    assert_eq!(cfg.log_dir(), PathBuf::from("/var/log/wharf"));
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x")), PathBuf::from(home).join("x"));
    assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
  }
}
