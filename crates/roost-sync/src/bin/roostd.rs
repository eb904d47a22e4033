//! roostd — background sync daemon.
//!
//! Reads `roostd.toml` (or the path specified with `--config`), opens the
//! local SQLite capture store, and pushes new captures into the vault on an
//! interval.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use roost_core::store::CaptureStore as _;
use roost_store_sqlite::SqliteStore;
use roost_sync::{
  SyncEngine,
  scheduler::{self, Scheduler, SyncHost, SyncSettings},
};
use roost_vault::{VaultClient, VaultConfig};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Roost vault sync daemon")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "roostd.toml")]
  config: PathBuf,
}

/// Shape of the configuration file. `ROOST_*` environment variables
/// override individual keys.
#[derive(Debug, Clone, Deserialize)]
struct DaemonConfig {
  store_path:       PathBuf,
  vault_url:        String,
  #[serde(default)]
  vault_token:      Option<String>,
  #[serde(default = "default_source")]
  source:           String,
  #[serde(default = "default_folder")]
  folder:           String,
  #[serde(default = "default_interval")]
  interval_minutes: u64,
  #[serde(default = "default_enabled")]
  enabled:          bool,
}

fn default_source() -> String {
  "timeline".to_string()
}
fn default_folder() -> String {
  "roost".to_string()
}
fn default_interval() -> u64 {
  30
}
fn default_enabled() -> bool {
  true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROOST"))
    .build()
    .context("failed to read config file")?;

  let cfg: DaemonConfig = settings
    .try_deserialize()
    .context("failed to deserialise DaemonConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let counts = store.count().await.context("failed to count store rows")?;
  tracing::info!(
    posts = counts.posts,
    profiles = counts.profiles,
    captures = counts.captures,
    "opened capture store"
  );

  let vault = VaultClient::new(VaultConfig {
    base_url: cfg.vault_url.clone(),
    token:    cfg.vault_token.clone().unwrap_or_default(),
  })
  .context("failed to build vault client")?;

  let engine = SyncEngine::new(store, vault, cfg.source.clone());
  let host = FileHost {
    offset_path: store_path.with_extension("last-sync"),
  };
  let sched = Arc::new(Scheduler::new(engine, host));

  let (settings_tx, settings_rx) = watch::channel(SyncSettings {
    enabled:          cfg.enabled,
    interval_minutes: cfg.interval_minutes,
    token:            cfg.vault_token.clone(),
    folder:           cfg.folder.clone(),
  });
  let task = tokio::spawn(scheduler::run(Arc::clone(&sched), settings_rx));

  tracing::info!(
    source = %cfg.source,
    folder = %cfg.folder,
    interval_minutes = scheduler::clamp_interval(cfg.interval_minutes),
    "roostd running"
  );

  tokio::signal::ctrl_c()
    .await
    .context("waiting for shutdown signal")?;
  tracing::info!("shutting down");

  // Closing the settings channel stops the scheduler loop.
  drop(settings_tx);
  task.await.context("scheduler task panicked")?;

  Ok(())
}

// ─── File-backed sync host ────────────────────────────────────────────────────

/// Persists the last-sync offset in a sidecar file next to the store. A
/// daemon has no foreground/background distinction, so the visibility and
/// connectivity probes always allow a pass; a dead network surfaces as a
/// transport error on the pass itself.
struct FileHost {
  offset_path: PathBuf,
}

impl SyncHost for FileHost {
  async fn last_sync(&self) -> Option<i64> {
    let raw = tokio::fs::read_to_string(&self.offset_path).await.ok()?;
    raw.trim().parse().ok()
  }

  async fn set_last_sync(&self, epoch_ms: i64) {
    if let Err(err) =
      tokio::fs::write(&self.offset_path, epoch_ms.to_string()).await
    {
      tracing::warn!(
        path = ?self.offset_path,
        error = %err,
        "failed to persist last-sync offset"
      );
    }
  }

  fn is_visible(&self) -> bool {
    true
  }

  fn is_online(&self) -> bool {
    true
  }
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
