//! visita server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `VISITA_*` environment variables, opens the SQLite store, and serves the
//! official visits API over HTTP with the expiry sweep in the background.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `VISITA_EVENTS__ENABLED=false`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use visita_clients::{HttpQueries, InMemoryQueries};
use visita_server::{DirectoryBackend, HttpBackend, ServerConfig, engine, serve};
use visita_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Official visits server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VISITA").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  let sweep = server_cfg.expiry_sweep();

  match server_cfg.lookups.http {
    Some(lookups) => {
      let queries = HttpQueries::new(lookups).context("failed to build lookup clients")?;
      let engine = engine::<HttpBackend>(store, queries, server_cfg.events);
      tracing::info!("Listening on http://{address}");
      serve(Arc::new(engine), listener, sweep).await
    }
    None => {
      tracing::warn!("no lookup services configured; answering from the configured directory");
      let queries = InMemoryQueries::from_directory(server_cfg.lookups.directory);
      let engine = engine::<DirectoryBackend>(store, queries, server_cfg.events);
      tracing::info!("Listening on http://{address}");
      serve(Arc::new(engine), listener, sweep).await
    }
  }
  .context("server error")?;

  Ok(())
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
