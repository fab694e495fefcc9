//! skein-ingest binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and ingests line-delimited stream JSON from a file or stdin until
//! the stream ends or ctrl-c is pressed. Queued events are drained before
//! exit. The exit status is non-zero after a transport failure or when the
//! store-failure budget runs out.
//!
//! ```text
//! skein-ingest --config config.toml --source stream.jsonl
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use skein_ingest::{IngestConfig, Ingestor, JsonlSource};
use skein_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Skein stream ingester")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Read events from this file instead of the configured source (`-` for
  /// stdin).
  #[arg(short, long)]
  source: Option<PathBuf>,
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
    .add_source(
      config::Environment::with_prefix("SKEIN")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let mut cfg: IngestConfig = settings
    .try_deserialize()
    .context("failed to deserialise IngestConfig")?;
  if let Some(source) = cli.source {
    cfg.source = source;
  }

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let source_path = expand_tilde(&cfg.source);
  let source = JsonlSource::open(&source_path, cfg.skip_malformed)
    .await
    .with_context(|| format!("failed to open source {source_path:?}"))?;

  let store = Arc::new(store);
  let ingestor = Ingestor::new(store.clone(), cfg.pipeline());

  if let Some(address) = cfg.status_addr {
    let app = skein_ingest::status::router(ingestor.subscribe());
    let listener = TcpListener::bind(address)
      .await
      .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!("Status on http://{address}");
    tokio::spawn(async move {
      if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "status server stopped");
      }
    });
  }

  let shutdown = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "cannot listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  let outcome = ingestor.run(source, shutdown).await;

  match (store.count_posts().await, store.count_authors().await) {
    (Ok(posts), Ok(authors)) => tracing::info!(posts, authors, "store totals"),
    (Err(e), _) | (_, Err(e)) => tracing::warn!(error = %e, "cannot read store totals"),
  }

  let stats = outcome.context("ingestion stopped")?;
  tracing::info!(
    events = stats.events_consumed,
    posts = stats.posts_inserted,
    authors = stats.authors_inserted,
    store_failures = stats.store_failures,
    truncated_chains = stats.truncated_chains,
    "done"
  );
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
