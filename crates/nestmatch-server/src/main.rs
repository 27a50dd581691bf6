//! nestmatch server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and serves the household API over HTTP.
//!
//! # Local sessions
//!
//! Session issuance normally belongs to an upstream identity service. For
//! local use, create a user and print a bearer token for it:
//!
//! ```
//! cargo run -p nestmatch-server -- --seed-user alice@example.com
//! ```

mod settings;

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use nestmatch_api::{AppState, Engine, auth};
use nestmatch_core::store::NestStore;
use nestmatch_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "nestmatch household API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create a user with this email, print a session token for it, and exit.
  #[arg(long, value_name = "EMAIL")]
  seed_user: Option<String>,
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
    .add_source(config::Environment::with_prefix("NESTMATCH"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.validate().context("invalid configuration")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(email) = cli.seed_user {
    return seed_user(&store, email).await;
  }

  let engine = Engine::new(Arc::new(store), server_cfg.engine());
  let app = nestmatch_api::router(AppState::new(engine, server_cfg.limits()));
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .await
    .context("server error")?;

  Ok(())
}

async fn seed_user(store: &SqliteStore, email: String) -> anyhow::Result<()> {
  let email = nestmatch_core::membership::normalize_email(&email)?;
  let user = store
    .create_user(email)
    .await
    .context("failed to create user")?;

  let token = auth::new_token();
  store
    .issue_session(user.user_id, auth::token_digest(&token))
    .await
    .context("failed to issue session")?;

  println!("user_id: {}", user.user_id);
  println!("token:   {token}");
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
