use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use fundsync::api::ApiClient;
use fundsync::commands::{self, Command};
use fundsync::config::Config;
use fundsync::credentials::{CredentialProvider, EnvCredentials, SessionCredentials};
use fundsync::logging;
use fundsync::storage::SqliteStorage;
use fundsync::stores::FinanceStores;

#[derive(Parser, Debug)]
#[command(name = "fundsync")]
#[command(about = "Offline-tolerant sync for transactions, budgets and goals")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fundsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Bearer token (default: FUNDSYNC_TOKEN environment variable)
  #[arg(long)]
  token: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&Config::data_dir()?.join("logs"))?;

  let credentials: Arc<dyn CredentialProvider> = match args.token {
    Some(token) => Arc::new(SessionCredentials::new(Some(token))),
    None => Arc::new(EnvCredentials),
  };

  let client = ApiClient::new(&config.api)?;
  let storage = Arc::new(SqliteStorage::open(&config.storage_path()?)?);
  let stores = FinanceStores::new(&client, storage, credentials, &config.store);

  // Every invocation is a cold start
  stores.init();

  let output = commands::run(&stores, args.command).await?;
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}
