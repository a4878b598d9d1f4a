use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the finance API, e.g. "https://api.example.com"
  pub url: String,
  /// Per-request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Override for the snapshot database location
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Run mutating operations on a store one at a time
  #[serde(default = "default_serialize_mutations")]
  pub serialize_mutations: bool,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      serialize_mutations: default_serialize_mutations(),
    }
  }
}

fn default_serialize_mutations() -> bool {
  true
}

/// Overrides the config search when `--config` is not given
const CONFIG_ENV: &str = "FUNDSYNC_CONFIG";

impl Config {
  /// Load the configuration from `explicit`, else `$FUNDSYNC_CONFIG`, else the
  /// first existing entry of [`Config::candidates`].
  ///
  /// A path named explicitly or through the environment must exist.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let named = explicit
      .map(Path::to_path_buf)
      .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let path = match named {
      Some(path) if path.is_file() => path,
      Some(path) => return Err(eyre!("Config file not found: {}", path.display())),
      None => {
        let candidates = Self::candidates();
        let found = candidates.iter().find(|p| p.is_file()).cloned();
        found.ok_or_else(|| {
          let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
          eyre!("No fundsync configuration found (tried {})", tried.join(", "))
        })?
      }
    };

    let contents = std::fs::read_to_string(&path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Places searched for a config file, most specific first: the working
  /// directory, the user config dir, then next to the snapshot database.
  pub fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("fundsync.yaml")];
    paths.extend(dirs::config_dir().map(|dir| dir.join("fundsync").join("config.yaml")));
    paths.extend(Self::data_dir().ok().map(|dir| dir.join("config.yaml")));
    paths
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Directory holding the snapshot database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("fundsync"))
  }

  /// Snapshot database location, honoring `storage.path`.
  pub fn storage_path(&self) -> Result<PathBuf> {
    match &self.storage.path {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("store.db")),
    }
  }
}
