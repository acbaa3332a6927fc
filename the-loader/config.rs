//! `config.toml` for the shell.
//!
//! ```toml
//! [github]
//! token = "ghp_..."
//! api-url = "https://api.github.com"
//! branch = "main"
//! commit-message = "Update {path}"
//!
//! [sync]
//! clone-limit = 50
//! include-hidden = false
//! ignore = ["target", "node_modules"]
//!
//! [log]
//! level = "info"
//! ```

use std::{
  fs,
  io,
  path::{
    Path,
    PathBuf,
  },
};

use serde::Deserialize;
use thiserror::Error;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("invalid config {path}: {source}")]
  Parse {
    path:   PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
  pub github: GitHubConfig,
  pub sync:   SyncConfig,
  pub log:    LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GitHubConfig {
  pub token:          Option<String>,
  pub api_url:        Option<String>,
  pub branch:         String,
  /// `{path}` is replaced with the remote path of the pushed file.
  pub commit_message: String,
}

impl Default for GitHubConfig {
  fn default() -> Self {
    Self {
      token:          None,
      api_url:        None,
      branch:         "main".into(),
      commit_message: "Update {path}".into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SyncConfig {
  pub clone_limit:    usize,
  pub include_hidden: bool,
  pub ignore:         Vec<String>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      clone_limit:    50,
      include_hidden: false,
      ignore:         Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LogConfig {
  pub level: Option<String>,
}

impl Config {
  pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
    toml::from_str(text).map_err(|source| {
      ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      }
    })
  }

  /// Reads `path`; a missing file yields the defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    match fs::read_to_string(path) {
      Ok(text) => Self::parse(path, &text),
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        log::debug!("no config at {}, using defaults", path.display());
        Ok(Self::default())
      },
      Err(source) => {
        Err(ConfigError::Io {
          path: path.to_path_buf(),
          source,
        })
      },
    }
  }

  /// Loads the user config and applies `GITHUB_TOKEN`.
  pub fn load_user() -> Result<Self, ConfigError> {
    let mut config = Self::load(&crate::config_file())?;
    config.apply_token(std::env::var(TOKEN_ENV).ok());
    Ok(config)
  }

  pub fn apply_token(&mut self, token: Option<String>) {
    if let Some(token) = token.filter(|token| !token.is_empty()) {
      self.github.token = Some(token);
    }
  }
}
