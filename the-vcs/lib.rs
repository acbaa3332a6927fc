//! Access to files stored in a remote Git hosting service.
//!
//! [`RemoteRepository`] is the capability the workspace sync controller
//! consumes. [`GitHubClient`] implements it over the GitHub REST API.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

mod github;
mod locator;

pub use github::GitHubClient;
pub use locator::{
  parse_blob_url,
  parse_repo_url,
};

/// Default branch used when none is configured or given in a URL.
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
  pub owner:  String,
  pub repo:   String,
  pub branch: String,
}

impl RepoRef {
  pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
    Self {
      owner:  owner.into(),
      repo:   repo.into(),
      branch: DEFAULT_BRANCH.to_string(),
    }
  }

  pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
    self.branch = branch.into();
    self
  }
}

impl fmt::Display for RepoRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
  }
}

/// Content-addressed reference to one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
  pub sha: String,
  /// API location of the blob, when the listing provided one.
  pub url: Option<String>,
}

/// One file of a repository listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
  pub path: String,
  pub blob: BlobRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
  pub path:    String,
  pub sha:     String,
  pub content: Vec<u8>,
}

/// Outcome of a successful [`RemoteRepository::put_blob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
  pub sha: String,
}

#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("{0}: not found")]
  NotFound(String),
  /// The base SHA given to a write no longer matches the remote file.
  #[error("{path}: remote changed since last sync ({message})")]
  Conflict { path: String, message: String },
  #[error("authentication rejected: {0}")]
  Unauthorized(String),
  #[error("remote returned {status}: {message}")]
  Api { status: u16, message: String },
  #[error("invalid repository url `{0}`")]
  InvalidUrl(String),
  #[error("malformed response: {0}")]
  Malformed(String),
  #[error(transparent)]
  Decode(#[from] base64::DecodeError),
  #[error(transparent)]
  Http(#[from] reqwest::Error),
}

impl RemoteError {
  /// Maps a non-success HTTP status for `path` to an error.
  pub fn from_status(status: u16, message: String, path: &str) -> Self {
    match status {
      404 => Self::NotFound(path.to_string()),
      409 => {
        Self::Conflict {
          path: path.to_string(),
          message,
        }
      },
      422 if message.to_lowercase().contains("sha") => {
        Self::Conflict {
          path: path.to_string(),
          message,
        }
      },
      401 | 403 => Self::Unauthorized(message),
      _ => Self::Api { status, message },
    }
  }

  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::Conflict { .. })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

#[async_trait]
pub trait RemoteRepository: Send + Sync {
  /// Every file (blob) of `repo` at its branch, in listing order.
  async fn list_files(&self, repo: &RepoRef) -> Result<Vec<RemoteEntry>>;

  async fn get_blob(&self, repo: &RepoRef, blob: &BlobRef) -> Result<Vec<u8>>;

  /// Current blob SHA of `path`, [`RemoteError::NotFound`] if absent.
  async fn get_file_sha(&self, repo: &RepoRef, path: &str) -> Result<String>;

  async fn get_file(&self, repo: &RepoRef, path: &str) -> Result<RemoteFile>;

  /// Writes `content` to `path`. With a `base_sha` the write only succeeds
  /// if the remote file is still at that SHA, otherwise it fails with
  /// [`RemoteError::Conflict`]. Without one the file must not exist yet.
  async fn put_blob(
    &self,
    repo: &RepoRef,
    path: &str,
    content: &[u8],
    message: &str,
    base_sha: Option<&str>,
  ) -> Result<PutResult>;
}
