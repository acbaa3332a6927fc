//! Subcommand handlers.

use std::{
  path::{
    Path,
    PathBuf,
  },
  sync::Arc,
};

use anyhow::{
  Context,
  Result,
};
use the_lib::{
  FileId,
  Workspace,
  buffer::RopeEngine,
  storage::StorageHandle,
};
use the_runtime::{
  FsDirectory,
  FsHandle,
  SyncController,
  SyncOptions,
  WalkOptions,
};
use the_shell_loader::config::Config;
use the_shell_vcs::{
  GitHubClient,
  parse_blob_url,
  parse_repo_url,
};

use crate::{
  Command,
  render,
};

pub async fn run(command: Command, config: &Config) -> Result<()> {
  match command {
    Command::Open { dir } => open(config, &dir).await,
    Command::Clone {
      url,
      branch,
      limit,
      out,
    } => clone(config, &url, branch, limit, out.as_deref()).await,
    Command::Fetch { url } => fetch(config, &url).await,
    Command::Push {
      file,
      repo,
      path,
      branch,
    } => push(config, &file, &repo, path.as_deref(), branch).await,
    Command::Minify { file, write } => rewrite(config, &file, write, Rewrite::Minify).await,
    Command::Format { file, write } => rewrite(config, &file, write, Rewrite::Format).await,
  }
}

fn controller(config: &Config, limit: Option<usize>) -> Result<SyncController> {
  let walk = WalkOptions::new()
    .include_hidden(config.sync.include_hidden)
    .ignore(config.sync.ignore.as_slice())
    .context("invalid ignore pattern in [sync]")?;
  let options = SyncOptions {
    clone_limit: limit.unwrap_or(config.sync.clone_limit),
    walk,
    commit_message: config.github.commit_message.clone(),
  };
  let workspace = Workspace::new(Box::new(RopeEngine::new())).into_shared();
  Ok(SyncController::new(workspace, options))
}

fn github(config: &Config) -> Result<GitHubClient> {
  let token = config.github.token.clone();
  let client = match &config.github.api_url {
    Some(api_url) => GitHubClient::with_api_url(api_url, token),
    None => GitHubClient::new(token),
  };
  client.context("failed to create GitHub client")
}

/// Joins a `/` separated workspace path onto `root`.
fn local_path(root: &Path, path: &str) -> PathBuf {
  path
    .split('/')
    .filter(|segment| !segment.is_empty())
    .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

async fn open(config: &Config, dir: &Path) -> Result<()> {
  let sync = controller(config, None)?;
  let source = FsDirectory::new(dir);
  let report = sync
    .import_directory(&source)
    .await
    .with_context(|| format!("failed to open {}", dir.display()))?;

  let text = render::tree(&sync.workspace().lock());
  print!("{text}{}", render::report(&report));
  Ok(())
}

async fn clone(
  config: &Config,
  url: &str,
  branch: Option<String>,
  limit: Option<usize>,
  out: Option<&Path>,
) -> Result<()> {
  let branch = branch.unwrap_or_else(|| config.github.branch.clone());
  let repo = parse_repo_url(url, &branch)?;
  let remote = github(config)?;
  let sync = controller(config, limit)?;

  let report = sync
    .clone_repository(&remote, &repo)
    .await
    .with_context(|| format!("failed to clone {repo}"))?;

  let text = render::tree(&sync.workspace().lock());
  print!("{text}{}", render::report(&report));

  if let Some(out) = out {
    let mut written = 0;
    for &id in &report.files {
      let Some(path) = file_path(&sync, id) else {
        continue;
      };
      let destination: Arc<dyn StorageHandle> = Arc::new(FsHandle::new(local_path(out, &path)));
      match sync.save(id, Some(destination)).await {
        Ok(()) => written += 1,
        Err(err) => log::warn!("failed to write {path}: {err}"),
      }
    }
    println!("wrote {written} files to {}", out.display());
  }
  Ok(())
}

fn file_path(sync: &SyncController, id: FileId) -> Option<String> {
  sync
    .workspace()
    .lock()
    .file(id)
    .map(|file| file.path().to_string())
}

async fn fetch(config: &Config, url: &str) -> Result<()> {
  let (repo, path) = parse_blob_url(url)?;
  let remote = github(config)?;
  let sync = controller(config, None)?;

  let id = sync
    .load_remote_file(&remote, &repo, &path)
    .await
    .with_context(|| format!("failed to fetch {path} from {repo}"))?;
  let content = sync.workspace().lock().read_content(id)?;
  print!("{content}");
  Ok(())
}

async fn push(
  config: &Config,
  file: &Path,
  repo: &str,
  path: Option<&str>,
  branch: Option<String>,
) -> Result<()> {
  let branch = branch.unwrap_or_else(|| config.github.branch.clone());
  let repo = parse_repo_url(repo, &branch)?;
  let remote = github(config)?;
  let sync = controller(config, None)?;

  let id = sync
    .open_local(Arc::new(FsHandle::new(file)), None)
    .await
    .with_context(|| format!("failed to read {}", file.display()))?;
  let put = sync
    .push(&remote, &repo, id, path)
    .await
    .with_context(|| format!("failed to push {} to {repo}", file.display()))?;
  println!("pushed {} ({})", file.display(), put.sha);
  Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Rewrite {
  Minify,
  Format,
}

async fn rewrite(config: &Config, file: &Path, write: bool, rewrite: Rewrite) -> Result<()> {
  let sync = controller(config, None)?;
  let id = sync
    .open_local(Arc::new(FsHandle::new(file)), None)
    .await
    .with_context(|| format!("failed to read {}", file.display()))?;

  let changed = {
    let mut workspace = sync.workspace().lock();
    match rewrite {
      Rewrite::Minify => workspace.minify(id)?,
      Rewrite::Format => workspace.format(id)?,
    }
  };

  if !write {
    let content = sync.workspace().lock().read_content(id)?;
    print!("{content}");
  } else if changed {
    sync.save(id, None).await?;
    log::info!("rewrote {}", file.display());
  }
  Ok(())
}
