//! Command-line host for the workspace core.
//!
//! Each subcommand builds a fresh workspace backed by the rope engine, runs
//! one sync operation and prints the result.

mod commands;
mod render;

use std::{
  path::PathBuf,
  str::FromStr,
};

use anyhow::{
  Context,
  Result,
  anyhow,
};
use clap::{
  Parser,
  Subcommand,
};
use log::LevelFilter;
use the_shell_loader::config::Config;

#[derive(Debug, Parser)]
#[command(name = "the-shell")]
#[command(about = "Open, clone and sync files of a code editor workspace")]
struct Cli {
  /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Log file, defaults to the cache directory
  #[arg(long, value_name = "FILE", global = true)]
  log: Option<PathBuf>,

  /// Config file, defaults to the config directory
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Import a local directory and print its tree
  Open { dir: PathBuf },
  /// Clone a GitHub repository into the workspace
  Clone {
    url:    String,
    #[arg(long)]
    branch: Option<String>,
    /// Maximum number of files to fetch
    #[arg(long)]
    limit:  Option<usize>,
    /// Write every cloned file below this directory
    #[arg(long, value_name = "DIR")]
    out:    Option<PathBuf>,
  },
  /// Fetch a single file from a GitHub blob URL
  Fetch { url: String },
  /// Push a local file to a GitHub repository
  Push {
    file:   PathBuf,
    /// Repository URL
    #[arg(long)]
    repo:   String,
    /// Path inside the repository, defaults to the file name
    #[arg(long)]
    path:   Option<String>,
    #[arg(long)]
    branch: Option<String>,
  },
  /// Minify a file by language
  Minify {
    file:  PathBuf,
    /// Overwrite the file instead of printing
    #[arg(long)]
    write: bool,
  },
  /// Pretty-print a JSON file
  Format {
    file:  PathBuf,
    #[arg(long)]
    write: bool,
  },
}

fn level_from(verbosity: u8, configured: Option<&str>) -> Result<LevelFilter> {
  Ok(match verbosity {
    0 => {
      match configured {
        Some(level) => {
          LevelFilter::from_str(level).map_err(|_| anyhow!("invalid log level `{level}`"))?
        },
        None => LevelFilter::Warn,
      }
    },
    1 => LevelFilter::Info,
    2 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  })
}

fn setup_logging(level: LevelFilter) -> Result<()> {
  let log_file = the_shell_loader::log_file();
  fern::Dispatch::new()
    .level(level)
    .chain(
      fern::Dispatch::new()
        .format(|out, message, record| {
          out.finish(format_args!(
            "{} [{}] {}",
            record.target(),
            record.level(),
            message
          ))
        })
        .chain(
          fern::log_file(&log_file)
            .with_context(|| format!("failed to open log file {}", log_file.display()))?,
        ),
    )
    .chain(
      fern::Dispatch::new()
        .format(|out, message, record| {
          out.finish(format_args!("{}: {}", record.level().as_str().to_lowercase(), message))
        })
        .chain(std::io::stderr()),
    )
    .apply()
    .context("failed to install logger")
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  the_shell_loader::initialize_config_file(cli.config.clone());
  the_shell_loader::initialize_log_file(cli.log.clone());

  let config = Config::load_user().context("failed to load config")?;
  setup_logging(level_from(cli.verbose, config.log.level.as_deref())?)?;
  log::debug!("config file {}", the_shell_loader::config_file().display());

  commands::run(cli.command, &config).await
}
