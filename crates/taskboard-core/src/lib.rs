pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod preferences;
pub mod records;
pub mod render;
pub mod selection;
pub mod storage;
pub mod store;
pub mod task;
pub mod view;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskboard"
  );

  let cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  debug!(config = ?cfg.loaded_from, "configuration ready");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    storage::FileStorage::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open data \
         directory {}",
        data_dir.display()
      )
    })?;

  let mut store =
    store::TaskStore::open(
      storage,
      Utc::now()
    )
    .with_context(|| {
      format!(
        "failed to load tasks from {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg);
  let stdout = io::stdout();
  let mut out = stdout.lock();

  match cli.command.unwrap_or_default() {
    | cli::Command::Shell => {
      commands::run_shell(
        &mut store,
        &cfg,
        &renderer,
        io::stdin().lock(),
        &mut out
      )?;
    }
    | command => {
      commands::dispatch(
        &mut store,
        &cfg,
        &renderer,
        command,
        Utc::now(),
        &mut out
      )?;
    }
  }

  info!("done");
  Ok(())
}
