//! `awards`: merge, enrich and export book award catalogs.
mod catalog;
mod checkpoint;
mod cli;
mod config;
mod enrich;
mod error;
mod export;
mod http;
mod merge;
mod paths;
mod record;
mod remote;
mod retry;
mod store;
mod util;
mod workflow;

use anyhow::Result;
use clap::Parser;
use cli::{Command, RootArgs};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let env_file = dotenvy::dotenv();
    let args = RootArgs::parse();
    init_tracing(args.command.quiet());
    if let Some(err) = env_file_problem(env_file) {
        tracing::warn!(error = %err, "ignoring unreadable .env file");
    }

    match args.command {
        Command::Merge(args) => workflow::run_merge(&args),
        Command::Enrich(args) => workflow::run_enrich(&args),
        Command::Fetch(args) => workflow::run_fetch(&args),
        Command::Push(args) => workflow::run_push(&args),
        Command::Export(args) => workflow::run_export(&args),
        Command::Query(args) => workflow::run_query(&args),
    }
}

/// Structured logs go to stderr; `RUST_LOG` overrides the default filter.
fn init_tracing(quiet: bool) {
    let default = if quiet { "awards=warn" } else { "awards=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// A missing `.env` is normal; secrets may already be exported.
fn env_file_problem(loaded: dotenvy::Result<PathBuf>) -> Option<dotenvy::Error> {
    match loaded {
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => Some(err),
        Ok(_) => None,
    }
}
