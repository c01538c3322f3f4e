//! Trolley CLI - shared shopping lists from the terminal
//!
//! Reads and writes go through the same sync controller and mutation gateway
//! a graphical client would use, so `--offline` shows exactly what a
//! disconnected device sees.

mod auth;
mod cli;
mod commands;
mod config_store;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::create::run_create;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::lists::run_lists;
use crate::commands::share::run_share;
use crate::commands::toggle::run_toggle;
use crate::commands::watch::run_watch;
use crate::commands::GlobalOptions;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trolley=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = || GlobalOptions::resolve(cli.data_dir.clone(), cli.profile.clone(), cli.offline);

    match cli.command {
        Commands::Lists { json } => run_lists(&options()?, json).await,
        Commands::Create {
            name,
            items,
            public,
        } => run_create(&options()?, &name, &items, public).await,
        Commands::Edit { list, name, items } => {
            run_edit(&options()?, &list, name.as_deref(), items.as_deref()).await
        }
        Commands::Delete { list } => run_delete(&options()?, &list).await,
        Commands::Share {
            list,
            target,
            notify,
        } => run_share(&options()?, &list, &target, notify).await,
        Commands::Toggle { list, item } => run_toggle(&options()?, &list, item).await,
        Commands::Watch { refresh_secs } => run_watch(&options()?, refresh_secs).await,
        Commands::Config { command } => run_config(command, &options()?),
        Commands::Auth { command } => run_auth(command, &options()?).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
