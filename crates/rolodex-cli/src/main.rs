//! Rolodex CLI - sync and browse your address book from the command line

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands, SyncMode};
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::list::run_list;
use crate::commands::search::run_search;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
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
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rolodex_cli=warn,rolodex_core=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let context = Context::load(cli.db_path)?;
    match cli.command {
        Commands::Sync {
            full,
            incremental,
            json,
        } => {
            let engine = context.engine().await?;
            run_sync(&engine, SyncMode::from_flags(full, incremental), json).await?;
        }
        Commands::Status { json } => {
            let engine = context.engine().await?;
            run_status(&engine, json).await?;
        }
        Commands::List {
            limit,
            offset,
            json,
        } => run_list(&context.open_store().await?, limit, offset, json).await?,
        Commands::Search { query, limit, json } => {
            run_search(&context.open_store().await?, &query, limit, json).await?;
        }
        Commands::Show { external_id, json } => {
            run_show(&context.open_store().await?, &external_id, json).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
