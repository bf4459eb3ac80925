use rolodex_core::{SyncEngine, SyncStatistics};

use crate::cli::SyncMode;
use crate::commands::common::format_statistics;
use crate::error::CliError;

pub async fn sync_with_mode(
    engine: &SyncEngine,
    mode: SyncMode,
) -> Result<SyncStatistics, CliError> {
    let stats = match mode {
        SyncMode::Auto => engine.auto_sync().await?,
        SyncMode::Full => engine.full_sync().await?,
        SyncMode::Incremental => engine.incremental_sync().await?,
    };
    Ok(stats)
}

pub async fn run_sync(engine: &SyncEngine, mode: SyncMode, as_json: bool) -> Result<(), CliError> {
    let stats = sync_with_mode(engine, mode).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", format_statistics(&stats));
    }
    Ok(())
}
