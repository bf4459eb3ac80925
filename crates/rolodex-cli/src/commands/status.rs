use rolodex_core::SyncEngine;

use crate::commands::common::{format_status_lines, now_ms};
use crate::error::CliError;

pub async fn run_status(engine: &SyncEngine, as_json: bool) -> Result<(), CliError> {
    let status = engine.sync_status().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for line in format_status_lines(&status, now_ms()) {
        println!("{line}");
    }
    Ok(())
}
