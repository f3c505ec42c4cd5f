//! `chainscan status`: summarize a state file without touching the chain.

use anyhow::{Context, Result};
use std::path::Path;

use chainscan_storage::JsonFileStore;

pub async fn run(state_file: &Path, json: bool) -> Result<()> {
    let state = JsonFileStore::load(state_file)
        .await
        .with_context(|| format!("reading {}", state_file.display()))?
        .unwrap_or_default();

    let by_kind = state.count_by_kind();

    if json {
        let kinds: serde_json::Map<String, serde_json::Value> = by_kind
            .iter()
            .map(|(kind, n)| (kind.to_string(), (*n).into()))
            .collect();
        let summary = serde_json::json!({
            "state_file": state_file.display().to_string(),
            "last_scanned_block": state.last_scanned_block,
            "blocks": state.block_count(),
            "events": state.event_count(),
            "by_kind": kinds,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("State file: {}", state_file.display());
    println!("  Last scanned block: {}", state.last_scanned_block);
    println!("  Blocks with events: {}", state.block_count());
    println!("  Events: {}", state.event_count());
    for (kind, n) in &by_kind {
        println!("    {kind:<13} {n}");
    }
    Ok(())
}
