use std::path::Path;

use anyhow::Result;

use relaymail::storage::{ProgressTracker, ResultStore};

use super::{load_config, open_store};

/// Print the progress snapshot as JSON
pub fn progress(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let snapshot = ProgressTracker::new(open_store(&config)?).read();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Print the last campaign result as JSON
pub fn last_result(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    match ResultStore::new(open_store(&config)?).load()? {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("No campaign has finished yet"),
    }
    Ok(())
}
