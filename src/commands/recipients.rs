use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use relaymail::input::parse_recipient_blob;
use relaymail::storage::RecipientStore;

use super::{load_config, open_store};

fn recipient_store(config_path: &Path) -> Result<RecipientStore> {
    let config = load_config(config_path)?;
    Ok(RecipientStore::new(open_store(&config)?))
}

/// Merge the addresses found in `file` into the store
pub fn add_recipients(config_path: &Path, file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read recipients {}", file.display()))?;
    let parsed = parse_recipient_blob(&text);
    if parsed.is_empty() {
        println!("No addresses found in {}", file.display());
        return Ok(());
    }

    let outcome = recipient_store(config_path)?.merge(parsed.as_slice())?;
    println!(
        "Merged {} addresses: {} new, {} stored",
        parsed.len(),
        outcome.appended,
        outcome.total
    );
    Ok(())
}

/// Print the stored count and the first `limit` addresses
pub fn list_recipients(config_path: &Path, limit: usize) -> Result<()> {
    let all = recipient_store(config_path)?.load_all()?;
    println!("Stored recipients: {}", all.len());
    for address in all.iter().take(limit) {
        println!("  {address}");
    }
    if all.len() > limit {
        println!("  ... {} more", all.len() - limit);
    }
    Ok(())
}

pub fn clear_recipients(config_path: &Path) -> Result<()> {
    recipient_store(config_path)?.clear()?;
    println!("Recipient store cleared");
    Ok(())
}

/// Write the raw stored list to stdout
pub fn export_recipients(config_path: &Path) -> Result<()> {
    print!("{}", recipient_store(config_path)?.export()?);
    Ok(())
}
