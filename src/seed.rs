use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::db::DbPool;
use crate::listing_types::{Listing, ListingPayload};

/// One-shot import of listings from a JSON file into an empty store.
/// A store that already holds listings is left untouched, so restarts
/// never duplicate data. Invalid entries are skipped with a warning.
pub fn seed_if_empty(db_pool: &DbPool, seed_path: &Path) -> Result<usize> {
    let existing = Listing::count(db_pool).context("Failed to count listings")?;
    if existing > 0 {
        info!(
            "Store already holds {} listings, skipping seed import",
            existing
        );
        return Ok(0);
    }
    if !seed_path.exists() {
        info!("No seed file at {}, starting empty", seed_path.display());
        return Ok(0);
    }

    let raw = std::fs::read_to_string(seed_path)
        .with_context(|| format!("Failed to read seed file {}", seed_path.display()))?;
    let payloads: Vec<ListingPayload> =
        serde_json::from_str(&raw).context("Failed to parse seed file")?;

    let mut imported = 0;
    for payload in &payloads {
        if let Err(e) = payload.validate() {
            warn!("Skipping invalid seed listing \"{}\": {}", payload.title, e);
            continue;
        }
        Listing::create(db_pool, payload)
            .with_context(|| format!("Failed to insert seed listing \"{}\"", payload.title))?;
        imported += 1;
    }

    info!(
        "Imported {} seed listings from {}",
        imported,
        seed_path.display()
    );
    Ok(imported)
}
