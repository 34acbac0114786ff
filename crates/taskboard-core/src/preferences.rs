use anyhow::Context;
use tracing::{debug, warn};

use crate::storage::{DARK_MODE_KEY, Storage};

/// Reads the dark-mode flag. A missing or unreadable entry means light mode.
#[tracing::instrument(skip(storage))]
pub fn load_dark_mode<S: Storage>(storage: &S) -> bool {
    let raw = match storage.get(DARK_MODE_KEY) {
        | Ok(Some(raw)) => raw,
        | Ok(None) => return false,
        | Err(err) => {
            warn!(error = %format!("{err:#}"), "failed to read display preference");
            return false;
        }
    };

    match serde_json::from_str::<bool>(raw.trim()) {
        | Ok(flag) => {
            debug!(dark_mode = flag, "loaded display preference");
            flag
        }
        | Err(err) => {
            warn!(error = %err, raw = %raw, "ignoring malformed display preference");
            false
        }
    }
}

#[tracing::instrument(skip(storage))]
pub fn save_dark_mode<S: Storage>(storage: &mut S, dark_mode: bool) -> anyhow::Result<()> {
    let payload = serde_json::to_string(&dark_mode)?;
    storage
        .set(DARK_MODE_KEY, &payload)
        .context("failed to save display preference")
}
