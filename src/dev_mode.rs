//! Developer override flag.
//!
//! When set, routing treats the user as signed in regardless of the
//! credential record. The flag never touches the credential keys.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::DEV_MODE_KEY;
use crate::storage::KeyValueStore;

pub struct DevModeFlag {
    enabled: AtomicBool,
    store: Arc<dyn KeyValueStore>,
}

impl DevModeFlag {
    /// Hydrate once from storage. Absent, unreadable or anything other than
    /// `"true"` means off.
    pub fn hydrate(store: Arc<dyn KeyValueStore>) -> Self {
        let enabled = match store.get(DEV_MODE_KEY) {
            Ok(Some(raw)) => raw.trim() == "true",
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Could not read dev mode flag, defaulting to off: {e}");
                false
            }
        };
        if enabled {
            tracing::info!("Dev mode enabled from storage");
        }
        Self {
            enabled: AtomicBool::new(enabled),
            store,
        }
    }

    pub fn is_dev_mode(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the flag and persist it. Returns the new value.
    ///
    /// The write is best-effort: a storage failure is logged and the
    /// in-memory value stays authoritative for this session.
    pub fn toggle(&self) -> bool {
        let next = !self.enabled.fetch_xor(true, Ordering::SeqCst);
        if let Err(e) = self.store.set(DEV_MODE_KEY, if next { "true" } else { "false" }) {
            tracing::warn!("Failed to persist dev mode flag: {e}");
        }
        tracing::info!(dev_mode = next, "Dev mode toggled");
        next
    }
}
