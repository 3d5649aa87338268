//! Session diagnostics: the processing log and the dev-mode debug panel.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::credentials::{CredentialError, CredentialStore};
use crate::dev_mode::DevModeFlag;

// ═══════════════════════════════════════════════════════════
// Processing log
// ═══════════════════════════════════════════════════════════

/// One processing log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Append-only, session-scoped log shown in the diagnostic view.
/// Unbounded; a new session starts empty.
#[derive(Default)]
pub struct ProcessingLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "Processing log");
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                timestamp: Utc::now(),
                message,
            });
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Rendered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(LogEntry::render).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════
// Debug panel
// ═══════════════════════════════════════════════════════════

/// What the debug panel displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugSnapshot {
    pub redirect_uri: String,
    pub origin: String,
    pub path: String,
    pub has_tokens: bool,
    pub has_user: bool,
}

/// Only obtainable while dev mode is on.
pub struct DebugPanel<'a> {
    config: &'a AppConfig,
    credentials: &'a CredentialStore,
}

impl<'a> DebugPanel<'a> {
    pub fn open(
        config: &'a AppConfig,
        credentials: &'a CredentialStore,
        dev_mode: &DevModeFlag,
    ) -> Option<Self> {
        dev_mode.is_dev_mode().then_some(Self {
            config,
            credentials,
        })
    }

    pub fn snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            redirect_uri: self.config.redirect_uri.clone(),
            origin: self.config.origin.clone(),
            path: self.config.path.clone(),
            has_tokens: self.credentials.has_tokens(),
            has_user: self.credentials.has_user(),
        }
    }

    /// Remove every persisted key unconditionally, the dev mode key
    /// included. The in-memory dev flag keeps its value until reload.
    pub fn clear_all_storage(&self) -> Result<(), CredentialError> {
        tracing::warn!("Debug panel: clearing all local storage");
        self.credentials.clear_all()
    }
}
