//! Transient screen states and user-facing notifications.
//!
//! No markup lives here: a UI layer renders `Screen` and drains
//! `NotificationCenter`. Strings come from a small per-locale catalog.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════
// Locale + message catalog
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    /// Parse a BCP-47-ish tag (`fr`, `fr-FR`, `en_US`). Unknown tags fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "fr" => Self::Fr,
            _ => Self::En,
        }
    }
}

/// User-visible strings for one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Messages {
    pub loading_services: &'static str,
    pub checking_session: &'static str,
    pub bootstrap_failed_title: &'static str,
    pub bootstrap_failed_description: &'static str,
}

const EN: Messages = Messages {
    loading_services: "Initializing services...",
    checking_session: "Checking your session...",
    bootstrap_failed_title: "Initialization error",
    bootstrap_failed_description:
        "Some services could not be started. Check your connection and reload the app.",
};

const FR: Messages = Messages {
    loading_services: "Initialisation des services...",
    checking_session: "Vérification de votre session...",
    bootstrap_failed_title: "Erreur d'initialisation",
    bootstrap_failed_description:
        "Certains services n'ont pas pu démarrer. Vérifiez votre connexion et rechargez l'application.",
};

pub fn messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Fr => &FR,
    }
}

// ═══════════════════════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A toast-style message: title + description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    /// The single generic bootstrap failure message. Never names a service.
    pub fn bootstrap_failed(locale: Locale) -> Self {
        let m = messages(locale);
        Self {
            level: NotificationLevel::Error,
            title: m.bootstrap_failed_title.to_string(),
            description: m.bootstrap_failed_description.to_string(),
        }
    }
}

/// Receives user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// In-memory queue the UI layer drains.
#[derive(Default)]
pub struct NotificationCenter {
    queue: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<Notification> {
        self.queue.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.queue
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        let title = &notification.title;
        match notification.level {
            NotificationLevel::Error => tracing::warn!(%title, "User notification"),
            NotificationLevel::Info => tracing::info!(%title, "User notification"),
        }
        if let Ok(mut q) = self.queue.lock() {
            q.push(notification);
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Screens
// ═══════════════════════════════════════════════════════════

/// What the UI should show right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// Full-screen spinner with a status line.
    Loading { message: String },
    Login,
    Dashboard,
    /// Full-screen error: title + description.
    Error { title: String, description: String },
}

impl Screen {
    pub fn checking_session(locale: Locale) -> Self {
        Self::Loading {
            message: messages(locale).checking_session.to_string(),
        }
    }

    pub fn loading_services(locale: Locale) -> Self {
        Self::Loading {
            message: messages(locale).loading_services.to_string(),
        }
    }

    pub fn bootstrap_failed(locale: Locale) -> Self {
        let m = messages(locale);
        Self::Error {
            title: m.bootstrap_failed_title.to_string(),
            description: m.bootstrap_failed_description.to_string(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_from_tag() {
        assert_eq!(Locale::from_tag("fr"), Locale::Fr);
        assert_eq!(Locale::from_tag("fr-CA"), Locale::Fr);
        assert_eq!(Locale::from_tag("FR_fr"), Locale::Fr);
        assert_eq!(Locale::from_tag("en-US"), Locale::En);
        assert_eq!(Locale::from_tag("de"), Locale::En);
        assert_eq!(Locale::from_tag(""), Locale::En);
    }

    #[test]
    fn every_locale_has_non_empty_strings() {
        for locale in [Locale::En, Locale::Fr] {
            let m = messages(locale);
            assert!(!m.loading_services.is_empty());
            assert!(!m.checking_session.is_empty());
            assert!(!m.bootstrap_failed_title.is_empty());
            assert!(!m.bootstrap_failed_description.is_empty());
        }
    }

    #[test]
    fn bootstrap_notification_is_generic() {
        let n = Notification::bootstrap_failed(Locale::En);
        assert_eq!(n.level, NotificationLevel::Error);
        for name in ["mail", "storage", "spreadsheet", "gmail", "drive", "sheets"] {
            assert!(!n.description.to_lowercase().contains(name));
            assert!(!n.title.to_lowercase().contains(name));
        }
    }

    #[test]
    fn notification_center_queues_and_drains() {
        let center = NotificationCenter::new();
        assert!(center.is_empty());
        center.notify(Notification::bootstrap_failed(Locale::Fr));
        assert_eq!(center.len(), 1);
        assert_eq!(center.pending().len(), 1);

        let drained = center.drain();
        assert_eq!(drained[0].title, "Erreur d'initialisation");
        assert!(center.is_empty());
    }

    #[test]
    fn screen_serializes_with_tag() {
        let json = serde_json::to_value(Screen::Login).unwrap();
        assert_eq!(json["screen"], "login");

        let json = serde_json::to_value(Screen::loading_services(Locale::En)).unwrap();
        assert_eq!(json["screen"], "loading");
        assert_eq!(json["message"], "Initializing services...");
    }
}
