use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::presentation::Locale;

/// Application-level constants
pub const APP_NAME: &str = "DocIntake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Persisted key holding the serialized token bundle.
pub const TOKENS_KEY: &str = "google_tokens";
/// Persisted key holding the serialized user profile.
pub const USER_KEY: &str = "google_user";
/// Persisted key holding the developer override flag (`"true"` / `"false"`).
pub const DEV_MODE_KEY: &str = "devMode";

/// Google token validation endpoint.
pub const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_PATH: &str = "/";

const STORAGE_FILE: &str = "local_storage.json";

/// Whether this is a development build.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "docintake_lib=debug,docintake=debug,info"
    } else {
        "docintake_lib=info,docintake=info,warn"
    }
}

/// Get the application data directory.
/// `DOCINTAKE_DATA_DIR` wins; otherwise the platform data dir, then the
/// home dir, then the working directory.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = env_non_empty("DOCINTAKE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the path of the persisted key/value file.
pub fn storage_path() -> PathBuf {
    app_data_dir().join(STORAGE_FILE)
}

// ═══════════════════════════════════════════════════════════
// Runtime configuration
// ═══════════════════════════════════════════════════════════

/// Runtime settings threaded through `CoreState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the OAuth redirect lands on (shown in the debug panel).
    pub origin: String,
    /// Current path inside the app (shown in the debug panel).
    pub path: String,
    /// OAuth redirect URI. Defaults to the origin.
    pub redirect_uri: String,
    /// Token validation endpoint for the identity check.
    pub tokeninfo_url: String,
    /// Language for status and error messages.
    pub locale: Locale,
    /// Coalesce concurrent bootstrap calls per service client.
    pub coalesce_bootstrap: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            path: DEFAULT_PATH.to_string(),
            redirect_uri: DEFAULT_ORIGIN.to_string(),
            tokeninfo_url: DEFAULT_TOKENINFO_URL.to_string(),
            locale: Locale::En,
            coalesce_bootstrap: false,
        }
    }
}

impl AppConfig {
    /// Build from `DOCINTAKE_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(origin) = env_non_empty("DOCINTAKE_ORIGIN") {
            config.redirect_uri = origin.clone();
            config.origin = origin;
        }
        if let Some(uri) = env_non_empty("DOCINTAKE_REDIRECT_URI") {
            config.redirect_uri = uri;
        }
        if let Some(url) = env_non_empty("DOCINTAKE_TOKENINFO_URL") {
            config.tokeninfo_url = url;
        }
        if let Some(locale) = env_non_empty("DOCINTAKE_LOCALE") {
            config.locale = Locale::from_tag(&locale);
        }
        if let Some(flag) = env_non_empty("DOCINTAKE_COALESCE_BOOTSTRAP") {
            config.coalesce_bootstrap = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        config
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
