//! Persisted credential record: token bundle + user profile.
//!
//! Both halves are stored as JSON text under fixed keys. This module never
//! interprets the tokens beyond the expiry check used by the resolver.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{TOKENS_KEY, USER_KEY};
use crate::storage::{KeyValueStore, StorageError};

/// Token bundle as returned by the OAuth exchange (`access_token`,
/// `refresh_token`, `expiry_date`, ...). Opaque string map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TokenBundle(pub BTreeMap<String, String>);

/// OAuth libraries write `expiry_date` and `expires_in` as numbers, so
/// scalars are accepted and stringified. `null` entries are dropped.
impl<'de> Deserialize<'de> for TokenBundle {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let map = raw
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect();
        Ok(Self(map))
    }
}

impl TokenBundle {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get("access_token").filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.get("refresh_token").filter(|t| !t.is_empty())
    }

    /// Expiry as epoch milliseconds, if present and numeric.
    pub fn expiry_millis(&self) -> Option<i64> {
        self.get("expiry_date").and_then(|v| v.trim().parse().ok())
    }

    /// True when the bundle carries an expiry in the past and cannot be
    /// refreshed.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        match self.expiry_millis() {
            Some(expiry) => expiry <= now_millis && self.refresh_token().is_none(),
            None => false,
        }
    }
}

/// Signed-in user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Tokens plus profile, as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub tokens: TokenBundle,
    pub user: Option<UserProfile>,
}

/// Errors from credential persistence.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Malformed credential data under '{key}': {source}")]
    Malformed {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("Serialization failed: {0}")]
    Serialize(serde_json::Error),
}

// ═══════════════════════════════════════════════════════════
// CredentialStore
// ═══════════════════════════════════════════════════════════

/// Reads and writes the credential record in the shared key/value store.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist a fresh sign-in or a token refresh (overwrites).
    pub fn save(&self, tokens: &TokenBundle, user: &UserProfile) -> Result<(), CredentialError> {
        let tokens_json = serde_json::to_string(tokens).map_err(CredentialError::Serialize)?;
        let user_json = serde_json::to_string(user).map_err(CredentialError::Serialize)?;
        self.store.set(TOKENS_KEY, &tokens_json)?;
        self.store.set(USER_KEY, &user_json)?;
        tracing::info!(email = %user.email, "Credentials saved");
        Ok(())
    }

    /// Overwrite the token bundle only (refresh path).
    pub fn save_tokens(&self, tokens: &TokenBundle) -> Result<(), CredentialError> {
        let json = serde_json::to_string(tokens).map_err(CredentialError::Serialize)?;
        self.store.set(TOKENS_KEY, &json)?;
        Ok(())
    }

    pub fn load_tokens(&self) -> Result<Option<TokenBundle>, CredentialError> {
        self.load_json(TOKENS_KEY)
    }

    pub fn load_user(&self) -> Result<Option<UserProfile>, CredentialError> {
        self.load_json(USER_KEY)
    }

    /// Full record, or `None` when no token bundle is stored.
    /// A malformed profile is dropped rather than failing the whole record.
    pub fn load(&self) -> Result<Option<CredentialRecord>, CredentialError> {
        let Some(tokens) = self.load_tokens()? else {
            return Ok(None);
        };
        let user = self.load_user().unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable user profile: {e}");
            None
        });
        Ok(Some(CredentialRecord { tokens, user }))
    }

    /// Raw presence of the token key (diagnostics proxy for "has tokens").
    pub fn has_tokens(&self) -> bool {
        self.store.contains(TOKENS_KEY)
    }

    pub fn has_user(&self) -> bool {
        self.store.contains(USER_KEY)
    }

    /// Sign-out: remove both credential keys, leave everything else.
    pub fn clear_credentials(&self) -> Result<(), CredentialError> {
        self.store.remove(TOKENS_KEY)?;
        self.store.remove(USER_KEY)?;
        tracing::info!("Credentials cleared");
        Ok(())
    }

    /// Remove every persisted key, credential or not.
    pub fn clear_all(&self) -> Result<(), CredentialError> {
        self.store.clear()?;
        tracing::info!("Local storage cleared");
        Ok(())
    }

    fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, CredentialError> {
        match self.store.get(key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| CredentialError::Malformed { key, source }),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_tokens() -> TokenBundle {
    let mut map = BTreeMap::new();
    map.insert("access_token".to_string(), "ya29.test".to_string());
    map.insert("refresh_token".to_string(), "1//refresh".to_string());
    map.insert("expiry_date".to_string(), "4102444800000".to_string());
    TokenBundle(map)
}

#[cfg(test)]
pub(crate) fn sample_user() -> UserProfile {
    UserProfile {
        name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        picture: Some("https://example.com/ada.png".into()),
    }
}
