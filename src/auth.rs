//! Authentication status resolver.
//!
//! Derives the session verdict from the stored credential record and the
//! identity collaborator. Every failure path resolves to unauthenticated
//! (fail-closed); nothing here returns an error to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::credentials::{CredentialError, CredentialStore, TokenBundle, UserProfile};
use crate::identity::IdentityProvider;
use crate::scope::Scope;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Tri-state authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// What consumers read: `{ is_authenticated, is_loading }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl AuthSnapshot {
    pub const LOADING: Self = Self {
        is_authenticated: false,
        is_loading: true,
    };

    pub fn resolved(is_authenticated: bool) -> Self {
        Self {
            is_authenticated,
            is_loading: false,
        }
    }

    pub fn status(&self) -> AuthStatus {
        if self.is_loading {
            AuthStatus::Unknown
        } else if self.is_authenticated {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unauthenticated
        }
    }
}

// ═══════════════════════════════════════════════════════════
// AuthStatusResolver
// ═══════════════════════════════════════════════════════════

pub struct AuthStatusResolver {
    credentials: CredentialStore,
    identity: Arc<dyn IdentityProvider>,
    state: watch::Sender<AuthSnapshot>,
    /// Bumped by every `resolve`; only the latest check may roll back.
    generation: AtomicU64,
}

impl AuthStatusResolver {
    /// Starts in the loading state; call `resolve` to settle it.
    pub fn new(credentials: CredentialStore, identity: Arc<dyn IdentityProvider>) -> Self {
        let (state, _rx) = watch::channel(AuthSnapshot::LOADING);
        Self {
            credentials,
            identity,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        *self.state.borrow()
    }

    pub fn status(&self) -> AuthStatus {
        self.snapshot().status()
    }

    /// Observe snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Run one session check. No retry: call again to re-check.
    ///
    /// Returns the settled snapshot, or `None` when `scope` was cancelled
    /// first. A cancelled check never settles the state slot: it puts back
    /// what was there before, unless a newer check has started since.
    pub async fn resolve(&self, scope: &Scope) -> Option<AuthSnapshot> {
        if scope.is_cancelled() {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.state.send_replace(AuthSnapshot::LOADING);

        let is_authenticated = tokio::select! {
            biased;
            () = scope.cancelled() => {
                tracing::debug!("Auth check cancelled, result discarded");
                self.roll_back(generation, previous);
                return None;
            }
            verdict = self.check() => verdict,
        };

        let snapshot = AuthSnapshot::resolved(is_authenticated);
        self.state.send_replace(snapshot);
        tracing::info!(status = ?snapshot.status(), "Auth status resolved");
        Some(snapshot)
    }

    fn roll_back(&self, generation: u64, previous: AuthSnapshot) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.state.send_if_modified(|current| {
            if current.is_loading {
                *current = previous;
                true
            } else {
                false
            }
        });
    }

    async fn check(&self) -> bool {
        let record = match self.credentials.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("No stored credentials");
                return false;
            }
            Err(e) => {
                tracing::warn!("Stored credentials unreadable, treating as signed out: {e}");
                return false;
            }
        };

        if record.tokens.access_token().is_none() {
            return false;
        }
        if record
            .tokens
            .is_expired_at(chrono::Utc::now().timestamp_millis())
        {
            tracing::debug!("Stored token expired and not refreshable");
            return false;
        }

        match self.identity.validate(&record).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "Identity check failed, treating as signed out");
                false
            }
        }
    }

    /// Persist credentials from a completed OAuth exchange and mark the
    /// session authenticated.
    pub fn complete_sign_in(
        &self,
        tokens: &TokenBundle,
        user: &UserProfile,
    ) -> Result<(), CredentialError> {
        self.credentials.save(tokens, user)?;
        self.state.send_replace(AuthSnapshot::resolved(true));
        Ok(())
    }

    /// Explicit sign-out: the one place this resolver mutates the record.
    /// The state becomes unauthenticated even if removal fails.
    pub fn sign_out(&self) -> Result<(), CredentialError> {
        let result = self.credentials.clear_credentials();
        self.state.send_replace(AuthSnapshot::resolved(false));
        result
    }
}
