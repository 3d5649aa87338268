//! Application-root state.
//!
//! `CoreState` owns every process-wide handle: the key/value store, the
//! credential store, the dev mode flag, the auth resolver, the service
//! bootstrapper, the notification queue and the processing log. A UI layer
//! holds one `Arc<CoreState>` and reads screens from it; nothing is looked
//! up through globals.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use uuid::Uuid;

use crate::auth::{AuthSnapshot, AuthStatusResolver};
use crate::config::{self, AppConfig};
use crate::credentials::{CredentialError, CredentialStore};
use crate::dev_mode::DevModeFlag;
use crate::diagnostics::{DebugPanel, ProcessingLog};
use crate::identity::{IdentityProvider, TokenInfoProvider};
use crate::intake::{DocumentStorage, FieldExtractor, IntakeService, SpreadsheetLog};
use crate::presentation::{NotificationCenter, Screen};
use crate::route_guard::{self, Destination, ShellView};
use crate::scope::Scope;
use crate::services::{
    BootstrapPolicy, DiscoveryClient, Readiness, ServiceBootstrapper, ServiceError,
    ServiceHandles,
};
use crate::storage::{FileStore, KeyValueStore, StorageError};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    config: AppConfig,
    /// Identifies this application session in logs.
    session_id: Uuid,
    store: Arc<dyn KeyValueStore>,
    credentials: CredentialStore,
    dev_mode: DevModeFlag,
    auth: AuthStatusResolver,
    bootstrapper: ServiceBootstrapper,
    notifications: Arc<NotificationCenter>,
    processing_log: Arc<ProcessingLog>,
    /// Scope of the current mount. Replaced on every `mount()`.
    mount_scope: Mutex<Scope>,
}

/// Result of one mount: where the router sent the user and how the
/// bootstrap went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountReport {
    /// `None` when the mount was torn down before the auth check settled.
    pub auth: Option<AuthSnapshot>,
    pub readiness: Readiness,
    pub destination: Destination,
}

impl CoreState {
    /// Wire the state from explicit collaborators.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn IdentityProvider>,
        services: ServiceHandles,
    ) -> Self {
        let credentials = CredentialStore::new(store.clone());
        let dev_mode = DevModeFlag::hydrate(store.clone());
        let notifications = Arc::new(NotificationCenter::new());
        let policy = if config.coalesce_bootstrap {
            BootstrapPolicy::Coalesce
        } else {
            BootstrapPolicy::Independent
        };
        let bootstrapper =
            ServiceBootstrapper::new(services, policy, notifications.clone(), config.locale);
        let auth = AuthStatusResolver::new(credentials.clone(), identity);

        Self {
            config,
            session_id: Uuid::new_v4(),
            store,
            credentials,
            dev_mode,
            auth,
            bootstrapper,
            notifications,
            processing_log: Arc::new(ProcessingLog::new()),
            mount_scope: Mutex::new(Scope::new()),
        }
    }

    /// Production wiring: file-backed storage, Google token validation and
    /// discovery-initialized API clients.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let store = Arc::new(FileStore::open(config::storage_path())?);
        let identity = Arc::new(TokenInfoProvider::new(&config.tokeninfo_url));
        let services = ServiceHandles::new(
            Arc::new(DiscoveryClient::gmail()),
            Arc::new(DiscoveryClient::drive()),
            Arc::new(DiscoveryClient::sheets()),
        )?;
        Ok(Self::new(config, store, identity, services))
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn auth(&self) -> &AuthStatusResolver {
        &self.auth
    }

    pub fn bootstrapper(&self) -> &ServiceBootstrapper {
        &self.bootstrapper
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn processing_log(&self) -> &Arc<ProcessingLog> {
        &self.processing_log
    }

    // ── Mount lifecycle ─────────────────────────────────────

    /// Run the auth check and the service bootstrap concurrently.
    ///
    /// Neither can fail the mount: both settle into state. A previous
    /// mount's auth check is cancelled.
    pub async fn mount(&self) -> MountReport {
        let scope = Scope::new();
        if let Ok(mut current) = self.mount_scope.lock() {
            current.cancel();
            *current = scope.clone();
        }
        tracing::info!(session = %self.session_id, "Mounting application");

        let (auth, bootstrap) = tokio::join!(
            self.auth.resolve(&scope),
            self.bootstrapper.initialize_all()
        );
        if let Err(e) = &bootstrap {
            self.processing_log
                .append(format!("Service initialization failed: {e}"));
        }

        let report = MountReport {
            auth,
            readiness: self.bootstrapper.readiness(),
            destination: self.destination(),
        };
        tracing::info!(
            destination = ?report.destination,
            readiness = ?report.readiness,
            "Mount settled"
        );
        report
    }

    /// Tear down the current mount: a pending auth check is discarded.
    pub fn unmount(&self) {
        if let Ok(current) = self.mount_scope.lock() {
            current.cancel();
        }
    }

    // ── Routing ─────────────────────────────────────────────

    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode.is_dev_mode()
    }

    pub fn toggle_dev_mode(&self) -> bool {
        self.dev_mode.toggle()
    }

    pub fn destination(&self) -> Destination {
        route_guard::decide_for(self.auth.snapshot(), self.dev_mode.is_dev_mode())
    }

    /// Route guard first, then the shell gate for admitted users.
    pub fn current_screen(&self) -> Screen {
        let locale = self.config.locale;
        match self.destination() {
            Destination::ShowLoadingPlaceholder => Screen::checking_session(locale),
            Destination::RenderLoginScreen => Screen::Login,
            Destination::RedirectToDashboard => {
                match route_guard::shell_view(&self.bootstrapper.readiness()) {
                    ShellView::Initializing => Screen::loading_services(locale),
                    ShellView::Ready => Screen::Dashboard,
                    ShellView::Unavailable => Screen::bootstrap_failed(locale),
                }
            }
        }
    }

    // ── Session actions ─────────────────────────────────────

    pub fn sign_out(&self) -> Result<(), CredentialError> {
        self.processing_log.append("Signed out");
        self.auth.sign_out()
    }

    /// Debug panel, only while dev mode is on.
    pub fn debug_panel(&self) -> Option<DebugPanel<'_>> {
        DebugPanel::open(&self.config, &self.credentials, &self.dev_mode)
    }

    /// Intake pipeline bound to this session's readiness and log.
    pub fn intake(
        &self,
        extractor: Arc<dyn FieldExtractor>,
        storage: Arc<dyn DocumentStorage>,
        spreadsheet: Arc<dyn SpreadsheetLog>,
    ) -> IntakeService {
        IntakeService::new(
            extractor,
            storage,
            spreadsheet,
            self.bootstrapper.subscribe(),
            self.processing_log.clone(),
        )
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState construction.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Service wiring error: {0}")]
    Services(#[from] ServiceError),
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
