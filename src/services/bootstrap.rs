//! Service bootstrap: initialize mail, storage and spreadsheet clients
//! concurrently, all-or-nothing.
//!
//! The join is fail-fast: the first client error ends `initialize_all`
//! without waiting for the others. Whatever the outcome, readiness leaves
//! `Pending`, so a UI never spins forever on a failed bootstrap.
//!
//! By default every call re-runs all three `initialize()` calls, even when
//! calls overlap. `BootstrapPolicy::Coalesce` instead keeps at most one
//! initialization in flight per client and memoizes success.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, OnceCell};

use super::{ServiceClient, ServiceError, ServiceHandles, ServiceKind};
use crate::presentation::{Locale, Notification, Notifier};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Aggregate readiness of the three clients for this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

impl Readiness {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// How overlapping `initialize_all` calls share work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BootstrapPolicy {
    /// Every call runs every `initialize()`.
    #[default]
    Independent,
    /// One in-flight `initialize()` per client; success is remembered,
    /// failure allows the next call to retry.
    Coalesce,
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("{service} client failed to initialize: {source}")]
    ServiceFailed {
        service: ServiceKind,
        #[source]
        source: ServiceError,
    },
}

impl BootstrapError {
    pub fn service(&self) -> ServiceKind {
        match self {
            Self::ServiceFailed { service, .. } => *service,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ServiceBootstrapper
// ═══════════════════════════════════════════════════════════

pub struct ServiceBootstrapper {
    services: ServiceHandles,
    policy: BootstrapPolicy,
    /// Per-client completion handles, used only under `Coalesce`.
    mail_init: OnceCell<()>,
    storage_init: OnceCell<()>,
    spreadsheet_init: OnceCell<()>,
    readiness: watch::Sender<Readiness>,
    notifier: Arc<dyn Notifier>,
    locale: Locale,
}

impl ServiceBootstrapper {
    pub fn new(
        services: ServiceHandles,
        policy: BootstrapPolicy,
        notifier: Arc<dyn Notifier>,
        locale: Locale,
    ) -> Self {
        let (readiness, _rx) = watch::channel(Readiness::Pending);
        Self {
            services,
            policy,
            mail_init: OnceCell::new(),
            storage_init: OnceCell::new(),
            spreadsheet_init: OnceCell::new(),
            readiness,
            notifier,
            locale,
        }
    }

    pub fn services(&self) -> &ServiceHandles {
        &self.services
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Initialize all three clients concurrently.
    ///
    /// On failure a single generic notification is raised; the failing
    /// client is only named in the log and the returned error.
    pub async fn initialize_all(&self) -> Result<(), BootstrapError> {
        self.readiness.send_replace(Readiness::Pending);
        tracing::info!(policy = ?self.policy, "Initializing services");

        let joined = tokio::try_join!(
            self.initialize_one(ServiceKind::Mail),
            self.initialize_one(ServiceKind::Storage),
            self.initialize_one(ServiceKind::Spreadsheet),
        );

        match joined {
            Ok(_) => {
                self.readiness.send_replace(Readiness::Ready);
                tracing::info!("All services initialized");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    service = %e.service(),
                    error = %e,
                    "Service initialization failed"
                );
                self.notifier.notify(Notification::bootstrap_failed(self.locale));
                self.readiness.send_replace(Readiness::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn initialize_one(&self, kind: ServiceKind) -> Result<(), BootstrapError> {
        let client = self.services.get(kind);
        let result = match self.policy {
            BootstrapPolicy::Independent => client.initialize().await,
            BootstrapPolicy::Coalesce => self
                .init_cell(kind)
                .get_or_try_init(|| run_initialize(client))
                .await
                .map(|_| ()),
        };
        result.map_err(|source| BootstrapError::ServiceFailed {
            service: kind,
            source,
        })?;
        tracing::debug!(service = %kind, "Service initialized");
        Ok(())
    }

    fn init_cell(&self, kind: ServiceKind) -> &OnceCell<()> {
        match kind {
            ServiceKind::Mail => &self.mail_init,
            ServiceKind::Storage => &self.storage_init,
            ServiceKind::Spreadsheet => &self.spreadsheet_init,
        }
    }
}

async fn run_initialize(client: &Arc<dyn ServiceClient>) -> Result<(), ServiceError> {
    client.initialize().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::NotificationCenter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    enum Behavior {
        Succeed,
        Fail,
        Hang,
    }

    struct MockClient {
        kind: ServiceKind,
        behavior: Behavior,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockClient {
        fn new(kind: ServiceKind, behavior: Behavior, delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behavior,
                delay: Duration::from_millis(delay_ms),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ServiceClient for MockClient {
        fn kind(&self) -> ServiceKind {
            self.kind
        }

        async fn initialize(&self) -> Result<(), ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(ServiceError::Failed(format!("{} down", self.kind))),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    struct Fixture {
        clients: [Arc<MockClient>; 3],
        notifications: Arc<NotificationCenter>,
        bootstrapper: Arc<ServiceBootstrapper>,
    }

    fn fixture(behaviors: [(Behavior, u64); 3], policy: BootstrapPolicy) -> Fixture {
        let [(b0, d0), (b1, d1), (b2, d2)] = behaviors;
        let clients = [
            MockClient::new(ServiceKind::Mail, b0, d0),
            MockClient::new(ServiceKind::Storage, b1, d1),
            MockClient::new(ServiceKind::Spreadsheet, b2, d2),
        ];
        let handles = ServiceHandles::new(
            clients[0].clone(),
            clients[1].clone(),
            clients[2].clone(),
        )
        .unwrap();
        let notifications = Arc::new(NotificationCenter::new());
        let bootstrapper = Arc::new(ServiceBootstrapper::new(
            handles,
            policy,
            notifications.clone(),
            Locale::En,
        ));
        Fixture {
            clients,
            notifications,
            bootstrapper,
        }
    }

    fn all_succeed(delay_ms: u64) -> [(Behavior, u64); 3] {
        [
            (Behavior::Succeed, delay_ms),
            (Behavior::Succeed, delay_ms),
            (Behavior::Succeed, delay_ms),
        ]
    }

    #[test]
    fn starts_pending() {
        let f = fixture(all_succeed(0), BootstrapPolicy::Independent);
        assert!(f.bootstrapper.readiness().is_pending());
    }

    #[tokio::test]
    async fn all_succeed_becomes_ready() {
        let f = fixture(
            [
                (Behavior::Succeed, 5),
                (Behavior::Succeed, 40),
                (Behavior::Succeed, 10),
            ],
            BootstrapPolicy::Independent,
        );
        f.bootstrapper.initialize_all().await.unwrap();
        assert_eq!(f.bootstrapper.readiness(), Readiness::Ready);
        assert!(f.notifications.is_empty());
        for client in &f.clients {
            assert_eq!(client.calls(), 1);
        }
    }

    #[tokio::test]
    async fn initializations_run_concurrently() {
        let f = fixture(all_succeed(150), BootstrapPolicy::Independent);
        let started = Instant::now();
        f.bootstrapper.initialize_all().await.unwrap();
        // Sequential would take at least 450ms.
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn any_single_failure_fails_the_aggregate() {
        for failing in 0..3 {
            let mut behaviors = all_succeed(5);
            behaviors[failing] = (Behavior::Fail, 5);
            let f = fixture(behaviors, BootstrapPolicy::Independent);

            let err = f.bootstrapper.initialize_all().await.unwrap_err();
            assert_eq!(err.service(), ServiceKind::ALL[failing]);
            assert!(matches!(f.bootstrapper.readiness(), Readiness::Failed(_)));
            assert_eq!(f.notifications.len(), 1, "one notification for position {failing}");
        }
    }

    #[tokio::test]
    async fn failure_short_circuits_hanging_siblings() {
        let f = fixture(
            [
                (Behavior::Hang, 0),
                (Behavior::Fail, 10),
                (Behavior::Hang, 0),
            ],
            BootstrapPolicy::Independent,
        );
        let outcome = tokio::time::timeout(Duration::from_secs(1), f.bootstrapper.initialize_all())
            .await
            .expect("fail-fast join must not wait for hanging clients");
        assert!(outcome.is_err());
        assert!(!f.bootstrapper.readiness().is_pending());
    }

    #[tokio::test]
    async fn notification_does_not_name_the_failing_service() {
        let f = fixture(
            [
                (Behavior::Succeed, 0),
                (Behavior::Succeed, 0),
                (Behavior::Fail, 0),
            ],
            BootstrapPolicy::Independent,
        );
        let _ = f.bootstrapper.initialize_all().await;
        let n = &f.notifications.pending()[0];
        assert!(!n.description.to_lowercase().contains("spreadsheet"));
        assert!(!n.title.to_lowercase().contains("spreadsheet"));
    }

    #[tokio::test]
    async fn subscribers_observe_ready() {
        let f = fixture(all_succeed(5), BootstrapPolicy::Independent);
        let mut rx = f.bootstrapper.subscribe();
        f.bootstrapper.initialize_all().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_ready());
    }

    #[tokio::test]
    async fn overlapping_calls_are_not_coalesced_by_default() {
        let f = fixture(all_succeed(30), BootstrapPolicy::Independent);
        let (a, b) = tokio::join!(
            f.bootstrapper.initialize_all(),
            f.bootstrapper.initialize_all()
        );
        assert!(a.is_ok() && b.is_ok());
        for client in &f.clients {
            assert_eq!(client.calls(), 2);
        }
    }

    #[tokio::test]
    async fn coalesce_policy_runs_each_client_once() {
        let f = fixture(all_succeed(30), BootstrapPolicy::Coalesce);
        let (a, b) = tokio::join!(
            f.bootstrapper.initialize_all(),
            f.bootstrapper.initialize_all()
        );
        assert!(a.is_ok() && b.is_ok());
        f.bootstrapper.initialize_all().await.unwrap();
        for client in &f.clients {
            assert_eq!(client.calls(), 1);
        }
        assert!(f.bootstrapper.readiness().is_ready());
    }

    #[tokio::test]
    async fn coalesce_policy_retries_after_failure() {
        let f = fixture(
            [
                (Behavior::Succeed, 0),
                (Behavior::Fail, 0),
                (Behavior::Succeed, 0),
            ],
            BootstrapPolicy::Coalesce,
        );
        assert!(f.bootstrapper.initialize_all().await.is_err());
        assert!(f.bootstrapper.initialize_all().await.is_err());
        assert_eq!(f.clients[1].calls(), 2);
        assert_eq!(f.notifications.len(), 2);
    }
}
