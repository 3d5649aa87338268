//! External service clients and their bootstrap.
//!
//! The mail, storage and spreadsheet clients are owned by `CoreState` as
//! injected handles and passed by reference to whoever needs them.

pub mod bootstrap;
pub mod discovery;

pub use bootstrap::*;
pub use discovery::*;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

/// Which external client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Mail,
    Storage,
    Spreadsheet,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [Self::Mail, Self::Storage, Self::Spreadsheet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Storage => "storage",
            Self::Spreadsheet => "spreadsheet",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a client's `initialize()`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Cannot reach {0}")]
    Connection(String),
    #[error("HTTP error: {0}")]
    HttpClient(String),
    #[error("Service returned {status}")]
    Status { status: u16 },
    #[error("Invalid discovery document: {0}")]
    Discovery(String),
    #[error("Initialization failed: {0}")]
    Failed(String),
    #[error("{client} client wired into the {slot} slot")]
    Misplaced { slot: ServiceKind, client: ServiceKind },
}

/// An external client that must be initialized before feature use.
///
/// `initialize` may be called more than once per process; see
/// `BootstrapPolicy` for coalescing.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    fn kind(&self) -> ServiceKind;

    async fn initialize(&self) -> Result<(), ServiceError>;
}

/// The three client handles, constructed once at the application root.
#[derive(Clone)]
pub struct ServiceHandles {
    mail: Arc<dyn ServiceClient>,
    storage: Arc<dyn ServiceClient>,
    spreadsheet: Arc<dyn ServiceClient>,
}

impl ServiceHandles {
    /// Each client must report the kind of the slot it is wired into.
    pub fn new(
        mail: Arc<dyn ServiceClient>,
        storage: Arc<dyn ServiceClient>,
        spreadsheet: Arc<dyn ServiceClient>,
    ) -> Result<Self, ServiceError> {
        let handles = Self {
            mail,
            storage,
            spreadsheet,
        };
        for slot in ServiceKind::ALL {
            let client = handles.get(slot).kind();
            if client != slot {
                return Err(ServiceError::Misplaced { slot, client });
            }
        }
        Ok(handles)
    }

    pub fn get(&self, kind: ServiceKind) -> &Arc<dyn ServiceClient> {
        match kind {
            ServiceKind::Mail => &self.mail,
            ServiceKind::Storage => &self.storage,
            ServiceKind::Spreadsheet => &self.spreadsheet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_is_lowercase() {
        assert_eq!(ServiceKind::Mail.to_string(), "mail");
        assert_eq!(ServiceKind::Storage.to_string(), "storage");
        assert_eq!(ServiceKind::Spreadsheet.to_string(), "spreadsheet");
    }

    struct Stub(ServiceKind);

    #[async_trait]
    impl ServiceClient for Stub {
        fn kind(&self) -> ServiceKind {
            self.0
        }

        async fn initialize(&self) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    fn stub(kind: ServiceKind) -> Arc<dyn ServiceClient> {
        Arc::new(Stub(kind))
    }

    #[test]
    fn handles_resolve_by_kind() {
        let handles = ServiceHandles::new(
            stub(ServiceKind::Mail),
            stub(ServiceKind::Storage),
            stub(ServiceKind::Spreadsheet),
        )
        .unwrap();
        for kind in ServiceKind::ALL {
            assert_eq!(handles.get(kind).kind(), kind);
        }
    }

    #[test]
    fn swapped_clients_are_rejected() {
        let result = ServiceHandles::new(
            stub(ServiceKind::Storage),
            stub(ServiceKind::Mail),
            stub(ServiceKind::Spreadsheet),
        );
        match result {
            Err(ServiceError::Misplaced { slot, client }) => {
                assert_eq!(slot, ServiceKind::Mail);
                assert_eq!(client, ServiceKind::Storage);
            }
            Err(e) => panic!("Expected Misplaced, got: {e}"),
            Ok(_) => panic!("Expected Misplaced, got handles"),
        }
    }

    #[test]
    fn all_lists_each_kind_once() {
        let kinds: std::collections::HashSet<_> = ServiceKind::ALL.into_iter().collect();
        assert_eq!(kinds.len(), 3);
    }
}
