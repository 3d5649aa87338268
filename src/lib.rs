pub mod auth; // Session verdict from stored credentials + identity check
pub mod config;
pub mod core_state; // Application-root state and mount lifecycle
pub mod credentials;
pub mod dev_mode;
pub mod diagnostics; // Processing log + dev-mode debug panel
pub mod identity;
pub mod intake; // Invoice intake orchestration
pub mod presentation;
pub mod route_guard;
pub mod scope;
pub mod services; // Mail/storage/spreadsheet clients + bootstrap
pub mod storage;
pub mod validation;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState, MountReport};
use crate::presentation::Screen;

/// Initialize tracing. `RUST_LOG` wins over the built-in filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Build the production state, mount it once and report the screen the
/// UI should render.
pub async fn run() -> Result<(Arc<CoreState>, MountReport, Screen), CoreError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let state = Arc::new(CoreState::from_config(AppConfig::from_env())?);
    let report = state.mount().await;
    let screen = state.current_screen();
    tracing::info!(?screen, "Initial screen");
    Ok((state, report, screen))
}
