//! Route guard and protected-shell gate.
//!
//! `decide` looks only at the auth signal and the dev override. Service
//! readiness is applied afterwards by `shell_view`, once the guard has let
//! the user through.

use serde::Serialize;

use crate::auth::AuthSnapshot;
use crate::services::Readiness;

/// Where the router sends the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    ShowLoadingPlaceholder,
    RedirectToDashboard,
    RenderLoginScreen,
}

/// Total over all eight inputs. Loading wins over everything, then
/// authenticated-or-dev-mode, then login.
pub fn decide(is_authenticated: bool, is_loading: bool, is_dev_mode: bool) -> Destination {
    if is_loading {
        Destination::ShowLoadingPlaceholder
    } else if is_authenticated || is_dev_mode {
        Destination::RedirectToDashboard
    } else {
        Destination::RenderLoginScreen
    }
}

pub fn decide_for(auth: AuthSnapshot, is_dev_mode: bool) -> Destination {
    decide(auth.is_authenticated, auth.is_loading, is_dev_mode)
}

/// State of the protected shell once the guard has admitted the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellView {
    /// Services still bootstrapping: features disabled.
    Initializing,
    Ready,
    /// Bootstrap failed: features disabled, error shown.
    Unavailable,
}

pub fn shell_view(readiness: &Readiness) -> ShellView {
    match readiness {
        Readiness::Pending => ShellView::Initializing,
        Readiness::Ready => ShellView::Ready,
        Readiness::Failed(_) => ShellView::Unavailable,
    }
}
