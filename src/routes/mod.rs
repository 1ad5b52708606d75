use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub mod auth;
pub mod dashboards;
pub mod health;
pub mod sources;
pub mod users;

/// Assemble the full application router. Shared between `main` and the tests
/// so both exercise the identical surface.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(dashboards::router())
        .merge(sources::router())
        .merge(users::router())
        .with_state(state)
}
