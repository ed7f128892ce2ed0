//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::live_reload;
use crate::middleware::headers;
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router =
        Router::new().route("/__reflex/client.js", get(static_files::client_script));

    // WebSocket endpoint, only when live reload is running
    if state.live_reload_enabled() {
        router = router.route("/__reflex/ws", get(live_reload::ws_handler));
    }

    // Everything else is served from the watched root
    router = router.merge(static_files::static_router());

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(headers::cache_control_layer()),
        )
        .with_state(state)
}
