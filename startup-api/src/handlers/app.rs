use std::sync::Arc;

use axum::{routing, Router};
use startup::{LifecycleBus, StartupTracker};

use super::queries;

/// Shared by every handler: the process tracker and the bus the host
/// delivers lifecycle events on.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<StartupTracker>,
    pub bus: LifecycleBus,
    pub track_startup: bool,
}

pub fn add_routes(router: Router, state: AppState) -> Router {
    let router = router
        .route("/", routing::get(index))
        .route("/_readiness", routing::get(index))
        .route("/_liveness", routing::get(index)); // No async loop to watch, just check axum health

    let api = Router::new()
        .route(
            "/lifecycle/bundle-load-started",
            routing::post(queries::post_bundle_load_started),
        )
        .route("/startup/metrics", routing::get(queries::get_startup_metrics))
        .route("/startup/time", routing::get(queries::get_startup_time))
        .route(
            "/startup/time/sync",
            routing::get(queries::get_startup_time_sync),
        )
        .route(
            "/startup/restarted",
            routing::get(queries::get_has_app_restarted),
        )
        .route(
            "/startup/measurement",
            routing::get(queries::get_startup_measurement),
        )
        .with_state(state);

    router.merge(api)
}

pub async fn index() -> &'static str {
    "startup api"
}
