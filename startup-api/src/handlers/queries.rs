use axum::{extract::State, http::StatusCode, Json};
use startup::{
    LifecycleEvent, Rejection, StartupError, StartupMeasurement, StartupMetrics, StartupTime,
};
use tracing::debug;

use super::app::AppState;

type Rejected = (StatusCode, Json<Rejection>);

/// Every tracker failure is retryable from the caller's side, either once
/// the lifecycle signal fires or once the clock source recovers.
fn unavailable(err: StartupError) -> Rejected {
    (StatusCode::SERVICE_UNAVAILABLE, Json(Rejection::from(err)))
}

/// The host began loading its bundle.
pub async fn post_bundle_load_started(State(state): State<AppState>) -> StatusCode {
    let delivered = state.bus.emit(LifecycleEvent::BundleLoadStarted);
    debug!(delivered, "bundle load started");
    StatusCode::NO_CONTENT
}

pub async fn get_startup_metrics(
    State(state): State<AppState>,
) -> Result<Json<StartupMetrics>, Rejected> {
    state
        .tracker
        .startup_metrics()
        .map(Json)
        .map_err(unavailable)
}

pub async fn get_startup_time_sync(
    State(state): State<AppState>,
) -> Result<Json<f64>, Rejected> {
    state
        .tracker
        .startup_time_sync()
        .map(Json)
        .map_err(unavailable)
}

pub async fn get_startup_time(
    State(state): State<AppState>,
) -> Result<Json<StartupTime>, Rejected> {
    state
        .tracker
        .startup_time()
        .await
        .map(Json)
        .map_err(|rejection| (StatusCode::SERVICE_UNAVAILABLE, Json(rejection)))
}

pub async fn get_has_app_restarted(State(state): State<AppState>) -> Json<bool> {
    Json(state.tracker.has_app_restarted())
}

pub async fn get_startup_measurement(
    State(state): State<AppState>,
) -> Result<Json<StartupMeasurement>, Rejected> {
    if !state.track_startup {
        return Err((
            StatusCode::NOT_FOUND,
            Json(Rejection {
                code: "DISABLED".to_owned(),
                message: "[StartupTracker] startup tracking is disabled".to_owned(),
            }),
        ));
    }

    state
        .tracker
        .startup_measurement()
        .map(Json)
        .map_err(unavailable)
}
