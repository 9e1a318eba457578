pub(crate) const METRIC_LIFECYCLE_SIGNALS: &str = "startup_lifecycle_signals_total";
pub(crate) const METRIC_APP_RESTARTED: &str = "startup_app_restarted_total";
pub(crate) const METRIC_STARTUP_DURATION: &str = "startup_duration_seconds";
pub(crate) const METRIC_QUERY_ERRORS: &str = "startup_query_errors_total";

pub(crate) fn emit_lifecycle_signal(service_name: &str, action: &str) {
    metrics::counter!(
        METRIC_LIFECYCLE_SIGNALS,
        "service_name" => service_name.to_string(),
        "action" => action.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_app_restarted(service_name: &str) {
    metrics::counter!(
        METRIC_APP_RESTARTED,
        "service_name" => service_name.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_startup_duration(service_name: &str, duration_secs: f64) {
    metrics::histogram!(
        METRIC_STARTUP_DURATION,
        "service_name" => service_name.to_string()
    )
    .record(duration_secs);
}

pub(crate) fn emit_query_error(service_name: &str, query: &str, code: &str) {
    metrics::counter!(
        METRIC_QUERY_ERRORS,
        "service_name" => service_name.to_string(),
        "query" => query.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
}
