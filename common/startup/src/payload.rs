//! Host-facing result shapes for the query operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StartupError;

/// Memoized result of the first startup duration measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartupMetrics {
    /// Baseline wall clock, in ms, recorded at the first bundle load.
    #[serde(rename = "startStartupTime")]
    pub start_time: f64,
    /// Wall clock, in ms, sampled by the first query.
    #[serde(rename = "endStartupTime")]
    pub end_time: f64,
    #[serde(rename = "startupDuration")]
    pub duration_seconds: f64,
}

/// Payload of the async startup time query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupTime {
    pub status: String,
    /// Absolute process start, Unix epoch ms.
    pub startup_time: f64,
}

impl StartupTime {
    pub fn ok(startup_time: f64) -> Self {
        Self {
            status: "ok".to_string(),
            startup_time,
        }
    }
}

/// Failed query as seen by the host: a stable code plus a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: String,
    pub message: String,
}

impl From<&StartupError> for Rejection {
    fn from(err: &StartupError) -> Self {
        Self {
            code: err.code().to_string(),
            message: format!("[StartupTracker] {err}"),
        }
    }
}

impl From<StartupError> for Rejection {
    fn from(err: StartupError) -> Self {
        Rejection::from(&err)
    }
}

pub(crate) const MEASUREMENT_TYPE: &str = "app_startup";
pub(crate) const TOTAL_DURATION_KEY: &str = "total_duration_ms";

/// `app_startup` measurement: total time from process start until it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupMeasurement {
    #[serde(rename = "type")]
    pub kind: String,
    pub values: HashMap<String, f64>,
}

impl StartupMeasurement {
    pub(crate) fn app_startup(total_duration_ms: f64) -> Self {
        Self {
            kind: MEASUREMENT_TYPE.to_string(),
            values: HashMap::from([(TOTAL_DURATION_KEY.to_string(), total_duration_ms)]),
        }
    }

    pub fn total_duration_ms(&self) -> Option<f64> {
        self.values.get(TOTAL_DURATION_KEY).copied()
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;
    use crate::error::ClockError;

    #[test]
    fn metrics_use_bridge_field_names() {
        let metrics = StartupMetrics {
            start_time: 1000.0,
            end_time: 1500.0,
            duration_seconds: 0.5,
        };
        assert_json_eq!(
            serde_json::to_value(metrics).unwrap(),
            json!({
                "startStartupTime": 1000.0,
                "endStartupTime": 1500.0,
                "startupDuration": 0.5,
            })
        );
    }

    #[test]
    fn startup_time_carries_status() {
        assert_json_eq!(
            serde_json::to_value(StartupTime::ok(1234.0)).unwrap(),
            json!({"status": "ok", "startupTime": 1234.0})
        );
    }

    #[test]
    fn rejection_from_error() {
        let rejection = Rejection::from(StartupError::Uninitialized);
        assert_eq!(rejection.code, "NO_START_TIME");
        assert_eq!(
            rejection.message,
            "[StartupTracker] baseline not recorded, lifecycle signal never observed"
        );

        let rejection = Rejection::from(StartupError::Clock(ClockError::Unsupported));
        assert_eq!(rejection.code, "CLOCK_UNAVAILABLE");
    }

    #[test]
    fn measurement_shape() {
        let measurement = StartupMeasurement::app_startup(812.0);
        assert_eq!(measurement.total_duration_ms(), Some(812.0));
        assert_json_eq!(
            serde_json::to_value(&measurement).unwrap(),
            json!({"type": "app_startup", "values": {"total_duration_ms": 812.0}})
        );
    }
}
