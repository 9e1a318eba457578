//! Startup timing and restart detection state machine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::clock::{ProcessClock, SystemClock};
use crate::error::{ClockError, StartupError};
use crate::listener::ReloadPolicy;
use crate::metrics;
use crate::payload::{Rejection, StartupMeasurement, StartupMetrics, StartupTime};

#[derive(Debug, Default)]
struct StartupRecord {
    /// Wall clock at the first bundle load; only re-armed by `initialize`.
    baseline_ms: Option<i64>,
    /// Set by the first successful metrics query, then served verbatim.
    cached: Option<StartupMetrics>,
    load_count: u64,
    /// Monotonic: never goes back to false.
    restarted: bool,
}

impl StartupRecord {
    /// Counts one bundle load. Returns true if this load is the one that
    /// first marked the app as restarted.
    fn count_load(&mut self) -> bool {
        self.load_count = self.load_count.saturating_add(1);
        if self.load_count > 1 && !self.restarted {
            self.restarted = true;
            return true;
        }
        false
    }
}

/// Process-scoped startup tracker.
///
/// Construct one per process during startup sequencing and share it behind an
/// `Arc`. Every operation takes the single record lock for its whole
/// read-check-write, so concurrent first queries perform exactly one
/// measurement and all observe the same cached value.
pub struct StartupTracker {
    name: String,
    clock: Arc<dyn ProcessClock>,
    record: Mutex<StartupRecord>,
}

impl StartupTracker {
    /// `name` labels the tracker's logs and metrics.
    pub fn new(name: &str, clock: Arc<dyn ProcessClock>) -> Self {
        Self {
            name: name.to_owned(),
            clock,
            record: Mutex::new(StartupRecord::default()),
        }
    }

    pub fn with_system_clock(name: &str) -> Self {
        Self::new(name, Arc::new(SystemClock {}))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // The record is only mutated through short, non-panicking sections, so a
    // poisoned lock still guards a consistent value.
    fn record(&self) -> MutexGuard<'_, StartupRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-arms the baseline at the current wall clock and drops any cached
    /// metrics, then counts a load. Baseline and cache change under one lock.
    pub fn initialize(&self) {
        let mut record = self.record();
        self.initialize_locked(&mut record);
    }

    /// Counts a bundle load without touching the baseline or cached metrics.
    /// The second and later loads mark the app as restarted.
    pub fn on_lifecycle_signal(&self) {
        let mut record = self.record();
        self.signal_locked(&mut record);
    }

    /// Routes one bundle load signal: the first always initializes, later
    /// ones follow `policy`. Decided and applied under a single lock so two
    /// racing first signals cannot both initialize.
    pub fn observe_bundle_load(&self, policy: ReloadPolicy) {
        let mut record = self.record();
        match (record.baseline_ms, policy) {
            (None, _) | (Some(_), ReloadPolicy::Rebaseline) => {
                self.initialize_locked(&mut record)
            }
            (Some(_), ReloadPolicy::PreserveBaseline) => self.signal_locked(&mut record),
        }
    }

    fn initialize_locked(&self, record: &mut StartupRecord) {
        let now = self.clock.now_millis();
        let previous = record.baseline_ms.replace(now);
        record.cached = None;
        let first_restart = record.count_load();

        metrics::emit_lifecycle_signal(&self.name, "initialize");
        debug!(
            tracker = %self.name,
            baseline_ms = now,
            previous_baseline_ms = previous,
            load_count = record.load_count,
            "Startup: baseline recorded, previous metrics cleared"
        );
        if first_restart {
            self.restart_detected(record.load_count);
        }
    }

    fn signal_locked(&self, record: &mut StartupRecord) {
        let first_restart = record.count_load();

        metrics::emit_lifecycle_signal(&self.name, "signal");
        debug!(
            tracker = %self.name,
            load_count = record.load_count,
            "Startup: bundle load observed"
        );
        if first_restart {
            self.restart_detected(record.load_count);
        }
    }

    fn restart_detected(&self, load_count: u64) {
        metrics::emit_app_restarted(&self.name);
        warn!(
            tracker = %self.name,
            load_count,
            "Startup: bundle reloaded without process relaunch"
        );
    }

    /// Startup duration from the first bundle load to the first call of this
    /// method. Measured once; every later call returns the identical value.
    pub fn startup_metrics(&self) -> Result<StartupMetrics, StartupError> {
        self.measure_once()
            .inspect_err(|e| self.query_failed("startup_metrics", e))
    }

    fn measure_once(&self) -> Result<StartupMetrics, StartupError> {
        let mut record = self.record();

        let Some(start) = record.baseline_ms else {
            return Err(StartupError::Uninitialized);
        };
        if let Some(cached) = record.cached {
            debug!(tracker = %self.name, "Startup: returning cached metrics");
            return Ok(cached);
        }

        let end = self.clock.now_millis();
        if end < start {
            return Err(ClockError::Regressed { start, end }.into());
        }

        let measured = StartupMetrics {
            start_time: start as f64,
            end_time: end as f64,
            duration_seconds: (end - start) as f64 / 1000.0,
        };
        record.cached = Some(measured);

        metrics::emit_startup_duration(&self.name, measured.duration_seconds);
        info!(
            tracker = %self.name,
            start_ms = start,
            end_ms = end,
            duration_secs = measured.duration_seconds,
            "Startup: metrics computed and cached"
        );
        Ok(measured)
    }

    /// Absolute wall clock time, in ms, at which this process started.
    /// Derived from the monotonic clocks on every call; nothing is cached.
    pub fn startup_time_sync(&self) -> Result<f64, StartupError> {
        self.process_start_wall_ms()
            .map(|ms| ms as f64)
            .map_err(StartupError::from)
            .inspect_err(|e| self.query_failed("startup_time", e))
    }

    fn process_start_wall_ms(&self) -> Result<i64, ClockError> {
        let now = self.clock.now_millis();
        let uptime = self.clock.uptime_millis()?;
        let started = self.clock.process_start_uptime_millis()?;
        Ok(now.saturating_sub(uptime).saturating_add(started))
    }

    /// Async form of [`startup_time_sync`](Self::startup_time_sync) for hosts
    /// that resolve promises: wraps the value with a status, or rejects.
    pub async fn startup_time(&self) -> Result<StartupTime, Rejection> {
        self.startup_time_sync()
            .map(StartupTime::ok)
            .map_err(Rejection::from)
    }

    pub fn has_app_restarted(&self) -> bool {
        self.record().restarted
    }

    /// Elapsed time from process start until now, in ms. Recomputed per call.
    pub fn app_start_duration_millis(&self) -> Result<f64, StartupError> {
        self.elapsed_since_process_start()
            .map(|ms| ms as f64)
            .map_err(StartupError::from)
            .inspect_err(|e| self.query_failed("app_start_duration", e))
    }

    fn elapsed_since_process_start(&self) -> Result<i64, ClockError> {
        let uptime = self.clock.uptime_millis()?;
        let started = self.clock.process_start_uptime_millis()?;
        if uptime < started {
            return Err(ClockError::Regressed {
                start: started,
                end: uptime,
            });
        }
        Ok(uptime - started)
    }

    /// Builds the `app_startup` measurement. A zero duration means the
    /// platform could not tell when the process started, so it is rejected.
    pub fn startup_measurement(&self) -> Result<StartupMeasurement, StartupError> {
        let total = self.app_start_duration_millis()?;
        if total == 0.0 {
            let err = StartupError::from(ClockError::Unsupported);
            self.query_failed("startup_measurement", &err);
            return Err(err);
        }
        Ok(StartupMeasurement::app_startup(total))
    }

    pub fn load_count(&self) -> u64 {
        self.record().load_count
    }

    pub fn baseline_millis(&self) -> Option<i64> {
        self.record().baseline_ms
    }

    pub fn is_initialized(&self) -> bool {
        self.record().baseline_ms.is_some()
    }

    fn query_failed(&self, query: &str, err: &StartupError) {
        metrics::emit_query_error(&self.name, query, err.code());
        match err {
            StartupError::Uninitialized => {
                warn!(tracker = %self.name, query, code = err.code(), "Startup: {err}")
            }
            StartupError::Clock(_) => {
                error!(tracker = %self.name, query, code = err.code(), "Startup: {err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker_at(wall_ms: i64) -> (StartupTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(wall_ms));
        (StartupTracker::new("test", clock.clone()), clock)
    }

    #[test]
    fn fresh_tracker_is_uninitialized() {
        let (tracker, _) = tracker_at(1000);
        assert!(!tracker.is_initialized());
        assert_eq!(tracker.load_count(), 0);
        assert!(!tracker.has_app_restarted());
        assert_eq!(tracker.startup_metrics(), Err(StartupError::Uninitialized));
    }

    #[test]
    fn initialize_counts_a_load() {
        let (tracker, _) = tracker_at(1000);
        tracker.initialize();
        assert_eq!(tracker.baseline_millis(), Some(1000));
        assert_eq!(tracker.load_count(), 1);
        assert!(!tracker.has_app_restarted());
    }

    #[test]
    fn reinitialize_rearms_baseline_and_clears_cache() {
        let (tracker, clock) = tracker_at(1000);
        tracker.initialize();
        clock.set_wall(1500);
        let first = tracker.startup_metrics().unwrap();
        assert_eq!(first.end_time, 1500.0);

        clock.set_wall(4000);
        tracker.initialize();
        assert_eq!(tracker.baseline_millis(), Some(4000));
        assert!(tracker.has_app_restarted());

        clock.set_wall(4250);
        let second = tracker.startup_metrics().unwrap();
        assert_eq!(second.start_time, 4000.0);
        assert_eq!(second.end_time, 4250.0);
        assert_eq!(second.duration_seconds, 0.25);
    }

    #[test]
    fn regressed_wall_clock_is_not_cached() {
        let (tracker, clock) = tracker_at(2000);
        tracker.initialize();
        clock.set_wall(1500);
        assert_eq!(
            tracker.startup_metrics(),
            Err(StartupError::Clock(ClockError::Regressed {
                start: 2000,
                end: 1500
            }))
        );

        clock.set_wall(2600);
        let metrics = tracker.startup_metrics().unwrap();
        assert_eq!(metrics.duration_seconds, 0.6);
    }

    #[test]
    fn zero_elapsed_is_a_valid_duration() {
        let (tracker, _) = tracker_at(1000);
        tracker.initialize();
        let metrics = tracker.startup_metrics().unwrap();
        assert_eq!(metrics.duration_seconds, 0.0);
    }

    #[test]
    fn observe_routes_first_signal_to_initialize() {
        let (tracker, clock) = tracker_at(1000);
        tracker.observe_bundle_load(ReloadPolicy::PreserveBaseline);
        assert_eq!(tracker.baseline_millis(), Some(1000));

        clock.set_wall(5000);
        tracker.observe_bundle_load(ReloadPolicy::PreserveBaseline);
        assert_eq!(tracker.baseline_millis(), Some(1000));
        assert_eq!(tracker.load_count(), 2);

        tracker.observe_bundle_load(ReloadPolicy::Rebaseline);
        assert_eq!(tracker.baseline_millis(), Some(5000));
        assert_eq!(tracker.load_count(), 3);
        assert!(tracker.has_app_restarted());
    }

    #[test]
    fn signal_before_initialize_leaves_baseline_unset() {
        let (tracker, _) = tracker_at(1000);
        tracker.on_lifecycle_signal();
        assert_eq!(tracker.load_count(), 1);
        assert!(!tracker.is_initialized());
        assert_eq!(tracker.startup_metrics(), Err(StartupError::Uninitialized));
    }

    #[test]
    fn startup_time_derives_from_monotonic_clocks() {
        let clock = Arc::new(ManualClock::new(1_000_000).with_uptime(60_000, 58_500));
        let tracker = StartupTracker::new("test", clock.clone());

        assert_eq!(tracker.startup_time_sync(), Ok(1_000_000.0 - 60_000.0 + 58_500.0));
        clock.advance(10_000);
        assert_eq!(tracker.startup_time_sync(), Ok(998_500.0));
        assert_eq!(tracker.app_start_duration_millis(), Ok(11_500.0));
    }

    #[test]
    fn startup_time_propagates_clock_failures() {
        let clock = Arc::new(ManualClock::new(1000));
        clock.set_uptime_unavailable(true);
        let tracker = StartupTracker::new("test", clock);

        assert_eq!(
            tracker.startup_time_sync(),
            Err(StartupError::Clock(ClockError::Unsupported))
        );
        assert_eq!(
            tracker.app_start_duration_millis(),
            Err(StartupError::Clock(ClockError::Unsupported))
        );
    }

    #[test]
    fn uptime_before_process_start_is_regressed() {
        let clock = Arc::new(ManualClock::new(0).with_uptime(100, 200));
        let tracker = StartupTracker::new("test", clock);
        let regressed = StartupError::Clock(ClockError::Regressed {
            start: 200,
            end: 100,
        });

        assert_eq!(tracker.app_start_duration_millis(), Err(regressed.clone()));
        assert_eq!(tracker.startup_measurement(), Err(regressed));
    }

    #[test]
    fn zero_measurement_is_rejected() {
        let clock = Arc::new(ManualClock::new(1000).with_uptime(300, 300));
        let tracker = StartupTracker::new("test", clock.clone());
        assert_eq!(
            tracker.startup_measurement(),
            Err(StartupError::Clock(ClockError::Unsupported))
        );

        clock.advance(420);
        let measurement = tracker.startup_measurement().unwrap();
        assert_eq!(measurement.total_duration_ms(), Some(420.0));
    }
}
