//! Clock sources consulted by the tracker.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::error::ClockError;

/// Time sources for a running process, all in milliseconds.
pub trait ProcessClock: Send + Sync {
    /// Wall clock, milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Monotonic time elapsed since boot.
    fn uptime_millis(&self) -> Result<i64, ClockError>;

    /// Monotonic time since boot at which this process was started.
    fn process_start_uptime_millis(&self) -> Result<i64, ClockError>;
}

/// Clock backed by the operating system.
///
/// Monotonic sources are read from procfs, so they are only available on
/// Linux. Other platforms get [`ClockError::Unsupported`] from the uptime
/// methods; the wall clock works everywhere.
#[derive(Clone, Debug, Default)]
pub struct SystemClock {}

impl ProcessClock for SystemClock {
    fn now_millis(&self) -> i64 {
        (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }

    #[cfg(target_os = "linux")]
    fn uptime_millis(&self) -> Result<i64, ClockError> {
        parse_uptime(&read_proc(PROC_UPTIME)?)
    }

    #[cfg(not(target_os = "linux"))]
    fn uptime_millis(&self) -> Result<i64, ClockError> {
        Err(ClockError::Unsupported)
    }

    #[cfg(target_os = "linux")]
    fn process_start_uptime_millis(&self) -> Result<i64, ClockError> {
        parse_stat_start(&read_proc(PROC_SELF_STAT)?)
    }

    #[cfg(not(target_os = "linux"))]
    fn process_start_uptime_millis(&self) -> Result<i64, ClockError> {
        Err(ClockError::Unsupported)
    }
}

const PROC_UPTIME: &str = "/proc/uptime";
const PROC_SELF_STAT: &str = "/proc/self/stat";

/// procfs reports process times in USER_HZ ticks, which the kernel ABI pins at 100.
const USER_HZ: i64 = 100;

/// 1-based position of `starttime` in `/proc/<pid>/stat`.
const STAT_STARTTIME_FIELD: usize = 22;

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn read_proc(path: &'static str) -> Result<String, ClockError> {
    std::fs::read_to_string(path).map_err(|e| ClockError::Unreadable {
        path,
        reason: e.to_string(),
    })
}

/// Parses the first field of `/proc/uptime` ("12345.67 54321.00").
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_uptime(contents: &str) -> Result<i64, ClockError> {
    let malformed = |reason: &str| ClockError::Malformed {
        path: PROC_UPTIME,
        reason: reason.to_string(),
    };

    let secs: f64 = contents
        .split_whitespace()
        .next()
        .ok_or_else(|| malformed("empty file"))?
        .parse()
        .map_err(|_| malformed("uptime is not a number"))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(malformed("uptime out of range"));
    }
    Ok((secs * 1000.0).round() as i64)
}

/// Extracts `starttime` from `/proc/self/stat`. The command name (field 2) is
/// wrapped in parentheses and may itself contain spaces or parentheses, so
/// fields are counted from the last closing parenthesis.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat_start(contents: &str) -> Result<i64, ClockError> {
    let malformed = |reason: &str| ClockError::Malformed {
        path: PROC_SELF_STAT,
        reason: reason.to_string(),
    };

    let (_, rest) = contents
        .rsplit_once(')')
        .ok_or_else(|| malformed("missing command name"))?;

    // `rest` starts at field 3 (state).
    let ticks: i64 = rest
        .split_whitespace()
        .nth(STAT_STARTTIME_FIELD - 3)
        .ok_or_else(|| malformed("too few fields"))?
        .parse()
        .map_err(|_| malformed("starttime is not an integer"))?;

    Ok(ticks.saturating_mul(1000) / USER_HZ)
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    wall_ms: AtomicI64,
    uptime_ms: AtomicI64,
    process_start_uptime_ms: AtomicI64,
    uptime_unavailable: AtomicBool,
}

impl ManualClock {
    pub fn new(wall_ms: i64) -> Self {
        Self {
            wall_ms: AtomicI64::new(wall_ms),
            ..Default::default()
        }
    }

    /// Sets the monotonic readings: time since boot, and when the process started.
    pub fn with_uptime(self, uptime_ms: i64, process_start_uptime_ms: i64) -> Self {
        self.uptime_ms.store(uptime_ms, Ordering::SeqCst);
        self.process_start_uptime_ms
            .store(process_start_uptime_ms, Ordering::SeqCst);
        self
    }

    pub fn set_wall(&self, wall_ms: i64) {
        self.wall_ms.store(wall_ms, Ordering::SeqCst);
    }

    /// Moves wall clock and uptime forward together.
    pub fn advance(&self, ms: i64) {
        self.wall_ms.fetch_add(ms, Ordering::SeqCst);
        self.uptime_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Makes the monotonic sources fail with [`ClockError::Unsupported`].
    pub fn set_uptime_unavailable(&self, unavailable: bool) {
        self.uptime_unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_uptime(&self) -> Result<(), ClockError> {
        if self.uptime_unavailable.load(Ordering::SeqCst) {
            Err(ClockError::Unsupported)
        } else {
            Ok(())
        }
    }
}

impl ProcessClock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.wall_ms.load(Ordering::SeqCst)
    }

    fn uptime_millis(&self) -> Result<i64, ClockError> {
        self.check_uptime()?;
        Ok(self.uptime_ms.load(Ordering::SeqCst))
    }

    fn process_start_uptime_millis(&self) -> Result<i64, ClockError> {
        self.check_uptime()?;
        Ok(self.process_start_uptime_ms.load(Ordering::SeqCst))
    }
}
