//! App startup timing and restart detection.
//!
//! A [`StartupTracker`] records a baseline when the host first reports that it
//! started loading its bundle, measures the startup duration once on first
//! query and serves that cached value forever after. Further bundle loads
//! without a process relaunch flip the "restarted" flag. The tracker is an
//! explicitly constructed object: hosts wire it to a [`LifecycleBus`] with
//! [`install`] during their own startup sequencing, and keep the returned
//! [`Subscription`] alive for as long as signals should be observed.

mod clock;
mod error;
mod listener;
mod metrics;
mod payload;
mod tracker;

pub use clock::{ManualClock, ProcessClock, SystemClock};
pub use error::{ClockError, StartupError};
pub use listener::{install, LifecycleBus, LifecycleEvent, ReloadPolicy, Subscription};
pub use payload::{Rejection, StartupMeasurement, StartupMetrics, StartupTime};
pub use tracker::StartupTracker;
