pub mod audit;
pub mod geofence;
pub mod ledger;
pub mod notifier;
pub mod policy;
pub mod recorder;
pub mod workflow;

use chrono::{DateTime, Utc};

/// Source of "now" for the workflow, swapped out in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
