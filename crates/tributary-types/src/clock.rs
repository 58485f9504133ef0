use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Shared engine clock: wall-clock unix seconds plus an adjustable offset.
///
/// Every deadline, release-time, and dispute-window comparison in the
/// engine reads through one `Clock`, so tests can fast-forward past a
/// dispute window without sleeping.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    offset_secs: Arc<AtomicI64>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in unix seconds.
    pub fn now(&self) -> i64 {
        chrono::Utc::now().timestamp() + self.offset_secs.load(Ordering::Relaxed)
    }

    /// Shift the clock forward. Test and simulation use only.
    pub fn advance(&self, secs: u64) {
        self.offset_secs.fetch_add(secs as i64, Ordering::Relaxed);
    }
}
