//! Cross-frame state shared by handlers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::tracker::ConnectionTracker;

/// State that outlives a single frame
///
/// Owned by the dispatcher and lent mutably to one handler at a time.
#[derive(Debug)]
pub struct DispatchContext {
    tracker: ConnectionTracker,
    now: SystemTime,
}

impl DispatchContext {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            tracker: ConnectionTracker::new(idle_timeout),
            now: UNIX_EPOCH,
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ConnectionTracker {
        &mut self.tracker
    }

    /// Latest capture time seen; never moves backwards
    pub fn now(&self) -> SystemTime {
        self.now
    }

    pub(crate) fn advance(&mut self, at: SystemTime) {
        if at > self.now {
            self.now = at;
        }
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new(ConnectionTracker::default().idle_timeout())
    }
}
