//! Per-submitter quiet window between match submissions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Tracks when each submitter last opened a submission.
///
/// A stamp is recorded only once a submission has passed validation and its
/// approval session is open; rejected submissions never stamp. The stamp
/// stays in place when the session is later cancelled or expires, so a dead
/// session does not refund the window.
#[derive(Debug, Clone)]
pub struct CooldownTracker {
    window: Duration,
    stamps: Arc<Mutex<HashMap<String, Instant>>>,
}

impl CooldownTracker {
    /// Creates a tracker enforcing the given quiet window.
    #[instrument]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stamps: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Time left before the submitter may open another submission, or `None`
    /// when the window has passed or no stamp exists.
    #[instrument(skip(self))]
    pub fn remaining(&self, submitter_id: &str) -> Option<Duration> {
        let stamps = self.stamps.lock().unwrap();
        let elapsed = stamps.get(submitter_id)?.elapsed();

        if elapsed < self.window {
            let remaining = self.window - elapsed;
            debug!(submitter_id, remaining_secs = remaining.as_secs_f64(), "Cooldown active");
            Some(remaining)
        } else {
            None
        }
    }

    /// Stamps the submitter's window starting now.
    #[instrument(skip(self))]
    pub fn record(&self, submitter_id: &str) {
        let mut stamps = self.stamps.lock().unwrap();
        stamps.insert(submitter_id.to_string(), Instant::now());
        debug!(submitter_id, "Cooldown recorded");
    }
}
