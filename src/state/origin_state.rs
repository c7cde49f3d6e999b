use std::time::{Duration, Instant};

/// Pacing state for one origin as seen from a single fetch session
///
/// Sessions are used by one worker at a time, so a fixed delay between two
/// fetches from the same session keeps per-origin load bounded by the number
/// of sessions.
#[derive(Debug, Clone, Default)]
pub struct OriginState {
    /// Number of requests this session made to the origin
    pub request_count: u32,

    /// Timestamp of the last request to the origin
    pub last_request_time: Option<Instant>,
}

impl OriginState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if a request can be made now without breaking the delay
    pub fn can_request(&self, delay: Duration, now: Instant) -> bool {
        self.time_until_next_request(delay, now).is_none()
    }

    /// Records that a request was made to this origin
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < delay {
            Some(delay - elapsed)
        } else {
            None
        }
    }
}
