//! Sliding-window event throttle.
//!
//! Answers "were there already `max` events in the last `window`?" and
//! records the event when there were not. Used to cap outbound attack
//! events independently of request rate limiting.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct SlidingWindow {
    window: Duration,
    max: usize,
    entries: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    pub fn new(window: Duration, max: usize) -> Self {
        Self {
            window,
            max,
            entries: Mutex::new(VecDeque::with_capacity(max.min(1024))),
        }
    }

    /// Purge entries older than the window, then record `now` if there is
    /// room. Returns `false` without recording when the window is full.
    pub fn try_record(&self, now: Instant) -> bool {
        let mut entries = self.entries.lock().expect("sliding window mutex poisoned");

        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() >= self.max {
            return false;
        }
        entries.push_back(now);
        true
    }

    /// Events currently inside the window, as of the last record attempt.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("sliding window mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
