//! Throttle and debounce primitives driven by caller-supplied instants.
//!
//! Neither type owns a timer. The UI loop passes `now` on every event and on
//! every frame, which keeps all scheduling on one thread and makes timing
//! deterministic under test.

use std::time::{Duration, Instant};

/// Outcome of offering an event to a [`Throttle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the work now.
    Immediate,
    /// Work was folded into the single pending trailing run.
    Deferred,
}

/// Leading-edge throttle with one coalesced trailing run.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_run: Option<Instant>,
    trailing: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
            trailing: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_run
            .map(|last| now.saturating_duration_since(last) >= self.interval)
            .unwrap_or(true)
    }

    /// Offer one event.
    ///
    /// An immediate admission also absorbs any pending trailing run, since the
    /// work about to execute already observes the latest state.
    pub fn admit(&mut self, now: Instant) -> Admission {
        if self.window_open(now) {
            self.last_run = Some(now);
            self.trailing = false;
            Admission::Immediate
        } else {
            self.trailing = true;
            Admission::Deferred
        }
    }

    /// Frame-boundary check for the trailing run.
    ///
    /// # Returns
    /// `true` exactly once per deferred burst, at the first frame at least one
    /// interval after the last run.
    pub fn poll_trailing(&mut self, now: Instant) -> bool {
        if !self.trailing || !self.window_open(now) {
            return false;
        }
        self.trailing = false;
        self.last_run = Some(now);
        true
    }

    pub fn has_trailing(&self) -> bool {
        self.trailing
    }

    /// Drop a pending trailing run. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.trailing = false;
    }

    /// Forget all history so the next event runs immediately.
    pub fn reset(&mut self) {
        self.last_run = None;
        self.trailing = false;
    }
}

/// Trailing-edge debounce: fires once after `delay` of quiet.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the quiet period from `now`.
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check whether the quiet period has elapsed, disarming on fire.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Disarm without firing. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
