use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

/// Fixed-size ring of recent call outcomes (`true` = success) plus the state
/// machine's transition bookkeeping. Lives behind a single `RwLock` per
/// breaker — the lock is held only for the duration of a state read or a
/// transition decision, never across the wrapped call.
pub struct Inner {
    pub state: State,
    window: VecDeque<bool>,
    window_cap: usize,
    opened_at: Option<Instant>,
    half_open_successes: usize,
    half_open_inflight: usize,
}

impl Inner {
    pub fn new(window_cap: usize) -> Self {
        Self {
            state: State::Closed,
            window: VecDeque::with_capacity(window_cap),
            window_cap,
            opened_at: None,
            half_open_successes: 0,
            half_open_inflight: 0,
        }
    }

    fn record(&mut self, success: bool) {
        if self.window.len() == self.window_cap {
            self.window.pop_front();
        }
        self.window.push_back(success);
    }

    fn failure_rate_percent(&self) -> u8 {
        if self.window.is_empty() {
            return 0;
        }
        let failures = self.window.iter().filter(|&&ok| !ok).count();
        ((failures * 100) / self.window.len()) as u8
    }

    /// Decide whether a new call may proceed, transitioning OPEN -> HALF_OPEN
    /// when `open_duration` has elapsed. Returns `true` if the call may run.
    pub fn can_attempt(&mut self, open_duration: std::time::Duration, half_open_permitted: usize) -> bool {
        match self.state {
            State::Closed => true,
            State::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= open_duration {
                    self.state = State::HalfOpen;
                    self.half_open_successes = 0;
                    self.half_open_inflight = 1;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => {
                if self.half_open_inflight < half_open_permitted {
                    self.half_open_inflight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn on_success(&mut self, threshold_percent: u8, minimum_calls: usize, half_open_required: usize) {
        match self.state {
            State::Closed => {
                self.record(true);
            }
            State::HalfOpen => {
                self.half_open_successes += 1;
                if self.half_open_successes >= half_open_required {
                    self.state = State::Closed;
                    self.window.clear();
                    self.opened_at = None;
                    self.half_open_successes = 0;
                    self.half_open_inflight = 0;
                }
            }
            State::Open => {}
        }
        let _ = (threshold_percent, minimum_calls);
    }

    pub fn on_failure(&mut self, threshold_percent: u8, minimum_calls: usize) {
        match self.state {
            State::Closed => {
                self.record(false);
                if self.window.len() >= minimum_calls && self.failure_rate_percent() >= threshold_percent {
                    self.state = State::Open;
                    self.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                self.state = State::Open;
                self.opened_at = Some(Instant::now());
                self.half_open_successes = 0;
                self.half_open_inflight = 0;
            }
            State::Open => {}
        }
    }
}
