// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded waiting for device status signals.

use std::{
    thread,
    time::{Duration, Instant},
};

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Ready,
    Timeout,
}

/// Point in time after which a wait gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Poll `ready` every `interval` until it reports `true` or `deadline` passes.
///
/// `ready` is always evaluated at least once, even with an expired deadline.
pub fn poll_until(
    deadline: Deadline,
    interval: Duration,
    mut ready: impl FnMut() -> bool,
) -> WaitStatus {
    loop {
        if ready() {
            return WaitStatus::Ready;
        }
        if deadline.expired() {
            return WaitStatus::Timeout;
        }
        thread::sleep(interval.min(deadline.remaining()));
    }
}

/// Sticky flag raised when a bounded wait expires.
///
/// It stays raised until it is explicitly taken, so every expiry is observed
/// exactly once.
#[derive(Debug, Default)]
pub struct TimeoutLatch {
    latched: bool,
}

impl TimeoutLatch {
    pub fn set(&mut self) {
        self.latched = true;
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.latched
    }

    /// Return the current state and clear the latch.
    pub fn take_and_clear(&mut self) -> bool {
        std::mem::take(&mut self.latched)
    }

    pub fn reset(&mut self) {
        self.latched = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_immediately() {
        let status = poll_until(Deadline::after(Duration::ZERO), Duration::from_millis(1), || true);
        assert_eq!(status, WaitStatus::Ready);
    }

    #[test]
    fn becomes_ready_before_deadline() {
        let mut polls = 0;
        let status = poll_until(
            Deadline::after(Duration::from_secs(5)),
            Duration::from_millis(1),
            || {
                polls += 1;
                polls == 3
            },
        );
        assert_eq!(status, WaitStatus::Ready);
        assert_eq!(polls, 3);
    }

    #[test]
    fn expires_within_bound() {
        let timeout = Duration::from_millis(20);
        let started = Instant::now();
        let status = poll_until(Deadline::after(timeout), Duration::from_millis(5), || false);
        assert_eq!(status, WaitStatus::Timeout);
        let elapsed = started.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[test]
    fn latch_is_observed_once() {
        let mut latch = TimeoutLatch::default();
        assert!(!latch.take_and_clear());
        latch.set();
        latch.set();
        assert!(latch.is_set());
        assert!(latch.take_and_clear());
        assert!(!latch.is_set());
        assert!(!latch.take_and_clear());
        latch.set();
        latch.reset();
        assert!(!latch.is_set());
    }
}
