//! Cooperative interval timers.
//!
//! Timers do nothing on their own. The poll loop asks [`TimerManager::take_expired`]
//! for each timer in turn and runs the matching handler itself, so a handler
//! fires at most once per activation.

use crate::time::LinkTime;
use std::time::Duration;

/// The three session timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Retransmission trigger.
    Timeout,
    /// Takes back a SELECT token that has been away too long.
    Select,
    /// Line busy with our own transmission.
    Tx,
}

impl TimerId {
    /// All timers in scan order.
    pub const ALL: [TimerId; 3] = [TimerId::Timeout, TimerId::Select, TimerId::Tx];

    fn index(self) -> usize {
        match self {
            TimerId::Timeout => 0,
            TimerId::Select => 1,
            TimerId::Tx => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Timer {
    interval: Duration,
    expires_at: LinkTime,
    active: bool,
}

/// State of the session timers.
#[derive(Debug, Clone, Default)]
pub struct TimerManager {
    timers: [Timer; 3],
}

impl TimerManager {
    /// Create inactive timers with the given intervals.
    pub fn new(timeout: Duration, select: Duration, tx: Duration) -> Self {
        let mut manager = TimerManager::default();
        manager.set_interval(TimerId::Timeout, timeout);
        manager.set_interval(TimerId::Select, select);
        manager.set_interval(TimerId::Tx, tx);
        manager
    }

    /// Change a timer's interval. Takes effect on the next activation.
    pub fn set_interval(&mut self, id: TimerId, interval: Duration) {
        self.timers[id.index()].interval = interval;
    }

    /// Start (expiry = now + interval) or stop a timer.
    pub fn set_active(&mut self, id: TimerId, active: bool, now: LinkTime) {
        let timer = &mut self.timers[id.index()];
        timer.active = active;
        if active {
            timer.expires_at = now + timer.interval;
        }
    }

    /// Start a timer with a one-off interval.
    pub fn start_for(&mut self, id: TimerId, interval: Duration, now: LinkTime) {
        self.set_interval(id, interval);
        self.set_active(id, true, now);
    }

    /// Whether a timer is running.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers[id.index()].active
    }

    /// If the timer has expired, deactivate it and return `true`.
    pub fn take_expired(&mut self, id: TimerId, now: LinkTime) -> bool {
        let timer = &mut self.timers[id.index()];
        if timer.active && now >= timer.expires_at {
            timer.active = false;
            return true;
        }
        false
    }

    /// Earliest expiry among running timers.
    pub fn next_expiry(&self) -> Option<LinkTime> {
        self.timers
            .iter()
            .filter(|t| t.active)
            .map(|t| t.expires_at)
            .min()
    }
}
