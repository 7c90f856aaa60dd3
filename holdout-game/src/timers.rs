//! Delayed callbacks owned by the scheduler.
//!
//! Timers are plain data: the owner advances the registry with the tick's
//! delta and acts on the payloads that came due. Cancelling the whole registry
//! on teardown guarantees nothing fires into a session that no longer exists.
use serde::{Deserialize, Serialize};

/// Handle returned by [`TimerRegistry::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct PendingTimer<T> {
    id: TimerId,
    remaining: f32,
    payload: T,
}

/// Countdown timers carrying a payload of type `T`.
#[derive(Debug, Clone)]
pub struct TimerRegistry<T> {
    next_id: u64,
    pending: Vec<PendingTimer<T>>,
}

impl<T> TimerRegistry<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Queue `payload` to fire after `delay` seconds of advanced time.
    pub fn schedule(&mut self, delay: f32, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let remaining = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.pending.push(PendingTimer {
            id,
            remaining,
            payload,
        });
        id
    }

    /// Drop one pending timer. Returns `false` when it already fired.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|timer| timer.id != id);
        self.pending.len() != before
    }

    /// Drop every pending timer, returning how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    /// Count `dt` seconds down and return the payloads that came due,
    /// earliest deadline first.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        if !dt.is_finite() || dt < 0.0 {
            return Vec::new();
        }
        let mut due = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for mut timer in self.pending.drain(..) {
            timer.remaining -= dt;
            if timer.remaining <= 0.0 {
                due.push(timer);
            } else {
                waiting.push(timer);
            }
        }
        self.pending = waiting;
        due.sort_by(|a, b| {
            a.remaining
                .total_cmp(&b.remaining)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        due.into_iter().map(|timer| timer.payload).collect()
    }

    /// Seconds left on a pending timer.
    #[must_use]
    pub fn remaining(&self, id: TimerId) -> Option<f32> {
        self.pending
            .iter()
            .find(|timer| timer.id == id)
            .map(|timer| timer.remaining)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for TimerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_after_their_delay() {
        let mut timers = TimerRegistry::new();
        timers.schedule(1.0, "dismiss");
        assert!(timers.advance(0.6).is_empty());
        assert_eq!(timers.advance(0.6), vec!["dismiss"]);
        assert!(timers.is_empty());
    }

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let mut timers = TimerRegistry::new();
        timers.schedule(0.5, 2);
        timers.schedule(0.2, 1);
        timers.schedule(0.5, 3);
        assert_eq!(timers.advance(1.0), vec![1, 2, 3]);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = TimerRegistry::new();
        let first = timers.schedule(1.0, 'a');
        timers.schedule(1.0, 'b');
        assert!(timers.cancel(first));
        assert!(!timers.cancel(first));
        assert_eq!(timers.advance(2.0), vec!['b']);

        timers.schedule(1.0, 'c');
        timers.schedule(3.0, 'd');
        assert_eq!(timers.cancel_all(), 2);
        assert!(timers.advance(10.0).is_empty());
    }

    #[test]
    fn remaining_tracks_countdown() {
        let mut timers = TimerRegistry::new();
        let id = timers.schedule(2.0, ());
        let _ = timers.advance(0.5);
        let left = timers.remaining(id).unwrap_or_default();
        assert!((left - 1.5).abs() < 1e-6);
        assert!(timers.advance(f32::NAN).is_empty());
        assert_eq!(timers.len(), 1);
    }
}
