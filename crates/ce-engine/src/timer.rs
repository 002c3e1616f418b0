//! Cancellable one-shot timers on the sample clock.
//!
//! Timers are kept sorted by due frame. Each has a slotmap key the owner
//! holds on to; cancelling by key removes the timer synchronously, so a
//! cancelled timer can never fire.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a pending timer.
    pub struct TimerKey;
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    due: u64,
    seq: u64,
    key: TimerKey,
}

/// A priority queue of timers sorted by due frame, FIFO among equals.
#[derive(Debug)]
pub struct TimerQueue<T> {
    targets: SlotMap<TimerKey, T>,
    order: Vec<Pending>,
    next_seq: u64,
}

impl<T: Copy> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            targets: SlotMap::with_key(),
            order: Vec::new(),
            next_seq: 0,
        }
    }

    /// Schedule `target` to fire once the clock reaches `due`.
    pub fn schedule(&mut self, due: u64, target: T) -> TimerKey {
        let key = self.targets.insert(target);
        let seq = self.next_seq;
        self.next_seq += 1;
        let pos = self
            .order
            .partition_point(|p| (p.due, p.seq) < (due, seq));
        self.order.insert(pos, Pending { due, seq, key });
        key
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        if self.targets.remove(key).is_none() {
            return false;
        }
        self.order.retain(|p| p.key != key);
        true
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(TimerKey, T)> {
        let first = *self.order.first()?;
        if first.due > now {
            return None;
        }
        self.order.remove(0);
        let target = self.targets.remove(first.key)?;
        Some((first.key, target))
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.targets.contains_key(key)
    }

    /// Due frame of a pending timer.
    pub fn due(&self, key: TimerKey) -> Option<u64> {
        self.order.iter().find(|p| p.key == key).map(|p| p.due)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.order.first().map(|p| p.due)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.targets.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_due_order() {
        let mut q = TimerQueue::new();
        q.schedule(300, 'c');
        q.schedule(100, 'a');
        q.schedule(200, 'b');

        assert_eq!(q.pop_due(1000).map(|(_, t)| t), Some('a'));
        assert_eq!(q.pop_due(1000).map(|(_, t)| t), Some('b'));
        assert_eq!(q.pop_due(1000).map(|(_, t)| t), Some('c'));
        assert!(q.pop_due(1000).is_none());
    }

    #[test]
    fn equal_due_is_fifo() {
        let mut q = TimerQueue::new();
        q.schedule(50, 1);
        q.schedule(50, 2);
        q.schedule(50, 3);
        let fired: Vec<_> = std::iter::from_fn(|| q.pop_due(50).map(|(_, t)| t)).collect();
        assert_eq!(fired, vec![1, 2, 3]);
    }

    #[test]
    fn nothing_fires_early() {
        let mut q = TimerQueue::new();
        q.schedule(128, ());
        assert!(q.pop_due(127).is_none());
        assert!(q.pop_due(128).is_some());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut q = TimerQueue::new();
        let k = q.schedule(10, "beat");
        q.schedule(20, "other");
        assert!(q.cancel(k));
        assert!(!q.is_pending(k));
        assert_eq!(q.pop_due(100).map(|(_, t)| t), Some("other"));
        assert!(q.pop_due(100).is_none());
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut q = TimerQueue::new();
        let k = q.schedule(0, 7u8);
        assert!(q.pop_due(0).is_some());
        assert!(!q.cancel(k));
        assert!(q.is_empty());
    }

    #[test]
    fn due_reports_schedule() {
        let mut q = TimerQueue::new();
        let k = q.schedule(4410, 0);
        assert_eq!(q.due(k), Some(4410));
        assert_eq!(q.next_due(), Some(4410));
        q.clear();
        assert_eq!(q.len(), 0);
        assert_eq!(q.due(k), None);
    }
}
