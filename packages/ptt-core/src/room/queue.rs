//! Ordered list of speaker candidates; head is the current/next speaker.

use std::time::Instant;

/// Direction for a pairwise [`SendQueue::swap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    Up,
    Down,
}

/// Ordered queue of speaker candidates, identified by an opaque handle `T`.
///
/// `T` is typically a [`super::connection::ConnectionId`] - the queue itself
/// holds no per-client metadata (priority, join time, manual order); sort
/// operations accept accessor closures so the queue stays decoupled from
/// [`super::client::ClientEntry`].
#[derive(Debug, Default)]
pub struct SendQueue<T> {
    entries: Vec<T>,
}

impl<T: Copy + Eq> SendQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends `item` if absent. Idempotent.
    pub fn register(&mut self, item: T) {
        if !self.entries.contains(&item) {
            self.entries.push(item);
        }
    }

    /// Removes `item`. If it was head and another member remains, returns
    /// the new head as a hint to grant it CTS. Removing a non-member is a
    /// no-op returning `None`.
    pub fn remove(&mut self, item: T) -> Option<T> {
        let Some(index) = self.entries.iter().position(|e| *e == item) else {
            return None;
        };
        let was_head = index == 0;
        self.entries.remove(index);
        if was_head {
            self.entries.first().copied()
        } else {
            None
        }
    }

    /// True iff `item` is head.
    #[must_use]
    pub fn has_priority(&self, item: T) -> bool {
        self.entries.first() == Some(&item)
    }

    /// Returns the head, if any.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.entries.first().copied()
    }

    /// Removes any existing occurrence of `item`, then inserts it at head.
    pub fn prepend(&mut self, item: T) {
        self.entries.retain(|e| *e != item);
        self.entries.insert(0, item);
    }

    /// Snapshot copy of the queue order.
    #[must_use]
    pub fn get_all(&self) -> Vec<T> {
        self.entries.clone()
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the queue holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Swaps `item` with its neighbor in `direction`. Refuses (returns
    /// `false`) if `item` is absent or already at the boundary.
    pub fn swap(&mut self, item: T, direction: SwapDirection) -> bool {
        let Some(index) = self.entries.iter().position(|e| *e == item) else {
            return false;
        };
        let other = match direction {
            SwapDirection::Up if index > 0 => index - 1,
            SwapDirection::Down if index + 1 < self.entries.len() => index + 1,
            _ => return false,
        };
        self.entries.swap(index, other);
        true
    }

    /// Repositions `item` to `index`, preserving the relative order of
    /// others. Refuses if `item` is absent or `index` is out of range.
    pub fn move_to_position(&mut self, item: T, index: usize) -> bool {
        let Some(current) = self.entries.iter().position(|e| *e == item) else {
            return false;
        };
        if index >= self.entries.len() {
            return false;
        }
        if current == index {
            return false;
        }
        let item = self.entries.remove(current);
        self.entries.insert(index, item);
        true
    }

    /// Stable sort by `(-priority, manualOrder ?? +inf, joinTime)`. If
    /// `exclude_head` names a member currently in the queue, it is pinned at
    /// index 0 and the remainder is sorted around it.
    pub fn sort_by_priority<P, J, M>(
        &mut self,
        priority_of: P,
        join_time_of: J,
        manual_order_of: M,
        exclude_head: Option<T>,
    ) where
        P: Fn(T) -> u8,
        J: Fn(T) -> Instant,
        M: Fn(T) -> Option<u32>,
    {
        let pinned = exclude_head.filter(|h| self.entries.contains(h));
        let mut rest: Vec<T> = self
            .entries
            .iter()
            .copied()
            .filter(|e| Some(*e) != pinned)
            .collect();
        rest.sort_by_key(|&e| {
            (
                std::cmp::Reverse(priority_of(e)),
                manual_order_of(e).unwrap_or(u32::MAX),
                join_time_of(e),
            )
        });
        self.entries = pinned.into_iter().chain(rest).collect();
    }

    /// Stable sort by `(manualOrder present? 0 : 1, manualOrder ?? +inf,
    /// joinTime)` - clients with an explicit manual order precede those
    /// without, preserving hand-crafted order across mode toggles.
    pub fn sort_by_fifo<J, M>(&mut self, join_time_of: J, manual_order_of: M, exclude_head: Option<T>)
    where
        J: Fn(T) -> Instant,
        M: Fn(T) -> Option<u32>,
    {
        let pinned = exclude_head.filter(|h| self.entries.contains(h));
        let mut rest: Vec<T> = self
            .entries
            .iter()
            .copied()
            .filter(|e| Some(*e) != pinned)
            .collect();
        rest.sort_by_key(|&e| {
            let manual = manual_order_of(e);
            (
                if manual.is_some() { 0u8 } else { 1u8 },
                manual.unwrap_or(u32::MAX),
                join_time_of(e),
            )
        });
        self.entries = pinned.into_iter().chain(rest).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn t(n: u64) -> Instant {
        // Deterministic ordering without depending on wall-clock timing.
        Instant::now() + Duration::from_secs(n)
    }

    #[test]
    fn register_is_idempotent() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(1);
        assert_eq!(q.get_all(), vec![1]);
    }

    #[test]
    fn remove_head_returns_new_head() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        assert_eq!(q.remove(1), Some(2));
        assert_eq!(q.remove(99), None);
    }

    #[test]
    fn remove_non_head_returns_none() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        assert_eq!(q.remove(2), None);
        assert_eq!(q.get_all(), vec![1]);
    }

    #[test]
    fn prepend_restores_head_priority() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        q.prepend(2);
        assert_eq!(q.get_all(), vec![2, 1]);
    }

    #[test]
    fn swap_refuses_at_boundary() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        assert!(!q.swap(1, SwapDirection::Up));
        assert!(q.swap(1, SwapDirection::Down));
        assert_eq!(q.get_all(), vec![2, 1]);
    }

    #[test]
    fn move_to_position_is_noop_at_current_index() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        q.register(3);
        assert!(!q.move_to_position(2, 1));
        assert_eq!(q.get_all(), vec![1, 2, 3]);
    }

    #[test]
    fn move_to_position_preserves_others_order() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        q.register(3);
        assert!(q.move_to_position(3, 0));
        assert_eq!(q.get_all(), vec![3, 1, 2]);
    }

    #[test]
    fn sort_by_fifo_is_idempotent() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        q.register(3);
        let join_time = |id: u32| t(id as u64);
        let manual = |_: u32| None;
        q.sort_by_fifo(join_time, manual, None);
        let first = q.get_all();
        q.sort_by_fifo(join_time, manual, None);
        assert_eq!(q.get_all(), first);
    }

    #[test]
    fn sort_by_priority_pins_excluded_head() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1); // low priority, current speaker
        q.register(2); // high priority
        let priority = |id: u32| if id == 2 { 3 } else { 0 };
        let join_time = |id: u32| t(id as u64);
        let manual = |_: u32| None;
        q.sort_by_priority(priority, join_time, manual, Some(1));
        assert_eq!(q.get_all(), vec![1, 2]);
    }

    #[test]
    fn sort_by_priority_orders_by_priority_then_join_time() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1); // priority 0, joins first
        q.register(2); // priority 0, joins second
        q.register(3); // priority 3
        let priority = |id: u32| if id == 3 { 3 } else { 0 };
        let join_time = |id: u32| t(id as u64);
        let manual = |_: u32| None;
        q.sort_by_priority(priority, join_time, manual, None);
        assert_eq!(q.get_all(), vec![3, 1, 2]);
    }

    #[test]
    fn sort_by_fifo_prefers_manual_order_over_join_time() {
        let mut q: SendQueue<u32> = SendQueue::new();
        q.register(1);
        q.register(2);
        q.register(3);
        let join_time = |id: u32| t(id as u64);
        // carol (3) was manually promoted to the front twice.
        let manual = |id: u32| match id {
            3 => Some(0),
            1 => Some(1),
            2 => Some(2),
            _ => None,
        };
        q.sort_by_fifo(join_time, manual, None);
        assert_eq!(q.get_all(), vec![3, 1, 2]);
    }
}
