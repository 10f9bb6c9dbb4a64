//! A thread-safe, priority-ordered queue shared between a single producer
//! (the connection that receives assignments) and a single consumer (the
//! thread that processes them).
//!
//! Ordering: highest `priority()` first; among equal priorities, earliest
//! insertion first (FIFO tiebreak). A single `Mutex` guards the whole
//! structure -- there is no separate "is someone mutating this" flag, since
//! holding the lock already answers that question.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Anything that can sit in a `PriorityQueue` must expose a priority (for
/// ordering) and a size hint (for `sum_size` bookkeeping). Keeping this as a
/// trait means the queue itself knows nothing about files.
pub trait HasPriority {
    fn priority(&self) -> i64;
    fn size_hint(&self) -> u64;
}

struct Inner<T> {
    items: VecDeque<T>,
    sum_size: u64,
}

/// A priority queue safe to share behind an `Arc` between threads.
pub struct PriorityQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
}

impl<T: HasPriority> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HasPriority> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                sum_size: 0,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Insert `item`, placing it immediately before the first existing
    /// element whose priority is strictly lower. Equal priorities land
    /// behind all earlier equals, so ties are FIFO.
    pub fn enqueue(&self, item: T) {
        let mut guard = self.inner.lock().expect("priority queue mutex poisoned");
        let priority = item.priority();
        let pos = guard
            .items
            .iter()
            .position(|existing| existing.priority() < priority)
            .unwrap_or(guard.items.len());
        guard.sum_size += item.size_hint();
        guard.items.insert(pos, item);
        drop(guard);
        self.not_empty.notify_one();
    }

    /// Remove and return the head of the queue. Never blocks.
    pub fn dequeue(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("priority queue mutex poisoned");
        self.pop_front(&mut guard)
    }

    /// Remove and return the head of the queue, waiting up to `timeout` for
    /// an item to become available if the queue is currently empty.
    pub fn dequeue_blocking(&self, timeout: Duration) -> Option<T> {
        let mut guard = self.inner.lock().expect("priority queue mutex poisoned");
        let deadline = Instant::now() + timeout;
        while guard.items.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (g, timeout_result) = self
                .not_empty
                .wait_timeout(guard, deadline - now)
                .expect("priority queue condvar poisoned");
            guard = g;
            if timeout_result.timed_out() && guard.items.is_empty() {
                return None;
            }
        }
        self.pop_front(&mut guard)
    }

    fn pop_front(&self, guard: &mut Inner<T>) -> Option<T> {
        let item = guard.items.pop_front()?;
        guard.sum_size = guard.sum_size.saturating_sub(item.size_hint());
        Some(item)
    }

    /// Number of live elements currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("priority queue mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of `size_hint()` over every live element.
    pub fn sum_size(&self) -> u64 {
        self.inner.lock().expect("priority queue mutex poisoned").sum_size
    }

    /// Empty the queue, returning everything that was left. Used at
    /// shutdown so the caller can log how much work, if any, was discarded.
    pub fn drain_all(&self) -> Vec<T> {
        let mut guard = self.inner.lock().expect("priority queue mutex poisoned");
        guard.sum_size = 0;
        guard.items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        label: &'static str,
        priority: i64,
        size: u64,
    }

    impl HasPriority for Item {
        fn priority(&self) -> i64 {
            self.priority
        }
        fn size_hint(&self) -> u64 {
            self.size
        }
    }

    fn item(label: &'static str, priority: i64, size: u64) -> Item {
        Item { label, priority, size }
    }

    #[test]
    fn dequeue_on_empty_queue_returns_none() {
        let q: PriorityQueue<Item> = PriorityQueue::new();
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn single_item_round_trips() {
        let q = PriorityQueue::new();
        q.enqueue(item("a", 1, 10));
        assert_eq!(q.dequeue(), Some(item("a", 1, 10)));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn dequeues_highest_priority_first() {
        let q = PriorityQueue::new();
        q.enqueue(item("low", 1, 0));
        q.enqueue(item("high", 5, 0));
        q.enqueue(item("mid", 3, 0));
        assert_eq!(q.dequeue().unwrap().label, "high");
        assert_eq!(q.dequeue().unwrap().label, "mid");
        assert_eq!(q.dequeue().unwrap().label, "low");
    }

    #[test]
    fn equal_priority_is_fifo() {
        let q = PriorityQueue::new();
        q.enqueue(item("first", 1, 0));
        q.enqueue(item("second", 1, 0));
        q.enqueue(item("third", 1, 0));
        assert_eq!(q.dequeue().unwrap().label, "first");
        assert_eq!(q.dequeue().unwrap().label, "second");
        assert_eq!(q.dequeue().unwrap().label, "third");
    }

    #[test]
    fn len_and_sum_size_track_live_elements() {
        let q = PriorityQueue::new();
        q.enqueue(item("a", 1, 10));
        q.enqueue(item("b", 2, 20));
        assert_eq!(q.len(), 2);
        assert_eq!(q.sum_size(), 30);
        q.dequeue();
        assert_eq!(q.len(), 1);
        assert_eq!(q.sum_size(), 20);
    }

    #[test]
    fn drain_all_empties_queue_and_returns_residue() {
        let q = PriorityQueue::new();
        q.enqueue(item("a", 1, 5));
        q.enqueue(item("b", 2, 5));
        let residue = q.drain_all();
        assert_eq!(residue.len(), 2);
        assert_eq!(q.len(), 0);
        assert_eq!(q.sum_size(), 0);
    }

    #[test]
    fn dequeue_blocking_times_out_on_empty_queue() {
        let q: PriorityQueue<Item> = PriorityQueue::new();
        let start = Instant::now();
        assert_eq!(q.dequeue_blocking(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn dequeue_blocking_wakes_on_enqueue_from_another_thread() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(PriorityQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.dequeue_blocking(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(50));
        q.enqueue(item("late", 1, 0));

        let result = handle.join().unwrap();
        assert_eq!(result.unwrap().label, "late");
    }
}
