use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Timer<T> {
    due: Duration,
    seq: u64,
    task: T,
}

/// Deferred tasks keyed by virtual due time. Stands in for `setTimeout`:
/// owners schedule typed tasks and drain the ones that came due each frame,
/// in due order with ties broken by scheduling order.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    pending: VecDeque<Timer<T>>,
    next_seq: u64,
    fired: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        TimerQueue {
            pending: VecDeque::new(),
            next_seq: 0,
            fired: 0,
        }
    }

    pub fn schedule(&mut self, due: Duration, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let index = self
            .pending
            .partition_point(|timer| (timer.due, timer.seq) <= (due, seq));
        self.pending.insert(index, Timer { due, seq, task });
    }

    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let mut due = Vec::new();
        while self
            .pending
            .front()
            .map(|timer| timer.due <= now)
            .unwrap_or(false)
        {
            if let Some(timer) = self.pending.pop_front() {
                due.push(timer.task);
            }
        }
        self.fired += due.len() as u64;
        due
    }

    /// Drops every pending task matching `predicate`; returns how many were
    /// removed.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.pending.len();
        self.pending.retain(|timer| !predicate(&timer.task));
        before - self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.pending.front().map(|timer| timer.due)
    }

    pub fn contains<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.pending.iter().any(|timer| predicate(&timer.task))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }
}
