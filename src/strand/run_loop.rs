//! The run-loop strand: a single-threaded worker draining a deadline heap.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::lifetime::Lifetime;
use crate::observer::Observer;
use crate::time::{ClockHandle, Time};

use super::{Action, Rescheduler, Strand};

struct Entry {
    at: Time,
    seq: u64,
    action: Action,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse ordering for a min-heap: earliest deadline first, then
        // insertion order for ties.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct Queue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl Queue {
    fn push(&mut self, at: Time, action: Action) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { at, seq, action });
    }
}

struct RunLoopInner {
    lifetime: Lifetime,
    clock: ClockHandle,
    queue: Mutex<Queue>,
    wakeup: Condvar,
    exited: Mutex<bool>,
    exit_signal: Condvar,
}

/// A strand whose actions are drained by [`run`](RunLoop::run).
///
/// The queue mutex is released while an action executes, so re-entrant
/// `defer_at` from inside an action is permitted. When the lifetime stops,
/// the loop wakes, stops draining, and the queue is cleared without invoking
/// the remaining actions.
#[derive(Clone)]
pub struct RunLoop {
    inner: Arc<RunLoopInner>,
}

impl RunLoop {
    /// Creates a run-loop governed by `lifetime`, scheduling against `clock`.
    #[must_use]
    pub fn new(lifetime: Lifetime, clock: ClockHandle) -> Self {
        let run_loop = Self {
            inner: Arc::new(RunLoopInner {
                lifetime: lifetime.clone(),
                clock,
                queue: Mutex::new(Queue {
                    heap: BinaryHeap::new(),
                    next_seq: 0,
                }),
                wakeup: Condvar::new(),
                exited: Mutex::new(false),
                exit_signal: Condvar::new(),
            }),
        };

        // Wake the worker and drop whatever is still queued. Dropping (not
        // invoking) is what keeps the no-callbacks-after-stop invariant.
        let inner = run_loop.inner.clone();
        lifetime.on_stop(move || {
            let drained = {
                let mut queue = inner.queue.lock();
                std::mem::take(&mut queue.heap)
            };
            drop(drained);
            inner.wakeup.notify_all();
        });

        run_loop
    }

    /// Drives the loop until the lifetime stops.
    pub fn run(&self) {
        trace!(lifetime = %self.inner.lifetime.id(), "run loop entered");
        while self.wait() {
            self.step();
        }
        *self.inner.exited.lock() = true;
        self.inner.exit_signal.notify_all();
        trace!(lifetime = %self.inner.lifetime.id(), "run loop exited");
    }

    /// Blocks until an action is due or the lifetime stops.
    ///
    /// Returns false when the loop should exit.
    fn wait(&self) -> bool {
        let mut queue = self.inner.queue.lock();
        loop {
            if self.inner.lifetime.is_stopped() {
                return false;
            }
            match queue.heap.peek() {
                None => {
                    self.inner.wakeup.wait(&mut queue);
                }
                Some(top) => {
                    let now = self.inner.clock.now();
                    if top.at <= now {
                        return true;
                    }
                    let timeout = top.at.duration_since(now);
                    self.inner.wakeup.wait_for(&mut queue, timeout);
                }
            }
        }
    }

    /// Runs every due action, re-queueing self-deferred ones.
    fn step(&self) {
        let mut queue = self.inner.queue.lock();
        while !self.inner.lifetime.is_stopped() {
            let due = match queue.heap.peek() {
                Some(top) => top.at <= self.inner.clock.now(),
                None => false,
            };
            if !due {
                break;
            }
            let Some(entry) = queue.heap.pop() else { break };
            drop(queue);

            let resched = Rescheduler::new();
            entry.action.next(resched.clone());

            match resched.take() {
                Some(at) => {
                    queue = self.inner.queue.lock();
                    if self.inner.lifetime.is_stopped() {
                        return;
                    }
                    queue.push(at, entry.action);
                }
                None => {
                    entry.action.complete();
                    queue = self.inner.queue.lock();
                }
            }
        }
    }

    /// Stops the loop by stopping its lifetime.
    pub fn stop(&self) {
        self.inner.lifetime.stop();
    }

    /// Blocks until [`run`](Self::run) has returned.
    pub(crate) fn wait_for_exit(&self) {
        let mut exited = self.inner.exited.lock();
        while !*exited {
            self.inner.exit_signal.wait(&mut exited);
        }
    }

    /// Wakes the worker so it can observe a stop.
    pub(crate) fn wake(&self) {
        self.inner.wakeup.notify_all();
    }
}

impl Strand for RunLoop {
    fn now(&self) -> Time {
        self.inner.clock.now()
    }

    fn defer_at(&self, at: Time, action: Action) {
        if self.inner.lifetime.is_stopped() {
            trace!(lifetime = %self.inner.lifetime.id(), "defer_at on stopped run loop dropped");
            return;
        }
        self.inner.queue.lock().push(at, action);
        self.inner.wakeup.notify_one();
    }

    fn lifetime(&self) -> &Lifetime {
        &self.inner.lifetime
    }
}
