// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Host timer service.
//!
//! Extensions schedule delayed work (source polling, consumer detection)
//! through the host instead of spinning their own timer threads. A chain of
//! callbacks that re-arm themselves forms a repeating task; cancellation is
//! tied to the owning object's teardown via a [`CancellationToken`] checked
//! before each run — pending callbacks into a destroyed object must never
//! fire.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Deferred callback.
pub type TimerJob = Box<dyn FnOnce() + Send + 'static>;

/// Cancellation flag shared between an owner and its scheduled callbacks.
///
/// Cancel it when the owning object is torn down; the timer queue drops
/// (instead of runs) any job whose token was cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct Entry {
    due: Instant,
    seq: u64,
    token: CancellationToken,
    job: TimerJob,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

struct TimerState {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    signal: Condvar,
}

/// One worker thread draining a time-ordered job heap.
pub struct TimerQueue {
    shared: Arc<TimerShared>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            signal: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("bridgelib-timer".to_string())
            .spawn(move || Self::run(worker_shared))
            .expect("spawn timer thread");
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Schedule `job` to run after `delay`, unless `token` gets cancelled
    /// first. Jobs with equal due times run in schedule order.
    pub fn schedule(&self, delay: Duration, token: &CancellationToken, job: TimerJob) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(Entry {
            due: Instant::now() + delay,
            seq,
            token: token.clone(),
            job,
        }));
        drop(state);
        self.shared.signal.notify_one();
    }

    fn run(shared: Arc<TimerShared>) {
        let mut state = shared.state.lock();
        loop {
            if state.shutdown {
                return;
            }
            let now = Instant::now();
            match state.heap.peek() {
                None => {
                    shared.signal.wait(&mut state);
                }
                Some(Reverse(entry)) if entry.due > now => {
                    let due = entry.due;
                    let _ = shared.signal.wait_until(&mut state, due);
                }
                Some(_) => {
                    let Reverse(entry) = state.heap.pop().expect("peeked entry");
                    // run without holding the lock so jobs may re-arm
                    drop(state);
                    if !entry.token.is_cancelled() {
                        (entry.job)();
                    }
                    state = shared.state.lock();
                }
            }
        }
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerQueue {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.heap.clear();
        }
        self.signal_and_join();
    }
}

impl TimerQueue {
    fn signal_and_join(&mut self) {
        self.shared.signal.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_jobs_run_in_due_order() {
        let queue = TimerQueue::new();
        let token = CancellationToken::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (delay_ms, tag) in [(30u64, 3), (10, 1), (20, 2)] {
            let order = Arc::clone(&order);
            queue.schedule(
                Duration::from_millis(delay_ms),
                &token,
                Box::new(move || order.lock().push(tag)),
            );
        }
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_cancelled_jobs_do_not_run() {
        let queue = TimerQueue::new();
        let token = CancellationToken::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        queue.schedule(
            Duration::from_millis(20),
            &token,
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        token.cancel();
        std::thread::sleep(Duration::from_millis(60));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_self_rearming_chain_stops_on_cancel() {
        let queue = Arc::new(TimerQueue::new());
        let token = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));

        fn arm(queue: &Arc<TimerQueue>, token: &CancellationToken, runs: &Arc<AtomicUsize>) {
            let queue_again = Arc::clone(queue);
            let token_again = token.clone();
            let runs_again = Arc::clone(runs);
            queue.schedule(
                Duration::from_millis(5),
                token,
                Box::new(move || {
                    runs_again.fetch_add(1, Ordering::SeqCst);
                    arm(&queue_again, &token_again, &runs_again);
                }),
            );
        }

        arm(&queue, &token, &runs);
        std::thread::sleep(Duration::from_millis(60));
        token.cancel();
        let after_cancel = runs.load(Ordering::SeqCst);
        assert!(after_cancel >= 2);
        std::thread::sleep(Duration::from_millis(40));
        // at most one already-dequeued run may slip in
        assert!(runs.load(Ordering::SeqCst) <= after_cancel + 1);
    }

    #[test]
    fn test_drop_discards_pending_jobs() {
        let queue = TimerQueue::new();
        let token = CancellationToken::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        queue.schedule(
            Duration::from_millis(200),
            &token,
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        drop(queue);
        assert!(!ran.load(Ordering::SeqCst));
    }
}
