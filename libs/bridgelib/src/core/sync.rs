// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Cross-context frame synchronization.
//!
//! A producer and a consumer GPU context never call into each other;
//! ordering is carried entirely by a shareable fence object and a
//! monotonically increasing counter. Every wait or signal issued against a
//! fence uses a fresh counter value, so a consumer that waits for value `N`
//! observes everything the producer did up to and including its `N`-th
//! signal and never observes partial work from signal `N + 1`.
//!
//! Per frame, a stream's render performs `wait(counter + 1)` (the host's
//! usage-done signal) followed by `signal(counter + 2)` (frame ready), so a
//! successful render advances the counter by exactly two and a failed one
//! by zero — leaving a downstream consumer waiting instead of consuming a
//! stale frame.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::{Condvar, Mutex};

use super::texture::{ShareHandle, ShareHandleKind};

/// How a phase's handoff is synchronized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SyncStrategy {
    /// No cross-context synchronization needed (pure CPU data or
    /// same-context reuse).
    #[default]
    None = 0,
    /// One-shot producer/consumer handoff, for API generations without
    /// timeline semaphores.
    BinarySemaphore = 1,
    /// General case; preferred whenever available.
    TimelineSemaphore = 2,
}

/// Handoff descriptor returned by `before_render`/`after_render`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct SyncDesc {
    pub strategy: SyncStrategy,
    pub share_handle: ShareHandle,
    /// Timeline counter value this phase expects to be signaled to or
    /// waited from. Unused for the other strategies.
    pub value: u64,
}

impl SyncDesc {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Counter values reserved for one render: the wait the render issues
/// before touching the shared surface and the signal it issues after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    pub wait_value: u64,
    pub signal_value: u64,
}

/// The monotone counter side of a shareable timeline fence.
///
/// Owned by the component that owns the fence object. Counter values are
/// reserved speculatively with [`begin_render`](Self::begin_render) and only
/// become visible in [`sync_desc`](Self::sync_desc) once
/// [`commit`](Self::commit) records a successful render, so a failed render
/// leaves the timeline exactly where it was.
#[derive(Debug)]
pub struct FenceTimeline {
    share_handle: ShareHandle,
    counter: u64,
}

impl FenceTimeline {
    pub fn new(share_handle: ShareHandle) -> Self {
        Self {
            share_handle,
            counter: 0,
        }
    }

    pub fn value(&self) -> u64 {
        self.counter
    }

    /// Descriptor for the current phase boundary.
    pub fn sync_desc(&self) -> SyncDesc {
        SyncDesc {
            strategy: SyncStrategy::TimelineSemaphore,
            share_handle: self.share_handle,
            value: self.counter,
        }
    }

    /// Reserve the wait/signal pair for one render.
    pub fn begin_render(&self) -> RenderTicket {
        RenderTicket {
            wait_value: self.counter + 1,
            signal_value: self.counter + 2,
        }
    }

    /// Record a completed render. Counters strictly increase and are never
    /// reused for the lifetime of the fence.
    pub fn commit(&mut self, ticket: RenderTicket) {
        debug_assert_eq!(ticket.wait_value, self.counter + 1);
        self.counter = ticket.signal_value;
    }
}

/// The seam to a concrete shareable fence/semaphore object.
///
/// The backing GPU classes are external collaborators; they only need to
/// expose an OS share handle and honor the counter protocol.
pub trait TimelineFence: Send + Sync {
    fn share_handle(&self) -> ShareHandle;

    /// Block the caller's execution context until the fence reached `value`.
    ///
    /// On a GPU queue this orders GPU work without blocking the CPU. The
    /// protocol has no timeout or cancellation for this wait: a
    /// non-responding producer stalls the consumer indefinitely. That is a
    /// known risk of the contract, not a feature.
    fn wait(&self, value: u64);

    /// Advance the fence to at least `value`.
    fn signal(&self, value: u64);

    /// Highest value signaled so far.
    fn completed_value(&self) -> u64;
}

/// CPU reference implementation of [`TimelineFence`].
///
/// Used by CPU-fed streams and by the test suite to validate the ordering
/// contract. Signals only move the payload forward.
pub struct SoftwareFence {
    share_handle: ShareHandle,
    completed: Mutex<u64>,
    signaled: Condvar,
}

static FENCE_REGISTRY: LazyLock<Mutex<HashMap<u64, Weak<SoftwareFence>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));
static NEXT_FENCE_HANDLE: Mutex<u64> = Mutex::new(0);

impl SoftwareFence {
    pub fn new(share_handle: ShareHandle) -> Self {
        Self {
            share_handle,
            completed: Mutex::new(0),
            signaled: Condvar::new(),
        }
    }

    /// Allocate a fence with a fresh process-local share handle and make it
    /// resolvable through that handle, the way an imported OS fence handle
    /// resolves to the underlying object.
    pub fn create() -> Arc<Self> {
        let handle_id = {
            let mut next = NEXT_FENCE_HANDLE.lock();
            *next += 1;
            *next
        };
        let fence = Arc::new(Self::new(ShareHandle {
            kind: ShareHandleKind::OpaqueFd,
            handle: handle_id,
            ..ShareHandle::default()
        }));
        let mut registry = FENCE_REGISTRY.lock();
        registry.retain(|_, weak| weak.strong_count() > 0);
        registry.insert(handle_id, Arc::downgrade(&fence));
        fence
    }

    /// Resolve a share handle produced by [`create`](Self::create).
    pub fn lookup(handle: &ShareHandle) -> Option<Arc<SoftwareFence>> {
        FENCE_REGISTRY.lock().get(&handle.handle)?.upgrade()
    }
}

impl TimelineFence for SoftwareFence {
    fn share_handle(&self) -> ShareHandle {
        self.share_handle
    }

    fn wait(&self, value: u64) {
        let mut completed = self.completed.lock();
        while *completed < value {
            self.signaled.wait(&mut completed);
        }
    }

    fn signal(&self, value: u64) {
        let mut completed = self.completed.lock();
        if value > *completed {
            *completed = value;
            self.signaled.notify_all();
        }
    }

    fn completed_value(&self) -> u64 {
        *self.completed.lock()
    }
}

/// Host-side seam for inserting GPU waits and signals around a stream's
/// rendering work, given the descriptors the stream returned.
pub trait FenceOps {
    fn wait(&mut self, sync: &SyncDesc);
    fn signal(&mut self, sync: &SyncDesc);
}

/// No-op implementation for hosts without cross-context resources.
pub struct NullFenceOps;

impl FenceOps for NullFenceOps {
    fn wait(&mut self, _sync: &SyncDesc) {}
    fn signal(&mut self, _sync: &SyncDesc) {}
}

/// [`FenceOps`] backed by [`SoftwareFence`] objects resolved through their
/// share handles. Descriptors whose handle resolves to nothing (a foreign
/// or torn-down fence) are ignored rather than stalled on.
pub struct SoftwareFenceOps;

impl FenceOps for SoftwareFenceOps {
    fn wait(&mut self, sync: &SyncDesc) {
        if sync.strategy == SyncStrategy::None {
            return;
        }
        if let Some(fence) = SoftwareFence::lookup(&sync.share_handle) {
            fence.wait(sync.value);
        }
    }

    fn signal(&mut self, sync: &SyncDesc) {
        if sync.strategy == SyncStrategy::None {
            return;
        }
        if let Some(fence) = SoftwareFence::lookup(&sync.share_handle) {
            fence.signal(sync.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::texture::ShareHandleKind;
    use std::sync::Arc;

    fn handle(id: u64) -> ShareHandle {
        ShareHandle {
            kind: ShareHandleKind::OpaqueFd,
            handle: id,
            ..ShareHandle::default()
        }
    }

    #[test]
    fn test_timeline_advances_by_two_per_commit() {
        let mut timeline = FenceTimeline::new(handle(1));
        assert_eq!(timeline.sync_desc().value, 0);

        let ticket = timeline.begin_render();
        assert_eq!(ticket.wait_value, 1);
        assert_eq!(ticket.signal_value, 2);
        timeline.commit(ticket);
        assert_eq!(timeline.sync_desc().value, 2);

        let ticket = timeline.begin_render();
        assert_eq!(ticket.wait_value, 3);
        assert_eq!(ticket.signal_value, 4);
        timeline.commit(ticket);
        assert_eq!(timeline.value(), 4);
    }

    #[test]
    fn test_failed_render_leaves_timeline_unchanged() {
        let mut timeline = FenceTimeline::new(handle(1));
        let _abandoned = timeline.begin_render();
        // render failed: ticket never committed
        assert_eq!(timeline.sync_desc().value, 0);

        // the next successful render resumes from the same values
        let ticket = timeline.begin_render();
        assert_eq!(ticket.wait_value, 1);
        timeline.commit(ticket);
        assert_eq!(timeline.value(), 2);
    }

    #[test]
    fn test_software_fence_orders_across_threads() {
        let fence = Arc::new(SoftwareFence::new(handle(2)));
        let producer = Arc::clone(&fence);
        let worker = std::thread::spawn(move || {
            producer.signal(1);
            producer.signal(2);
        });
        fence.wait(2);
        assert!(fence.completed_value() >= 2);
        worker.join().unwrap();
    }

    #[test]
    fn test_software_fence_signals_never_regress() {
        let fence = SoftwareFence::new(handle(3));
        fence.signal(5);
        fence.signal(3);
        assert_eq!(fence.completed_value(), 5);
    }

    #[test]
    fn test_created_fences_resolve_by_share_handle() {
        let fence = SoftwareFence::create();
        let resolved = SoftwareFence::lookup(&fence.share_handle()).unwrap();
        resolved.signal(3);
        assert_eq!(fence.completed_value(), 3);

        let handle = fence.share_handle();
        drop((fence, resolved));
        assert!(SoftwareFence::lookup(&handle).is_none());
    }

    #[test]
    fn test_software_fence_ops_route_by_handle() {
        let fence = SoftwareFence::create();
        let mut ops = SoftwareFenceOps;
        ops.signal(&SyncDesc {
            strategy: SyncStrategy::TimelineSemaphore,
            share_handle: fence.share_handle(),
            value: 7,
        });
        assert_eq!(fence.completed_value(), 7);

        // unknown handles are ignored, not stalled on
        ops.wait(&SyncDesc {
            strategy: SyncStrategy::TimelineSemaphore,
            share_handle: handle(999_999),
            value: 1,
        });
    }

    #[test]
    fn test_wait_observes_all_prior_signals() {
        // a consumer waiting on K sees every signal <= K before the wait
        // returns, and no effect of signals > K is required
        let fence = Arc::new(SoftwareFence::new(handle(4)));
        let producer = Arc::clone(&fence);
        let worker = std::thread::spawn(move || {
            for value in 1..=10 {
                producer.signal(value);
            }
        });
        fence.wait(7);
        assert!(fence.completed_value() >= 7);
        worker.join().unwrap();
    }
}
