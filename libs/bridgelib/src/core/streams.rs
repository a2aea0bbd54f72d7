// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scaffolding for CPU-fed streams.
//!
//! Streams whose descriptor carries no share handle move pixels through the
//! host: inputs hand CPU video frames to `unpack_video_frame` and surface
//! the resulting textures through a `sampler` parameter; outputs render
//! into host-allocated targets and read them back on present. Both sides
//! are bounded at four outstanding entries for backpressure.

use std::sync::Arc;

use parking_lot::Mutex;

use super::frames::{BoundedFrameQueue, DEFAULT_FRAME_QUEUE_CAPACITY, VideoFrame};
use super::host::{DownloadedBuffer, HostContext, OnComplete};
use super::parameter::Parameter;
use super::texture::{TextureDesc, TextureRef};

/// Bounded queue of unpacked frames feeding a `sampler` TextureSet
/// parameter.
///
/// Incoming CPU frames are unpacked into textures asynchronously; the
/// stream's `update()` promotes the oldest queued entry into the sampler.
/// Once four frames are outstanding, new ones are dropped.
pub struct MemoryVideoQueue {
    sampler: Arc<Parameter>,
    queue: Mutex<BoundedFrameQueue<Vec<TextureRef>>>,
}

impl MemoryVideoQueue {
    pub fn new(sampler: Arc<Parameter>) -> Arc<Self> {
        Arc::new(Self {
            sampler,
            queue: Mutex::new(BoundedFrameQueue::new(DEFAULT_FRAME_QUEUE_CAPACITY)),
        })
    }

    /// Queue one incoming CPU frame. `on_complete` fires once the frame's
    /// pixel data has been consumed and may be reused.
    pub fn on_video_frame(
        self: &Arc<Self>,
        host: &HostContext,
        frame: VideoFrame,
        on_complete: OnComplete,
    ) {
        let queue = Arc::clone(self);
        host.unpack_video_frame(
            frame,
            Box::new(move |textures| {
                if !textures.is_empty() {
                    // full queue: drop the new frame, keep what is queued
                    let _ = queue.queue.lock().push(textures);
                }
                on_complete();
            }),
        );
    }

    /// Promote the oldest queued frame into the sampler. Returns whether a
    /// new frame became current.
    pub fn promote(&self) -> bool {
        match self.queue.lock().pop() {
            Some(textures) => {
                self.sampler.set_textures(textures);
                true
            }
            None => false,
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Cap on lazily allocated output targets.
pub const MAX_OUTPUT_TARGETS: usize = 4;

struct TargetPoolState {
    desc: TextureDesc,
    available: Vec<TextureRef>,
    allocated: usize,
    video_requested: bool,
}

/// Pool of host-allocated render targets for a CPU-consuming output.
///
/// `acquire_target` hands out the front target (allocating up to
/// [`MAX_OUTPUT_TARGETS`]); `present` downloads it, delivers the pixels to
/// the concrete sink and recycles the target once the download completes.
pub struct MemoryTargetPool {
    state: Mutex<TargetPoolState>,
}

impl MemoryTargetPool {
    pub fn new(desc: TextureDesc) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TargetPoolState {
                desc,
                available: Vec::new(),
                allocated: 0,
                video_requested: true,
            }),
        })
    }

    pub fn desc(&self) -> TextureDesc {
        self.state.lock().desc
    }

    pub fn set_video_requested(&self, requested: bool) {
        self.state.lock().video_requested = requested;
    }

    pub fn video_requested(&self) -> bool {
        self.state.lock().video_requested
    }

    /// The target the host should render the next frame into.
    pub fn acquire_target(&self, host: &HostContext) -> Option<TextureRef> {
        let mut state = self.state.lock();
        if !state.video_requested {
            return None;
        }
        if state.available.is_empty() {
            if state.allocated >= MAX_OUTPUT_TARGETS {
                return None;
            }
            let texture = host.create_texture(&state.desc)?;
            state.available.push(texture);
            state.allocated += 1;
        }
        state.available.first().cloned()
    }

    /// Download the front target and hand its pixels to `deliver`; the
    /// target returns to the pool afterwards.
    pub fn present(
        self: &Arc<Self>,
        host: &HostContext,
        deliver: impl FnOnce(DownloadedBuffer) + Send + 'static,
    ) {
        let target = {
            let mut state = self.state.lock();
            if state.available.is_empty() {
                return;
            }
            state.available.remove(0)
        };
        let pool = Arc::clone(self);
        let recycled = target.clone();
        host.download_texture(
            target,
            Box::new(move |buffer| {
                deliver(buffer);
                pool.state.lock().available.push(recycled);
            }),
        );
    }

    pub fn outstanding(&self) -> usize {
        let state = self.state.lock();
        state.allocated - state.available.len()
    }
}
