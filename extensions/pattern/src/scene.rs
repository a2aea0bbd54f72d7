// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The shared scene behind a device's input streams.
//!
//! Several input streams (one per layer) front one scene; the first
//! registered stream still alive drives the scene's time each tick, the
//! others only read results. All renders go through the scene's one
//! timeline fence, so counters order every layer's output against host
//! usage.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bridgelib::core::{
    FenceTimeline, RenderResult, SoftwareFence, StreamGroup, SyncDesc, TimelineFence,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct SceneTime {
    pub time: f64,
    pub elapsed: f64,
    pub frame_index: u64,
}

pub struct Scene {
    layer_names: Vec<String>,
    group: StreamGroup,
    next_member: AtomicU64,
    fence: Arc<SoftwareFence>,
    timeline: Mutex<FenceTimeline>,
    time: Mutex<SceneTime>,
}

impl Scene {
    pub fn new(layer_names: Vec<String>) -> Arc<Self> {
        let fence = SoftwareFence::create();
        let timeline = FenceTimeline::new(fence.share_handle());
        Arc::new(Self {
            layer_names: if layer_names.is_empty() {
                vec!["Layer 1".to_string()]
            } else {
                layer_names
            },
            group: StreamGroup::new(),
            next_member: AtomicU64::new(1),
            fence,
            timeline: Mutex::new(timeline),
            time: Mutex::new(SceneTime::default()),
        })
    }

    pub fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    pub fn register(&self) -> u64 {
        let member = self.next_member.fetch_add(1, Ordering::Relaxed);
        self.group.register(member);
        member
    }

    pub fn deregister(&self, member: u64) {
        self.group.deregister(member);
    }

    /// Whether `member` drives time and property updates this tick.
    pub fn is_driver(&self, member: u64) -> bool {
        self.group.is_first(member)
    }

    pub fn set_time(&self, time: f64, elapsed: f64) {
        let mut state = self.time.lock();
        state.time = time;
        state.elapsed = elapsed;
        state.frame_index += 1;
    }

    pub fn time(&self) -> SceneTime {
        *self.time.lock()
    }

    pub fn sync_desc(&self) -> SyncDesc {
        self.timeline.lock().sync_desc()
    }

    pub fn fence_value(&self) -> u64 {
        self.timeline.lock().value()
    }

    /// Render one layer under the scene's fence discipline.
    ///
    /// Waits for the host's usage-done signal, runs `paint`, and only on
    /// success signals frame-ready and advances the timeline — a failed
    /// paint leaves the fence exactly where it was.
    pub fn render(&self, paint: impl FnOnce(SceneTime) -> bool) -> RenderResult {
        let ticket = self.timeline.lock().begin_render();
        self.fence.wait(ticket.wait_value);

        if !paint(self.time()) {
            return RenderResult::Failed;
        }

        self.fence.signal(ticket.signal_value);
        self.timeline.lock().commit(ticket);
        RenderResult::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registered_member_drives() {
        let scene = Scene::new(vec![]);
        let first = scene.register();
        let second = scene.register();
        assert!(scene.is_driver(first));
        assert!(!scene.is_driver(second));
        scene.deregister(first);
        assert!(scene.is_driver(second));
    }

    #[test]
    fn test_render_advances_timeline_by_two() {
        let scene = Scene::new(vec![]);
        let fence = SoftwareFence::lookup(&scene.sync_desc().share_handle).unwrap();
        // host releases the surface ahead of the render
        fence.signal(1);
        let result = scene.render(|_| true);
        assert_eq!(result, RenderResult::Succeeded);
        assert_eq!(scene.fence_value(), 2);
        assert_eq!(fence.completed_value(), 2);
    }

    #[test]
    fn test_failed_paint_leaves_fence_untouched() {
        let scene = Scene::new(vec![]);
        let fence = SoftwareFence::lookup(&scene.sync_desc().share_handle).unwrap();
        fence.signal(1);
        assert_eq!(scene.render(|_| false), RenderResult::Failed);
        assert_eq!(scene.fence_value(), 0);
        assert_eq!(fence.completed_value(), 1);

        // the next successful render resumes from the same counter values
        assert_eq!(scene.render(|_| true), RenderResult::Succeeded);
        assert_eq!(scene.fence_value(), 2);
    }

    #[test]
    fn test_set_time_counts_frames() {
        let scene = Scene::new(vec!["Front".to_string(), "Back".to_string()]);
        scene.set_time(0.5, 0.016);
        scene.set_time(0.532, 0.032);
        let time = scene.time();
        assert_eq!(time.frame_index, 2);
        assert_eq!(time.time, 0.532);
        assert_eq!(scene.layer_names().len(), 2);
    }
}
