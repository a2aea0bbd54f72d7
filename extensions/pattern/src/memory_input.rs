// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Memory-fed input stream: CPU frames in, textures out.
//!
//! Frames queued for this stream's source in the directory are unpacked
//! through the host into textures; `update()` promotes the oldest one into
//! the `sampler` TextureSet parameter. No cross-context synchronization is
//! needed, so the render triad stays at `SyncStrategy::None`.

use std::sync::Arc;

use bridgelib::core::MemoryVideoQueue;
use bridgelib::core::error::Result;
use bridgelib::prelude::*;

use crate::directory;

pub struct MemoryFrameInput {
    handle: String,
    parameters: ParameterSet,
    queue: Arc<MemoryVideoQueue>,
    host: Option<HostContext>,
    video_requested: bool,
    width: u32,
    height: u32,
    pixel_format: String,
}

impl MemoryFrameInput {
    pub fn new(settings: ValueSet) -> Self {
        let mut parameters = ParameterSet::new();
        let sampler =
            parameters.add_output_parameter(ParameterType::TextureSet, parameter_names::SAMPLER);
        Self {
            handle: settings.get_str(setting_names::HANDLE),
            parameters,
            queue: MemoryVideoQueue::new(sampler),
            host: None,
            video_requested: false,
            width: 0,
            height: 0,
            pixel_format: String::new(),
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.queued()
    }
}

impl InputStream for MemoryFrameInput {
    fn initialize(&mut self, host: HostContext) -> Result<()> {
        self.host = Some(host);
        Ok(())
    }

    fn update_settings(&mut self, _settings: ValueSet) -> bool {
        // nothing renegotiable; the source dictates the mode
        false
    }

    fn state(&mut self) -> ValueSet {
        let mut state = ValueSet::new();
        state.set(state_names::RESOLUTION_X, self.width);
        state.set(state_names::RESOLUTION_Y, self.height);
        state.set(state_names::PIXEL_FORMAT, self.pixel_format.clone());
        state
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn set_video_requested(&mut self, requested: bool) {
        self.video_requested = requested;
    }

    fn update(&mut self) -> bool {
        if self.video_requested {
            if let Some(host) = self.host.clone() {
                let mut mode_changed = false;
                while let Some(frame) = directory::pop_frame(&self.handle) {
                    if frame.width != self.width || frame.height != self.height {
                        self.width = frame.width;
                        self.height = frame.height;
                        self.pixel_format = frame.pixel_format.clone();
                        mode_changed = true;
                    }
                    self.queue.on_video_frame(&host, frame, Box::new(|| {}));
                }
                if mode_changed {
                    host.event(EventCategory::StreamsChanged);
                }
            }
        }
        self.queue.promote();
        true
    }
}
