// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Memory output stream: the host renders into pooled targets, present
//! downloads the front target and records the delivered frame.

use std::sync::Arc;
use std::time::Duration;

use bridgelib::core::error::Result;
use bridgelib::core::{CancellationToken, DownloadedBuffer, MemoryTargetPool, OnComplete};
use bridgelib::prelude::*;
use parking_lot::Mutex;

use crate::directory;

const DEFAULT_CONSUMER_POLL_MS: u64 = 1000;

#[derive(Default)]
struct Delivered {
    frames: u64,
    bytes: u64,
}

pub struct MemoryOutput {
    handle: String,
    frame_rate: f64,
    detect_consumers: bool,
    consumer_poll: Duration,
    pool: Arc<MemoryTargetPool>,
    delivered: Arc<Mutex<Delivered>>,
    audio_frames: u64,
    host: Option<HostContext>,
    token: CancellationToken,
}

impl MemoryOutput {
    pub fn new(settings: ValueSet) -> Self {
        let desc = TextureDesc {
            width: settings.get(setting_names::RESOLUTION_X, 1920u32),
            height: settings.get(setting_names::RESOLUTION_Y, 1080u32),
            format: PixelFormat::by_name(
                &settings.get_str(setting_names::FORMAT),
                PixelFormat::Bgra8Unorm,
            ),
            is_target: true,
            share_handle: ShareHandle::none(),
        };
        Self {
            handle: settings.get_str(setting_names::HANDLE),
            frame_rate: settings.get(setting_names::FRAME_RATE, 60.0),
            detect_consumers: settings.get("detect_consumers", false),
            consumer_poll: Duration::from_millis(
                settings.get("consumer_poll_ms", DEFAULT_CONSUMER_POLL_MS),
            ),
            pool: MemoryTargetPool::new(desc),
            delivered: Arc::new(Mutex::new(Delivered::default())),
            audio_frames: 0,
            host: None,
            token: CancellationToken::new(),
        }
    }

    /// Self-rescheduling consumer probe; stops when the token cancels at
    /// stream teardown.
    fn detect_consumers_chain(
        host: HostContext,
        token: CancellationToken,
        pool: Arc<MemoryTargetPool>,
        handle: String,
        poll: Duration,
    ) {
        pool.set_video_requested(directory::has_consumer(&handle));

        let rearm_host = host.clone();
        let rearm_token = token.clone();
        host.set_timeout(
            poll,
            &token,
            Box::new(move || {
                Self::detect_consumers_chain(rearm_host, rearm_token, pool, handle, poll);
            }),
        );
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl OutputStream for MemoryOutput {
    fn initialize(&mut self, host: HostContext) -> Result<()> {
        self.host = Some(host.clone());
        if self.detect_consumers {
            Self::detect_consumers_chain(
                host,
                self.token.clone(),
                Arc::clone(&self.pool),
                self.handle.clone(),
                self.consumer_poll,
            );
        }
        Ok(())
    }

    fn state(&mut self) -> ValueSet {
        let desc = self.pool.desc();
        let mut state = ValueSet::new();
        state.set(state_names::RESOLUTION_X, desc.width);
        state.set(state_names::RESOLUTION_Y, desc.height);
        state.set(state_names::FORMAT, desc.format.name());
        state.set(state_names::FRAME_RATE, self.frame_rate);
        state.set(state_names::SCALE_Y, -1);
        let delivered = self.delivered.lock();
        state.set("frames_delivered", delivered.frames);
        state.set("bytes_delivered", delivered.bytes);
        drop(delivered);
        state.set("audio_frames", self.audio_frames);
        state
    }

    fn send_audio_frame(&mut self, _frame: AudioFrame, on_complete: OnComplete) {
        self.audio_frames += 1;
        on_complete();
    }

    fn target(&mut self) -> Option<TextureRef> {
        let host = self.host.as_ref()?;
        self.pool.acquire_target(host)
    }

    fn present(&mut self) {
        let Some(host) = &self.host else { return };
        let delivered = Arc::clone(&self.delivered);
        self.pool.present(host, move |buffer: DownloadedBuffer| {
            let mut delivered = delivered.lock();
            delivered.frames += 1;
            delivered.bytes += buffer.data.len() as u64;
        });
    }

    fn swap(&mut self) {
        // targets recycle when their download completes; nothing to rotate
    }
}
