// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The services a host offers to extension objects.
//!
//! Every extension, device and stream receives a [`HostContext`] at
//! initialize time and keeps it for its lifetime. All host calls are
//! non-blocking or complete via callback; none of them may panic across
//! the boundary.

use std::sync::Arc;
use std::time::Duration;

use super::events::{EventCategory, EventSeverity};
use super::frames::{AudioFrame, PlaneBuf, VideoFrame};
use super::scheduling::CancellationToken;
use super::texture::{TextureDesc, TextureRef};

/// Completion callback for asynchronous host operations.
pub type OnComplete = Box<dyn FnOnce() + Send + 'static>;

/// Pixel data handed back by a texture download.
#[derive(Debug, Clone, Default)]
pub struct DownloadedBuffer {
    pub data: Vec<u8>,
    pub pitch: usize,
}

/// Callback receiving downloaded texture contents.
pub type OnTextureDownloaded = Box<dyn FnOnce(DownloadedBuffer) + Send + 'static>;

/// Callback receiving the textures a video frame was unpacked into.
pub type OnVideoFrameUnpacked = Box<dyn FnOnce(Vec<TextureRef>) + Send + 'static>;

/// Where deferred work runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum AsyncPolicy {
    #[default]
    Default = 0,
    MainThread = 1,
}

/// Host-implemented service surface.
pub trait HostServices: Send + Sync {
    /// The only channel for reporting anomalies back to the host.
    fn send_event(&self, severity: EventSeverity, category: EventCategory, message: &str);

    /// Feed a named measurement into the host's statistics display.
    fn monitor_value(&self, name: &str, value: f64, average: bool);

    /// Map an extension-relative storage filename to an absolute path.
    fn resolve_storage_filename(&self, storage_filename: &str) -> String;

    /// Map a relative path into the host's per-user data directory.
    fn userdata_path(&self, path: &str) -> String;

    /// Run `callback` after `delay`. Scheduling is fire-and-forget; owners
    /// suppress stale callbacks through the token they wrapped in.
    fn set_timeout(&self, policy: AsyncPolicy, delay: Duration, callback: OnComplete);

    /// Allocate a texture; `None` on failure. A populated share handle in
    /// `desc` imports existing GPU memory instead of allocating.
    fn create_texture(&self, desc: &TextureDesc) -> Option<TextureRef>;

    /// Read back texture contents. Consumes the passed reference.
    fn download_texture(&self, texture: TextureRef, callback: OnTextureDownloaded);

    /// Write CPU pixels into a texture.
    fn upload_texture(&self, texture: &TextureRef, buffer: &PlaneBuf, callback: OnComplete);

    /// Convert a CPU video frame into host textures (one per plane).
    fn unpack_video_frame(&self, frame: VideoFrame, on_unpacked: OnVideoFrameUnpacked);

    /// Deliver captured audio from an input stream to the host mixer.
    fn send_audio_frame(&self, frame: AudioFrame, on_complete: OnComplete);
}

/// Cheap clonable handle to the host, as held by extension objects.
#[derive(Clone)]
pub struct HostContext {
    services: Arc<dyn HostServices>,
}

impl HostContext {
    pub fn new(services: Arc<dyn HostServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<dyn HostServices> {
        &self.services
    }

    pub fn send_event(&self, severity: EventSeverity, category: EventCategory, message: &str) {
        self.services.send_event(severity, category, message);
    }

    /// Info-severity event with an optional message.
    pub fn event(&self, category: EventCategory) {
        self.send_event(EventSeverity::Info, category, "");
    }

    pub fn log_message(&self, severity: EventSeverity, message: &str) {
        self.send_event(severity, EventCategory::Message, message);
    }

    pub fn log_verbose(&self, message: &str) {
        self.log_message(EventSeverity::Verbose, message);
    }

    pub fn log_info(&self, message: &str) {
        self.log_message(EventSeverity::Info, message);
    }

    pub fn log_warning(&self, message: &str) {
        self.log_message(EventSeverity::Warning, message);
    }

    pub fn log_error(&self, message: &str) {
        self.log_message(EventSeverity::Error, message);
    }

    pub fn monitor_value(&self, name: &str, value: f64) {
        self.services.monitor_value(name, value, true);
    }

    pub fn monitor_value_raw(&self, name: &str, value: f64) {
        self.services.monitor_value(name, value, false);
    }

    pub fn resolve_storage_filename(&self, storage_filename: &str) -> String {
        self.services.resolve_storage_filename(storage_filename)
    }

    pub fn userdata_path(&self, path: &str) -> String {
        self.services.userdata_path(path)
    }

    /// Run as soon as possible on the host's worker.
    pub fn run_async(&self, token: &CancellationToken, callback: OnComplete) {
        self.set_timeout(Duration::ZERO, token, callback);
    }

    /// Run after `delay` unless `token` is cancelled first.
    ///
    /// The token check happens at fire time, so an owner that cancels at
    /// teardown suppresses every pending callback into itself.
    pub fn set_timeout(&self, delay: Duration, token: &CancellationToken, callback: OnComplete) {
        self.set_timeout_with(AsyncPolicy::Default, delay, token, callback);
    }

    pub fn set_timeout_with(
        &self,
        policy: AsyncPolicy,
        delay: Duration,
        token: &CancellationToken,
        callback: OnComplete,
    ) {
        let guard = token.clone();
        self.services.set_timeout(
            policy,
            delay,
            Box::new(move || {
                if !guard.is_cancelled() {
                    callback();
                }
            }),
        );
    }

    pub fn create_texture(&self, desc: &TextureDesc) -> Option<TextureRef> {
        self.services.create_texture(desc)
    }

    pub fn download_texture(&self, texture: TextureRef, callback: OnTextureDownloaded) {
        self.services.download_texture(texture, callback);
    }

    pub fn upload_texture(&self, texture: &TextureRef, buffer: &PlaneBuf, callback: OnComplete) {
        self.services.upload_texture(texture, buffer, callback);
    }

    pub fn unpack_video_frame(&self, frame: VideoFrame, on_unpacked: OnVideoFrameUnpacked) {
        self.services.unpack_video_frame(frame, on_unpacked);
    }

    pub fn send_audio_frame(&self, frame: AudioFrame, on_complete: OnComplete) {
        self.services.send_audio_frame(frame, on_complete);
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HostContext")
    }
}
