// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Reference host services: event channel, timer queue, monitor
//! statistics, storage paths and CPU texture transfers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::core::error::{BridgeError, Result};
use crate::core::events::{EventCategory, EventSender, EventSeverity, HostEvent, event_channel};
use crate::core::format::PixelFormat;
use crate::core::frames::{AudioFrame, PlaneBuf, VideoFrame};
use crate::core::host::{
    AsyncPolicy, DownloadedBuffer, HostContext, HostServices, OnComplete, OnTextureDownloaded,
    OnVideoFrameUnpacked,
};
use crate::core::scheduling::{CancellationToken, ExponentialMean, TimerQueue};
use crate::core::texture::{ShareHandle, ShareHandleKind, SharedTexture, TextureDesc, TextureRef};

/// Host configuration, loadable from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Root for extension-relative storage filenames.
    pub storage_dir: PathBuf,
    /// Root for per-user extension data.
    pub userdata_dir: PathBuf,
    /// Target frame rate hint forwarded to streams that do not set one.
    pub target_frame_rate: f64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("."),
            userdata_dir: std::env::temp_dir().join("bridgelib"),
            target_frame_rate: 0.0,
        }
    }
}

impl HostConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|error| BridgeError::Configuration(format!("{}: {error}", path.display())))
    }
}

#[derive(Debug, Default)]
struct MonitorStat {
    mean: ExponentialMean,
    last: f64,
    samples: u64,
}

const MONITOR_MEAN_WEIGHT: f64 = 0.5;

struct HostCore {
    config: HostConfig,
    events: EventSender,
    timers: TimerQueue,
    monitors: Mutex<HashMap<String, MonitorStat>>,
    next_texture_id: Mutex<u64>,
    audio_frames: Mutex<Vec<AudioFrame>>,
}

impl HostServices for HostCore {
    fn send_event(&self, severity: EventSeverity, category: EventCategory, message: &str) {
        self.events.send(severity, category, message);
    }

    fn monitor_value(&self, name: &str, value: f64, average: bool) {
        let mut monitors = self.monitors.lock();
        let stat = monitors.entry(name.to_string()).or_default();
        if average {
            if stat.samples == 0 {
                stat.mean.reset(value);
            } else {
                stat.mean.push(value, MONITOR_MEAN_WEIGHT);
            }
        } else {
            stat.mean.reset(value);
        }
        stat.last = value;
        stat.samples += 1;
    }

    fn resolve_storage_filename(&self, storage_filename: &str) -> String {
        self.config
            .storage_dir
            .join(storage_filename)
            .to_string_lossy()
            .into_owned()
    }

    fn userdata_path(&self, path: &str) -> String {
        self.config
            .userdata_dir
            .join(path)
            .to_string_lossy()
            .into_owned()
    }

    fn set_timeout(&self, _policy: AsyncPolicy, delay: Duration, callback: OnComplete) {
        // no dedicated main thread in this host; both policies share the
        // timer worker
        self.timers
            .schedule(delay, &CancellationToken::new(), callback);
    }

    fn create_texture(&self, desc: &TextureDesc) -> Option<TextureRef> {
        if desc.width == 0 || desc.height == 0 || desc.format == PixelFormat::None {
            return None;
        }
        let mut desc = *desc;
        if desc.share_handle.is_none() {
            // host-backed CPU texture: stamp an id so extensions in this
            // process can hand it back for upload/download
            let mut next_id = self.next_texture_id.lock();
            *next_id += 1;
            desc.share_handle = ShareHandle {
                kind: ShareHandleKind::HostTexture,
                handle: *next_id,
                ..ShareHandle::default()
            };
        }
        Some(SharedTexture::create(desc))
    }

    fn download_texture(&self, texture: TextureRef, callback: OnTextureDownloaded) {
        let buffer = match SharedTexture::from_ref(&texture) {
            Some(shared) => DownloadedBuffer {
                data: shared.read_pixels(),
                pitch: shared.row_pitch(),
            },
            None => {
                self.events.send(
                    EventSeverity::Warning,
                    EventCategory::Message,
                    "download requested for a texture this host did not allocate",
                );
                DownloadedBuffer::default()
            }
        };
        drop(texture);
        callback(buffer);
    }

    fn upload_texture(&self, texture: &TextureRef, buffer: &PlaneBuf, callback: OnComplete) {
        if let Some(shared) = SharedTexture::from_ref(texture) {
            shared.write_pixels(&buffer.data, buffer.pitch);
        } else {
            self.events.send(
                EventSeverity::Warning,
                EventCategory::Message,
                "upload requested for a texture this host did not allocate",
            );
        }
        callback();
    }

    fn unpack_video_frame(&self, frame: VideoFrame, on_unpacked: OnVideoFrameUnpacked) {
        let format = PixelFormat::by_name(&frame.pixel_format, PixelFormat::Rgba8Unorm);
        let mut textures = Vec::with_capacity(frame.planes.len());
        for plane in &frame.planes {
            let desc = TextureDesc {
                width: frame.width,
                height: frame.height,
                format,
                is_target: false,
                share_handle: ShareHandle::none(),
            };
            if let Some(texture) = self.create_texture(&desc) {
                if let Some(shared) = SharedTexture::from_ref(&texture) {
                    shared.write_pixels(&plane.data, plane.pitch);
                }
                textures.push(texture);
            }
        }
        on_unpacked(textures);
    }

    fn send_audio_frame(&self, frame: AudioFrame, on_complete: OnComplete) {
        self.audio_frames.lock().push(frame);
        on_complete();
    }
}

/// The reference host. Owns the event channel, timer worker and monitor
/// statistics; hand its [`context`](Self::context) to attached extensions.
pub struct Host {
    core: Arc<HostCore>,
    events: Receiver<HostEvent>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            core: Arc::new(HostCore {
                config,
                events: events_tx,
                timers: TimerQueue::new(),
                monitors: Mutex::new(HashMap::new()),
                next_texture_id: Mutex::new(0),
                audio_frames: Mutex::new(Vec::new()),
            }),
            events: events_rx,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.core.config
    }

    pub fn services(&self) -> Arc<dyn HostServices> {
        Arc::clone(&self.core) as Arc<dyn HostServices>
    }

    pub fn context(&self) -> HostContext {
        HostContext::new(self.services())
    }

    /// The receiving end of the extension event channel. Re-enumeration on
    /// `DevicesChanged`/`StreamsChanged` is the application's job.
    pub fn events(&self) -> &Receiver<HostEvent> {
        &self.events
    }

    pub fn drain_events(&self) -> Vec<HostEvent> {
        self.events.try_iter().collect()
    }

    /// Smoothed value of a monitored statistic.
    pub fn monitor_mean(&self, name: &str) -> Option<f64> {
        self.core.monitors.lock().get(name).map(|s| s.mean.mean())
    }

    /// Most recent raw sample of a monitored statistic.
    pub fn monitor_last(&self, name: &str) -> Option<f64> {
        self.core.monitors.lock().get(name).map(|s| s.last)
    }

    /// Audio delivered by input streams since the last take.
    pub fn take_audio_frames(&self) -> Vec<AudioFrame> {
        std::mem::take(&mut *self.core.audio_frames.lock())
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}
