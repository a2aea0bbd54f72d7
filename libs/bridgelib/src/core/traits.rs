// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The four entity kinds of the object protocol, as ordinary traits.
//!
//! Extension code implements these; the boundary layer in [`crate::core::abi`]
//! wraps them into stable dispatch tables and converts `Result`/`Option`
//! returns into the boolean/null signals the wire contract uses. Internal
//! code never sees a function-pointer table.

use super::error::Result;
use super::frames::AudioFrame;
use super::host::{HostContext, OnComplete};
use super::names::property_names;
use super::parameter::ParameterSet;
use super::sync::SyncDesc;
use super::texture::TextureRef;
use super::values::ValueSet;

/// Outcome of a stream's render phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RenderResult {
    Succeeded = 1,
    /// Rendered partially; output must not be consumed this frame.
    Incomplete = 3,
    Failed = 6,
}

/// Identity of a stream as seen across the boundary.
///
/// Opaque; stable for the stream's lifetime. Devices use it to correlate
/// `set_active_streams` with the streams they created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct StreamId(pub u64);

/// A loadable module supplying stream devices.
pub trait Extension: Send {
    fn initialize(&mut self, host: HostContext) -> Result<()>;

    fn shutdown(&mut self) {}

    /// Well-known property read; empty string means "not answered".
    fn property(&mut self, _name: &str) -> String {
        String::new()
    }

    fn set_property(&mut self, _name: &str, _value: String) -> bool {
        false
    }

    /// One ValueSet per creatable device (e.g. per discovered engine or
    /// adapter). An empty ValueSet announces a single settings-free device.
    fn enumerate_stream_device_settings(&mut self) -> Vec<ValueSet> {
        Vec::new()
    }

    fn create_stream_device(&mut self, settings: ValueSet) -> Result<Box<dyn StreamDevice>>;
}

/// A logical source/sink endpoint that enumerates and creates streams.
pub trait StreamDevice: Send {
    fn initialize(&mut self, _host: HostContext) -> Result<()> {
        Ok(())
    }

    /// Returns false to reject; the previous configuration stays in effect.
    fn update_settings(&mut self, _settings: ValueSet) -> bool {
        false
    }

    fn property(&mut self, name: &str) -> String {
        // the device name must always be readable, otherwise the host
        // considers the device lost and recreates it
        if name == property_names::NAME {
            return "Device".to_string();
        }
        String::new()
    }

    fn set_property(&mut self, _name: &str, _value: String) -> bool {
        false
    }

    /// One ValueSet per available stream (discovered network source, file
    /// layer, ...), including UI hints under `settings_desc`.
    fn enumerate_stream_settings(&mut self) -> Vec<ValueSet> {
        Vec::new()
    }

    fn create_input_stream(&mut self, _settings: ValueSet) -> Result<Box<dyn InputStream>>;

    fn create_output_stream(&mut self, _settings: ValueSet) -> Result<Box<dyn OutputStream>>;

    /// Which of this device's streams the host drives this frame.
    fn set_active_streams(&mut self, _inputs: &[StreamId], _outputs: &[StreamId]) -> bool {
        true
    }

    /// Device-level logic tick; false skips device rendering this frame.
    fn update(&mut self) -> bool {
        true
    }

    fn before_render(&mut self) -> SyncDesc {
        SyncDesc::none()
    }

    fn render(&mut self) {}

    fn after_render(&mut self) -> SyncDesc {
        SyncDesc::none()
    }
}

/// A single video/audio producer.
pub trait InputStream: Send {
    fn initialize(&mut self, _host: HostContext) -> Result<()> {
        Ok(())
    }

    fn update_settings(&mut self, _settings: ValueSet) -> bool {
        false
    }

    fn property(&mut self, _name: &str) -> String {
        String::new()
    }

    fn set_property(&mut self, _name: &str, _value: String) -> bool {
        false
    }

    /// Snapshot of negotiated/measured stream properties (resolution, frame
    /// rate, pixel format, color metadata).
    fn state(&mut self) -> ValueSet {
        ValueSet::new()
    }

    /// The stream's live-control parameters. The host only holds borrowed
    /// references into this set while the stream is alive.
    fn parameters(&self) -> &ParameterSet;

    fn set_video_requested(&mut self, _requested: bool) {}

    fn set_audio_requested(&mut self, _requested: bool) {}

    /// Pull/compute the next logical frame; false skips rendering this tick.
    fn update(&mut self) -> bool {
        true
    }

    fn before_render(&mut self) -> SyncDesc {
        SyncDesc::none()
    }

    fn render(&mut self) -> RenderResult {
        RenderResult::Succeeded
    }

    fn after_render(&mut self) -> SyncDesc {
        SyncDesc::none()
    }
}

/// A single video/audio consumer.
pub trait OutputStream: Send {
    fn initialize(&mut self, _host: HostContext) -> Result<()> {
        Ok(())
    }

    fn update_settings(&mut self, _settings: ValueSet) -> bool {
        false
    }

    fn property(&mut self, _name: &str) -> String {
        String::new()
    }

    fn set_property(&mut self, _name: &str, _value: String) -> bool {
        false
    }

    fn state(&mut self) -> ValueSet {
        ValueSet::new()
    }

    /// Audio to deliver alongside the video output.
    fn send_audio_frame(&mut self, _frame: AudioFrame, on_complete: OnComplete) {
        on_complete();
    }

    /// The texture the host renders this output's frame into. `None` when
    /// the output currently has no consumer.
    fn target(&mut self) -> Option<TextureRef> {
        None
    }

    fn before_render(&mut self) -> SyncDesc {
        SyncDesc::none()
    }

    fn after_render(&mut self) -> SyncDesc {
        SyncDesc::none()
    }

    /// Hand the rendered target to the consumer.
    fn present(&mut self) {}

    /// Advance to the next target in the output's swap chain.
    fn swap(&mut self) {}
}
