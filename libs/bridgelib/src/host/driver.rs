// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The per-frame call sequence.
//!
//! The driver owns every attached extension and drives all four protocol
//! call sequences synchronously from the caller's render thread. Per frame
//! and per active stream: `update_settings` (only when the pending settings
//! actually changed) → `update()` → `before_render` → render →
//! `after_render`, with GPU waits and signals inserted through the
//! [`FenceOps`] seam according to the descriptors each phase returned.
//!
//! Fence discipline, mirroring the stream-side `wait(n+1)`/`signal(n+2)`
//! triad: for an input the host signals `before.value + 1` (its usage of
//! the previous frame is done) ahead of the render and waits on
//! `after.value` before consuming; for an output the host waits on
//! `before.value`, renders into the target, signals `before.value + 1` and
//! lets `present` copy out. A failed render advances nothing and its
//! output is not consumed.

use std::sync::Arc;

use crate::core::abi::{
    DeviceHandle, ExtensionCloseFn, ExtensionHandle, InputStreamHandle, OutputStreamHandle,
    RawExtension, RawHostContext, extension_close, extension_into_raw,
    host_context_into_raw,
};
use crate::core::error::{BridgeError, Result};
use crate::core::host::HostServices;
use crate::core::sync::{FenceOps, SyncDesc, SyncStrategy};
use crate::core::texture::TextureRef;
use crate::core::traits::{Extension, RenderResult, StreamId};
use crate::core::values::ValueSet;

/// Index of an attached extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionId(usize);

/// Index of a created device within its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    extension: usize,
    device: usize,
}

/// What happened to each stream this frame.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Streams whose render ran, with its result.
    pub rendered: Vec<(StreamId, RenderResult)>,
    /// Streams skipped by their own `update()` (throttled or no new frame).
    pub skipped: Vec<StreamId>,
    /// Output streams that presented a frame.
    pub presented: Vec<StreamId>,
    /// Streams whose fence counter moved backwards — a protocol violation.
    pub fence_violations: Vec<StreamId>,
}

struct PendingSettings {
    pending: Option<ValueSet>,
    applied: ValueSet,
}

impl PendingSettings {
    fn new(initial: ValueSet) -> Self {
        Self {
            pending: None,
            applied: initial,
        }
    }

    fn request(&mut self, settings: ValueSet) {
        self.pending = Some(settings);
    }

    /// Take the pending set if it differs from what is already applied.
    fn take_changed(&mut self) -> Option<ValueSet> {
        let pending = self.pending.take()?;
        (pending != self.applied).then_some(pending)
    }

    fn mark_applied(&mut self, settings: ValueSet) {
        self.applied = settings;
    }
}

struct ActiveInput {
    stream: InputStreamHandle,
    settings: PendingSettings,
    fence_value: u64,
}

struct ActiveOutput {
    stream: OutputStreamHandle,
    settings: PendingSettings,
    fence_value: u64,
}

struct ActiveDevice {
    // streams before the device so they release first
    inputs: Vec<ActiveInput>,
    outputs: Vec<ActiveOutput>,
    device: DeviceHandle,
    settings: PendingSettings,
    active_dirty: bool,
}

/// The context handed to one attached extension.
///
/// Never freed: callbacks the extension scheduled on the host timer may
/// still hold the pointer when the extension detaches, and the protocol has
/// no way to cancel them. One leaked allocation per attach.
struct HostContextPtr {
    ptr: *mut RawHostContext,
}

// SAFETY: plain pointer holder; the driver is single-owner.
unsafe impl Send for HostContextPtr {}

struct AttachedExtension {
    devices: Vec<ActiveDevice>,
    extension: ExtensionHandle,
    host_ctx: HostContextPtr,
}

impl Drop for AttachedExtension {
    fn drop(&mut self) {
        // streams and devices must be gone before shutdown, and shutdown
        // must precede close; the context outlives the close (field order)
        self.devices.clear();
        self.extension.shutdown();
    }
}

/// Drives attached extensions through the frame protocol.
pub struct RenderDriver {
    services: Arc<dyn HostServices>,
    fence_ops: Box<dyn FenceOps + Send>,
    extensions: Vec<Option<AttachedExtension>>,
}

impl RenderDriver {
    pub fn new(services: Arc<dyn HostServices>, fence_ops: Box<dyn FenceOps + Send>) -> Self {
        Self {
            services,
            fence_ops,
            extensions: Vec::new(),
        }
    }

    /// Attach an in-process extension implementation.
    pub fn attach(&mut self, extension: Box<dyn Extension>) -> Result<ExtensionId> {
        let raw = extension_into_raw(extension);
        // SAFETY: freshly wrapped pointer with its matching close function.
        unsafe { self.attach_raw(raw, extension_close) }
    }

    /// Attach an extension obtained from a loaded module.
    ///
    /// # Safety
    /// `raw` must be a live extension the caller owns, and `close` must be
    /// the close entry point of the module that created it.
    pub unsafe fn attach_raw(
        &mut self,
        raw: *mut RawExtension,
        close: ExtensionCloseFn,
    ) -> Result<ExtensionId> {
        // declared before the handle so it outlives the close on failure
        let host_ctx = HostContextPtr {
            ptr: host_context_into_raw(Arc::clone(&self.services)),
        };
        let mut extension = unsafe { ExtensionHandle::from_raw(raw, close) }
            .ok_or_else(|| BridgeError::Extension("null extension".to_string()))?;
        if !extension.initialize(host_ctx.ptr) {
            return Err(BridgeError::Extension(
                "extension initialization failed".to_string(),
            ));
        }
        let id = ExtensionId(self.extensions.len());
        self.extensions.push(Some(AttachedExtension {
            devices: Vec::new(),
            extension,
            host_ctx,
        }));
        Ok(id)
    }

    /// Shut down and close one extension, releasing its devices and streams.
    pub fn detach(&mut self, id: ExtensionId) {
        if let Some(slot) = self.extensions.get_mut(id.0) {
            *slot = None;
        }
    }

    fn attached(&mut self, id: ExtensionId) -> Result<&mut AttachedExtension> {
        self.extensions
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| BridgeError::NotFound(format!("extension {}", id.0)))
    }

    fn active_device(&mut self, id: DeviceId) -> Result<&mut ActiveDevice> {
        self.extensions
            .get_mut(id.extension)
            .and_then(Option::as_mut)
            .and_then(|ext| ext.devices.get_mut(id.device))
            .ok_or_else(|| BridgeError::NotFound(format!("device {}/{}", id.extension, id.device)))
    }

    pub fn extension_property(&mut self, id: ExtensionId, name: &str) -> Result<String> {
        Ok(self.attached(id)?.extension.property(name))
    }

    pub fn enumerate_stream_device_settings(&mut self, id: ExtensionId) -> Result<Vec<ValueSet>> {
        Ok(self.attached(id)?.extension.enumerate_stream_device_settings())
    }

    pub fn create_stream_device(
        &mut self,
        id: ExtensionId,
        settings: ValueSet,
    ) -> Result<DeviceId> {
        let attached = self.attached(id)?;
        let host_ctx = attached.host_ctx.ptr;
        let mut device = attached
            .extension
            .create_stream_device(settings.clone())
            .ok_or_else(|| BridgeError::Device("device creation failed".to_string()))?;
        if !device.initialize(host_ctx) {
            return Err(BridgeError::Device("device initialization failed".to_string()));
        }
        attached.devices.push(ActiveDevice {
            inputs: Vec::new(),
            outputs: Vec::new(),
            device,
            settings: PendingSettings::new(settings),
            active_dirty: false,
        });
        Ok(DeviceId {
            extension: id.0,
            device: attached.devices.len() - 1,
        })
    }

    pub fn device_property(&mut self, id: DeviceId, name: &str) -> Result<String> {
        Ok(self.active_device(id)?.device.property(name))
    }

    pub fn update_device_settings(&mut self, id: DeviceId, settings: ValueSet) -> Result<()> {
        self.active_device(id)?.settings.request(settings);
        Ok(())
    }

    pub fn enumerate_stream_settings(&mut self, id: DeviceId) -> Result<Vec<ValueSet>> {
        Ok(self.active_device(id)?.device.enumerate_stream_settings())
    }

    pub fn create_input_stream(&mut self, id: DeviceId, settings: ValueSet) -> Result<StreamId> {
        let host_ctx = self.attached(ExtensionId(id.extension))?.host_ctx.ptr;
        let device = self.active_device(id)?;
        let mut stream = device
            .device
            .create_input_stream(settings.clone())
            .ok_or_else(|| BridgeError::Stream("input stream creation failed".to_string()))?;
        if !stream.initialize(host_ctx) {
            return Err(BridgeError::Stream(
                "input stream initialization failed".to_string(),
            ));
        }
        let stream_id = stream.id();
        device.inputs.push(ActiveInput {
            stream,
            settings: PendingSettings::new(settings),
            fence_value: 0,
        });
        device.active_dirty = true;
        Ok(stream_id)
    }

    pub fn create_output_stream(&mut self, id: DeviceId, settings: ValueSet) -> Result<StreamId> {
        let host_ctx = self.attached(ExtensionId(id.extension))?.host_ctx.ptr;
        let device = self.active_device(id)?;
        let mut stream = device
            .device
            .create_output_stream(settings.clone())
            .ok_or_else(|| BridgeError::Stream("output stream creation failed".to_string()))?;
        if !stream.initialize(host_ctx) {
            return Err(BridgeError::Stream(
                "output stream initialization failed".to_string(),
            ));
        }
        let stream_id = stream.id();
        device.outputs.push(ActiveOutput {
            stream,
            settings: PendingSettings::new(settings),
            fence_value: 0,
        });
        device.active_dirty = true;
        Ok(stream_id)
    }

    pub fn release_stream(&mut self, id: DeviceId, stream: StreamId) -> Result<()> {
        let device = self.active_device(id)?;
        let inputs_before = device.inputs.len();
        let outputs_before = device.outputs.len();
        device.inputs.retain(|input| input.stream.id() != stream);
        device.outputs.retain(|output| output.stream.id() != stream);
        if device.inputs.len() != inputs_before || device.outputs.len() != outputs_before {
            device.active_dirty = true;
        }
        Ok(())
    }

    /// Queue a settings update; applied next frame only if it differs from
    /// the currently applied configuration.
    pub fn update_stream_settings(
        &mut self,
        id: DeviceId,
        stream: StreamId,
        settings: ValueSet,
    ) -> Result<()> {
        let device = self.active_device(id)?;
        if let Some(input) = device.inputs.iter_mut().find(|i| i.stream.id() == stream) {
            input.settings.request(settings);
            return Ok(());
        }
        if let Some(output) = device.outputs.iter_mut().find(|o| o.stream.id() == stream) {
            output.settings.request(settings);
            return Ok(());
        }
        Err(BridgeError::NotFound(format!("stream {:?}", stream)))
    }

    /// Borrow an input stream handle (parameter access, state snapshots).
    pub fn input_mut(
        &mut self,
        id: DeviceId,
        stream: StreamId,
    ) -> Result<&mut InputStreamHandle> {
        self.active_device(id)?
            .inputs
            .iter_mut()
            .find(|input| input.stream.id() == stream)
            .map(|input| &mut input.stream)
            .ok_or_else(|| BridgeError::NotFound(format!("input stream {:?}", stream)))
    }

    /// Borrow an output stream handle.
    pub fn output_mut(
        &mut self,
        id: DeviceId,
        stream: StreamId,
    ) -> Result<&mut OutputStreamHandle> {
        self.active_device(id)?
            .outputs
            .iter_mut()
            .find(|output| output.stream.id() == stream)
            .map(|output| &mut output.stream)
            .ok_or_else(|| BridgeError::NotFound(format!("output stream {:?}", stream)))
    }

    /// Drive one frame without host-side output compositing.
    pub fn render_frame(&mut self) -> FrameReport {
        self.render_frame_with(&mut |_, _| {})
    }

    /// Drive one frame. `render_output` is invoked once per presentable
    /// output with the target texture the host should composite into.
    pub fn render_frame_with(
        &mut self,
        render_output: &mut dyn FnMut(StreamId, &TextureRef),
    ) -> FrameReport {
        let mut report = FrameReport::default();
        for attached in self.extensions.iter_mut().flatten() {
            for device in &mut attached.devices {
                Self::drive_device(&mut *self.fence_ops, device, render_output, &mut report);
            }
        }
        report
    }

    fn drive_device(
        fence_ops: &mut dyn FenceOps,
        device: &mut ActiveDevice,
        render_output: &mut dyn FnMut(StreamId, &TextureRef),
        report: &mut FrameReport,
    ) {
        if device.active_dirty {
            let inputs: Vec<StreamId> = device.inputs.iter().map(|i| i.stream.id()).collect();
            let outputs: Vec<StreamId> = device.outputs.iter().map(|o| o.stream.id()).collect();
            device.device.set_active_streams(&inputs, &outputs);
            device.active_dirty = false;
        }

        if let Some(settings) = device.settings.take_changed() {
            if device.device.update_settings(settings.clone()) {
                device.settings.mark_applied(settings);
            }
            // a rejected configuration leaves the previous one in effect
        }

        if !device.device.update() {
            return;
        }

        for input in &mut device.inputs {
            Self::drive_input(fence_ops, input, report);
        }
        for output in &mut device.outputs {
            Self::drive_output(fence_ops, output, render_output, report);
        }

        let before = device.device.before_render();
        if before.strategy != SyncStrategy::None {
            fence_ops.signal(&SyncDesc {
                value: before.value + 1,
                ..before
            });
        }
        device.device.render();
        let after = device.device.after_render();
        if after.strategy != SyncStrategy::None {
            fence_ops.wait(&after);
        }
    }

    fn drive_input(fence_ops: &mut dyn FenceOps, input: &mut ActiveInput, report: &mut FrameReport) {
        let id = input.stream.id();

        if let Some(settings) = input.settings.take_changed() {
            if input.stream.update_settings(settings.clone()) {
                input.settings.mark_applied(settings);
            }
        }

        if !input.stream.update() {
            report.skipped.push(id);
            return;
        }

        let before = input.stream.before_render();
        if before.strategy != SyncStrategy::None {
            // release the shared surface: host usage of the previous frame
            // is ordered before the upcoming render's wait
            fence_ops.signal(&SyncDesc {
                value: before.value + 1,
                ..before
            });
        }

        let result = input.stream.render();
        let after = input.stream.after_render();

        if after.value < input.fence_value {
            report.fence_violations.push(id);
        }

        match result {
            RenderResult::Succeeded => {
                if after.strategy != SyncStrategy::None {
                    fence_ops.wait(&after);
                }
                input.fence_value = after.value;
            }
            RenderResult::Incomplete | RenderResult::Failed => {
                // no fence advance; output is not consumed this frame and
                // a downstream consumer keeps waiting
            }
        }
        report.rendered.push((id, result));
    }

    fn drive_output(
        fence_ops: &mut dyn FenceOps,
        output: &mut ActiveOutput,
        render_output: &mut dyn FnMut(StreamId, &TextureRef),
        report: &mut FrameReport,
    ) {
        let id = output.stream.id();

        if let Some(settings) = output.settings.take_changed() {
            if output.stream.update_settings(settings.clone()) {
                output.settings.mark_applied(settings);
            }
        }

        let Some(target) = output.stream.target() else {
            report.skipped.push(id);
            return;
        };

        let before = output.stream.before_render();
        if before.strategy != SyncStrategy::None {
            // wait until the output's previous copy out of the target is done
            fence_ops.wait(&before);
        }

        render_output(id, &target);

        if before.strategy != SyncStrategy::None {
            fence_ops.signal(&SyncDesc {
                value: before.value + 1,
                ..before
            });
        }

        let after = output.stream.after_render();
        if after.value < output.fence_value {
            report.fence_violations.push(id);
        }
        output.fence_value = after.value;

        output.stream.present();
        output.stream.swap();
        report.presented.push(id);
    }
}

impl Drop for RenderDriver {
    fn drop(&mut self) {
        // detach in reverse attach order
        while self.extensions.pop().is_some() {}
    }
}
