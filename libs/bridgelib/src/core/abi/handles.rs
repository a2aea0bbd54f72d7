// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Host-side handles over the dispatch tables.
//!
//! Each handle is move-only and owns exactly one release of its object, so
//! "who frees it" is checked by the compiler instead of by convention. A
//! null creation result maps to `None` before a handle ever exists; no
//! entry point is ever invoked on null.

use std::marker::PhantomData;
use std::ptr::NonNull;

use super::tables::{
    RawExtension, RawHostContext, RawInputStream, RawOutputStream, RawParameter, RawStreamDevice,
};
use crate::core::frames::AudioFrame;
use crate::core::host::OnComplete;
use crate::core::parameter::{ParameterType, ParameterValue};
use crate::core::sync::SyncDesc;
use crate::core::texture::TextureRef;
use crate::core::traits::{RenderResult, StreamId};
use crate::core::values::{FromValue, ValueSet};

/// Signature of the module function destroying an extension.
pub type ExtensionCloseFn = unsafe extern "C" fn(*mut RawExtension);

/// Owning handle to an extension. Dropping it invokes the module's close
/// entry point; call [`shutdown`](Self::shutdown) first, after all devices
/// and streams are gone.
pub struct ExtensionHandle {
    ptr: NonNull<RawExtension>,
    close: ExtensionCloseFn,
}

impl ExtensionHandle {
    /// # Safety
    /// `ptr` must be a live extension obtained from the module whose close
    /// function is `close`; ownership transfers to the handle.
    pub unsafe fn from_raw(ptr: *mut RawExtension, close: ExtensionCloseFn) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, close })
    }

    fn table(&self) -> &RawExtension {
        unsafe { self.ptr.as_ref() }
    }

    pub fn initialize(&mut self, host: *mut RawHostContext) -> bool {
        unsafe { (self.table().initialize)(self.ptr.as_ptr(), host) }
    }

    pub fn shutdown(&mut self) {
        unsafe { (self.table().shutdown)(self.ptr.as_ptr()) }
    }

    pub fn property(&mut self, name: &str) -> String {
        unsafe { (self.table().get_property)(self.ptr.as_ptr(), name) }
    }

    pub fn set_property(&mut self, name: &str, value: String) -> bool {
        unsafe { (self.table().set_property)(self.ptr.as_ptr(), name, value) }
    }

    pub fn enumerate_stream_device_settings(&mut self) -> Vec<ValueSet> {
        unsafe { (self.table().enumerate_stream_device_settings)(self.ptr.as_ptr()) }
    }

    pub fn create_stream_device(&mut self, settings: ValueSet) -> Option<DeviceHandle> {
        let raw = unsafe { (self.table().create_stream_device)(self.ptr.as_ptr(), settings) };
        NonNull::new(raw).map(|ptr| DeviceHandle { ptr })
    }
}

impl Drop for ExtensionHandle {
    fn drop(&mut self) {
        unsafe { (self.close)(self.ptr.as_ptr()) };
    }
}

// SAFETY: the host drives all protocol calls from its render thread; the
// handle is move-only, so at most one thread uses it at a time.
unsafe impl Send for ExtensionHandle {}

/// Owning handle to a stream device.
pub struct DeviceHandle {
    ptr: NonNull<RawStreamDevice>,
}

impl DeviceHandle {
    fn table(&self) -> &RawStreamDevice {
        unsafe { self.ptr.as_ref() }
    }

    pub fn initialize(&mut self, host: *mut RawHostContext) -> bool {
        unsafe { (self.table().initialize)(self.ptr.as_ptr(), host) }
    }

    pub fn update_settings(&mut self, settings: ValueSet) -> bool {
        unsafe { (self.table().update_settings)(self.ptr.as_ptr(), settings) }
    }

    pub fn property(&mut self, name: &str) -> String {
        unsafe { (self.table().get_property)(self.ptr.as_ptr(), name) }
    }

    pub fn set_property(&mut self, name: &str, value: String) -> bool {
        unsafe { (self.table().set_property)(self.ptr.as_ptr(), name, value) }
    }

    pub fn enumerate_stream_settings(&mut self) -> Vec<ValueSet> {
        unsafe { (self.table().enumerate_stream_settings)(self.ptr.as_ptr()) }
    }

    pub fn create_input_stream(&mut self, settings: ValueSet) -> Option<InputStreamHandle> {
        let raw = unsafe { (self.table().create_input_stream)(self.ptr.as_ptr(), settings) };
        NonNull::new(raw).map(|ptr| InputStreamHandle { ptr })
    }

    pub fn create_output_stream(&mut self, settings: ValueSet) -> Option<OutputStreamHandle> {
        let raw = unsafe { (self.table().create_output_stream)(self.ptr.as_ptr(), settings) };
        NonNull::new(raw).map(|ptr| OutputStreamHandle { ptr })
    }

    pub fn set_active_streams(&mut self, inputs: &[StreamId], outputs: &[StreamId]) -> bool {
        unsafe {
            (self.table().set_active_streams)(
                self.ptr.as_ptr(),
                inputs.as_ptr(),
                inputs.len(),
                outputs.as_ptr(),
                outputs.len(),
            )
        }
    }

    pub fn update(&mut self) -> bool {
        unsafe { (self.table().update)(self.ptr.as_ptr()) }
    }

    pub fn before_render(&mut self) -> SyncDesc {
        unsafe { (self.table().before_render)(self.ptr.as_ptr()) }
    }

    pub fn render(&mut self) {
        unsafe { (self.table().render)(self.ptr.as_ptr()) }
    }

    pub fn after_render(&mut self) -> SyncDesc {
        unsafe { (self.table().after_render)(self.ptr.as_ptr()) }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        unsafe { (self.table().release)(self.ptr.as_ptr()) };
    }
}

unsafe impl Send for DeviceHandle {}

/// Borrowed reference to a stream parameter; valid while the owning stream
/// handle is.
pub struct ParameterRef<'a> {
    ptr: NonNull<RawParameter>,
    _stream: PhantomData<&'a ()>,
}

impl ParameterRef<'_> {
    fn table(&self) -> &RawParameter {
        unsafe { self.ptr.as_ref() }
    }

    pub fn param_type(&self) -> ParameterType {
        unsafe { (self.table().param_type)(self.ptr.as_ptr()) }
    }

    pub fn name(&self) -> String {
        unsafe { (self.table().name)(self.ptr.as_ptr()) }
    }

    pub fn value(&self) -> ParameterValue {
        unsafe { (self.table().get_value)(self.ptr.as_ptr()) }
    }

    pub fn set_value(&self, value: ParameterValue) -> bool {
        unsafe { (self.table().set_value)(self.ptr.as_ptr(), value) }
    }

    pub fn property(&self, name: &str) -> String {
        unsafe { (self.table().get_property)(self.ptr.as_ptr(), name) }
    }

    pub fn property_as<T: FromValue>(&self, name: &str) -> T {
        T::from_value(&self.property(name)).unwrap_or_default()
    }

    pub fn set_property(&self, name: &str, value: String) -> bool {
        unsafe { (self.table().set_property)(self.ptr.as_ptr(), name, value) }
    }
}

/// Owning handle to an input stream.
pub struct InputStreamHandle {
    ptr: NonNull<RawInputStream>,
}

impl InputStreamHandle {
    fn table(&self) -> &RawInputStream {
        unsafe { self.ptr.as_ref() }
    }

    /// Stable identity for `set_active_streams`.
    pub fn id(&self) -> StreamId {
        StreamId(self.ptr.as_ptr() as u64)
    }

    pub fn initialize(&mut self, host: *mut RawHostContext) -> bool {
        unsafe { (self.table().initialize)(self.ptr.as_ptr(), host) }
    }

    pub fn update_settings(&mut self, settings: ValueSet) -> bool {
        unsafe { (self.table().update_settings)(self.ptr.as_ptr(), settings) }
    }

    pub fn property(&mut self, name: &str) -> String {
        unsafe { (self.table().get_property)(self.ptr.as_ptr(), name) }
    }

    pub fn set_property(&mut self, name: &str, value: String) -> bool {
        unsafe { (self.table().set_property)(self.ptr.as_ptr(), name, value) }
    }

    pub fn state(&mut self) -> ValueSet {
        unsafe { (self.table().get_state)(self.ptr.as_ptr()) }
    }

    pub fn parameter_count(&self) -> usize {
        unsafe { (self.table().get_parameter_count)(self.ptr.as_ptr()) }
    }

    pub fn parameter(&self, index: usize) -> Option<ParameterRef<'_>> {
        let raw = unsafe { (self.table().get_parameter)(self.ptr.as_ptr(), index) };
        NonNull::new(raw).map(|ptr| ParameterRef {
            ptr,
            _stream: PhantomData,
        })
    }

    pub fn find_parameter(&self, name: &str) -> Option<ParameterRef<'_>> {
        (0..self.parameter_count())
            .filter_map(|index| self.parameter(index))
            .find(|parameter| parameter.name() == name)
    }

    pub fn find_parameter_by_property(
        &self,
        property: &str,
        value: &str,
    ) -> Option<ParameterRef<'_>> {
        (0..self.parameter_count())
            .filter_map(|index| self.parameter(index))
            .find(|parameter| parameter.property(property) == value)
    }

    pub fn set_video_requested(&mut self, requested: bool) {
        unsafe { (self.table().set_video_requested)(self.ptr.as_ptr(), requested) }
    }

    pub fn set_audio_requested(&mut self, requested: bool) {
        unsafe { (self.table().set_audio_requested)(self.ptr.as_ptr(), requested) }
    }

    pub fn update(&mut self) -> bool {
        unsafe { (self.table().update)(self.ptr.as_ptr()) }
    }

    pub fn before_render(&mut self) -> SyncDesc {
        unsafe { (self.table().before_render)(self.ptr.as_ptr()) }
    }

    pub fn render(&mut self) -> RenderResult {
        unsafe { (self.table().render)(self.ptr.as_ptr()) }
    }

    pub fn after_render(&mut self) -> SyncDesc {
        unsafe { (self.table().after_render)(self.ptr.as_ptr()) }
    }
}

impl Drop for InputStreamHandle {
    fn drop(&mut self) {
        unsafe { (self.table().release)(self.ptr.as_ptr()) };
    }
}

unsafe impl Send for InputStreamHandle {}

/// Owning handle to an output stream.
pub struct OutputStreamHandle {
    ptr: NonNull<RawOutputStream>,
}

impl OutputStreamHandle {
    fn table(&self) -> &RawOutputStream {
        unsafe { self.ptr.as_ref() }
    }

    pub fn id(&self) -> StreamId {
        StreamId(self.ptr.as_ptr() as u64)
    }

    pub fn initialize(&mut self, host: *mut RawHostContext) -> bool {
        unsafe { (self.table().initialize)(self.ptr.as_ptr(), host) }
    }

    pub fn update_settings(&mut self, settings: ValueSet) -> bool {
        unsafe { (self.table().update_settings)(self.ptr.as_ptr(), settings) }
    }

    pub fn property(&mut self, name: &str) -> String {
        unsafe { (self.table().get_property)(self.ptr.as_ptr(), name) }
    }

    pub fn set_property(&mut self, name: &str, value: String) -> bool {
        unsafe { (self.table().set_property)(self.ptr.as_ptr(), name, value) }
    }

    pub fn state(&mut self) -> ValueSet {
        unsafe { (self.table().get_state)(self.ptr.as_ptr()) }
    }

    pub fn send_audio_frame(&mut self, frame: AudioFrame, on_complete: OnComplete) {
        unsafe { (self.table().send_audio_frame)(self.ptr.as_ptr(), frame, on_complete) }
    }

    /// The texture to render this output's frame into; the returned
    /// reference is owned by the caller.
    pub fn target(&mut self) -> Option<TextureRef> {
        let raw = unsafe { (self.table().get_target)(self.ptr.as_ptr()) };
        unsafe { TextureRef::from_raw(raw) }
    }

    pub fn before_render(&mut self) -> SyncDesc {
        unsafe { (self.table().before_render)(self.ptr.as_ptr()) }
    }

    pub fn after_render(&mut self) -> SyncDesc {
        unsafe { (self.table().after_render)(self.ptr.as_ptr()) }
    }

    pub fn present(&mut self) {
        unsafe { (self.table().present)(self.ptr.as_ptr()) }
    }

    pub fn swap(&mut self) {
        unsafe { (self.table().swap)(self.ptr.as_ptr()) }
    }
}

impl Drop for OutputStreamHandle {
    fn drop(&mut self) {
        unsafe { (self.table().release)(self.ptr.as_ptr()) };
    }
}

unsafe impl Send for OutputStreamHandle {}
