// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Extension-side wrapping: trait objects behind dispatch tables.
//!
//! Each `*_into_raw` function boxes a trait object together with its table;
//! the table is the first field, so casting between the table pointer and
//! the object pointer is layout-guaranteed. Every thunk catches panics:
//! a fault in extension code surfaces as the wire contract's
//! false/null/empty signal plus a `Failed` event, never as an unwind
//! across the boundary.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use super::tables::{
    RawExtension, RawHostContext, RawInputStream, RawOutputStream, RawParameter, RawStreamDevice,
};
use crate::core::events::{EventCategory, EventSeverity};
use crate::core::frames::{AudioFrame, PlaneBuf, VideoFrame};
use crate::core::host::{
    AsyncPolicy, HostContext, HostServices, OnComplete, OnTextureDownloaded, OnVideoFrameUnpacked,
};
use crate::core::names::property_names;
use crate::core::parameter::{Parameter, ParameterType, ParameterValue};
use crate::core::sync::SyncDesc;
use crate::core::texture::{RawTexture, TextureDesc, TextureRef};
use crate::core::traits::{
    Extension, InputStream, OutputStream, RenderResult, StreamDevice, StreamId,
};
use crate::core::values::ValueSet;

/// Run a thunk body, translating panics into `fallback` plus a Failed
/// event on the object's host context (when it has one already).
fn guarded<T>(
    host: Option<&HostContext>,
    what: &str,
    fallback: impl FnOnce() -> T,
    body: impl FnOnce() -> T,
) -> T {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            if let Some(host) = host {
                host.send_event(
                    EventSeverity::Error,
                    EventCategory::Failed,
                    &format!("extension panicked in {what}"),
                );
            } else {
                tracing::error!("extension panicked in {what}");
            }
            fallback()
        }
    }
}

// ---------------------------------------------------------------------------
// Host context
// ---------------------------------------------------------------------------

#[repr(C)]
struct HostContextObject {
    raw: RawHostContext,
    services: Arc<dyn HostServices>,
}

/// Wrap host services for handing to an extension.
///
/// The host owns the returned pointer. It must outlive not only the
/// extension but every callback the extension scheduled through it; a host
/// that cannot prove quiescence keeps the context alive for its own
/// lifetime instead of calling [`host_context_drop_raw`].
pub fn host_context_into_raw(services: Arc<dyn HostServices>) -> *mut RawHostContext {
    let object = Box::new(HostContextObject {
        raw: RawHostContext {
            send_event: host_send_event,
            monitor_value: host_monitor_value,
            resolve_storage_filename: host_resolve_storage_filename,
            get_userdata_path: host_get_userdata_path,
            set_timeout: host_set_timeout,
            create_texture: host_create_texture,
            download_texture: host_download_texture,
            upload_texture: host_upload_texture,
            unpack_video_frame: host_unpack_video_frame,
            send_audio_frame: host_send_audio_frame,
        },
        services,
    });
    Box::into_raw(object) as *mut RawHostContext
}

/// # Safety
/// `ptr` must come from [`host_context_into_raw`] and no extension object
/// that received it may still be alive.
pub unsafe fn host_context_drop_raw(ptr: *mut RawHostContext) {
    if !ptr.is_null() {
        drop(unsafe { Box::from_raw(ptr as *mut HostContextObject) });
    }
}

unsafe fn host_object<'a>(ptr: *mut RawHostContext) -> &'a HostContextObject {
    unsafe { &*(ptr as *const HostContextObject) }
}

unsafe extern "C" fn host_send_event(
    ptr: *mut RawHostContext,
    severity: EventSeverity,
    category: EventCategory,
    message: &str,
) {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "send_event", || (), || {
        services.send_event(severity, category, message)
    });
}

unsafe extern "C" fn host_monitor_value(
    ptr: *mut RawHostContext,
    name: &str,
    value: f64,
    average: bool,
) {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "monitor_value", || (), || {
        services.monitor_value(name, value, average)
    });
}

unsafe extern "C" fn host_resolve_storage_filename(
    ptr: *mut RawHostContext,
    storage_filename: &str,
) -> String {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "resolve_storage_filename", String::new, || {
        services.resolve_storage_filename(storage_filename)
    })
}

unsafe extern "C" fn host_get_userdata_path(ptr: *mut RawHostContext, path: &str) -> String {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "get_userdata_path", String::new, || {
        services.userdata_path(path)
    })
}

unsafe extern "C" fn host_set_timeout(
    ptr: *mut RawHostContext,
    policy: AsyncPolicy,
    delay_seconds: f64,
    callback: OnComplete,
) {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "set_timeout", || (), || {
        services.set_timeout(
            policy,
            Duration::from_secs_f64(delay_seconds.max(0.0)),
            callback,
        )
    });
}

unsafe extern "C" fn host_create_texture(
    ptr: *mut RawHostContext,
    desc: *const TextureDesc,
) -> *mut RawTexture {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "create_texture", std::ptr::null_mut, || {
        if desc.is_null() {
            return std::ptr::null_mut();
        }
        match services.create_texture(unsafe { &*desc }) {
            Some(texture) => texture.into_raw(),
            None => std::ptr::null_mut(),
        }
    })
}

unsafe extern "C" fn host_download_texture(
    ptr: *mut RawHostContext,
    texture: *mut RawTexture,
    callback: OnTextureDownloaded,
) {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "download_texture", || (), || {
        if let Some(texture) = unsafe { TextureRef::from_raw(texture) } {
            services.download_texture(texture, callback);
        }
    });
}

unsafe extern "C" fn host_upload_texture(
    ptr: *mut RawHostContext,
    texture: *mut RawTexture,
    buffer: PlaneBuf,
    callback: OnComplete,
) {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "upload_texture", || (), || {
        if let Some(texture) = unsafe { TextureRef::from_raw(texture) } {
            services.upload_texture(&texture, &buffer, callback);
        }
    });
}

unsafe extern "C" fn host_unpack_video_frame(
    ptr: *mut RawHostContext,
    frame: VideoFrame,
    on_unpacked: OnVideoFrameUnpacked,
) {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "unpack_video_frame", || (), || {
        services.unpack_video_frame(frame, on_unpacked)
    });
}

unsafe extern "C" fn host_send_audio_frame(
    ptr: *mut RawHostContext,
    frame: AudioFrame,
    on_complete: OnComplete,
) {
    let services = &unsafe { host_object(ptr) }.services;
    guarded(None, "send_audio_frame", || (), || {
        services.send_audio_frame(frame, on_complete)
    });
}

/// Extension-side view of a host context pointer.
struct RemoteHostServices {
    ptr: *mut RawHostContext,
}

// SAFETY: the host context object is immutable and its services are
// Send + Sync; the pointer stays valid until after extension close.
unsafe impl Send for RemoteHostServices {}
unsafe impl Sync for RemoteHostServices {}

impl RemoteHostServices {
    fn table(&self) -> &RawHostContext {
        unsafe { &*self.ptr }
    }
}

impl HostServices for RemoteHostServices {
    fn send_event(&self, severity: EventSeverity, category: EventCategory, message: &str) {
        unsafe { (self.table().send_event)(self.ptr, severity, category, message) }
    }

    fn monitor_value(&self, name: &str, value: f64, average: bool) {
        unsafe { (self.table().monitor_value)(self.ptr, name, value, average) }
    }

    fn resolve_storage_filename(&self, storage_filename: &str) -> String {
        unsafe { (self.table().resolve_storage_filename)(self.ptr, storage_filename) }
    }

    fn userdata_path(&self, path: &str) -> String {
        unsafe { (self.table().get_userdata_path)(self.ptr, path) }
    }

    fn set_timeout(&self, policy: AsyncPolicy, delay: Duration, callback: OnComplete) {
        unsafe { (self.table().set_timeout)(self.ptr, policy, delay.as_secs_f64(), callback) }
    }

    fn create_texture(&self, desc: &TextureDesc) -> Option<TextureRef> {
        let raw = unsafe { (self.table().create_texture)(self.ptr, desc) };
        unsafe { TextureRef::from_raw(raw) }
    }

    fn download_texture(&self, texture: TextureRef, callback: OnTextureDownloaded) {
        unsafe { (self.table().download_texture)(self.ptr, texture.into_raw(), callback) }
    }

    fn upload_texture(&self, texture: &TextureRef, buffer: &PlaneBuf, callback: OnComplete) {
        let texture = texture.clone();
        unsafe {
            (self.table().upload_texture)(self.ptr, texture.into_raw(), buffer.clone(), callback)
        }
    }

    fn unpack_video_frame(&self, frame: VideoFrame, on_unpacked: OnVideoFrameUnpacked) {
        unsafe { (self.table().unpack_video_frame)(self.ptr, frame, on_unpacked) }
    }

    fn send_audio_frame(&self, frame: AudioFrame, on_complete: OnComplete) {
        unsafe { (self.table().send_audio_frame)(self.ptr, frame, on_complete) }
    }
}

fn host_context_from_raw(ptr: *mut RawHostContext) -> Option<HostContext> {
    if ptr.is_null() {
        return None;
    }
    Some(HostContext::new(Arc::new(RemoteHostServices { ptr })))
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[repr(C)]
struct ParameterObject {
    raw: RawParameter,
    inner: Arc<Parameter>,
}

impl ParameterObject {
    fn new(inner: Arc<Parameter>) -> Box<Self> {
        Box::new(Self {
            raw: RawParameter {
                param_type: parameter_type,
                name: parameter_name,
                set_value: parameter_set_value,
                get_value: parameter_get_value,
                set_property: parameter_set_property,
                get_property: parameter_get_property,
            },
            inner,
        })
    }
}

unsafe fn parameter<'a>(ptr: *const RawParameter) -> &'a Parameter {
    unsafe { &(*(ptr as *const ParameterObject)).inner }
}

unsafe extern "C" fn parameter_type(ptr: *const RawParameter) -> ParameterType {
    unsafe { parameter(ptr) }.param_type()
}

unsafe extern "C" fn parameter_name(ptr: *const RawParameter) -> String {
    let inner = unsafe { parameter(ptr) };
    guarded(None, "parameter name", String::new, || {
        inner.name().to_string()
    })
}

unsafe extern "C" fn parameter_set_value(ptr: *mut RawParameter, value: ParameterValue) -> bool {
    let inner = unsafe { parameter(ptr) };
    guarded(None, "parameter set_value", || false, || {
        inner.set_value(value)
    })
}

unsafe extern "C" fn parameter_get_value(ptr: *const RawParameter) -> ParameterValue {
    let inner = unsafe { parameter(ptr) };
    guarded(None, "parameter get_value", ParameterValue::default, || {
        inner.value()
    })
}

unsafe extern "C" fn parameter_set_property(
    ptr: *mut RawParameter,
    name: &str,
    value: String,
) -> bool {
    let inner = unsafe { parameter(ptr) };
    guarded(None, "parameter set_property", || false, || {
        inner.set_property(name, value);
        true
    })
}

unsafe extern "C" fn parameter_get_property(ptr: *const RawParameter, name: &str) -> String {
    let inner = unsafe { parameter(ptr) };
    guarded(None, "parameter get_property", String::new, || {
        inner.property(name)
    })
}

// ---------------------------------------------------------------------------
// Input streams
// ---------------------------------------------------------------------------

#[repr(C)]
struct InputStreamObject {
    raw: RawInputStream,
    inner: Box<dyn InputStream>,
    host: Option<HostContext>,
    // boxed so parameter pointers stay stable while the cache grows
    parameter_objects: Vec<Box<ParameterObject>>,
}

/// Wrap an input stream for handing across the boundary. Ownership of the
/// returned pointer lies with the caller until it is released.
pub fn input_stream_into_raw(inner: Box<dyn InputStream>) -> *mut RawInputStream {
    let object = Box::new(InputStreamObject {
        raw: RawInputStream {
            release: input_release,
            initialize: input_initialize,
            update_settings: input_update_settings,
            get_property: input_get_property,
            set_property: input_set_property,
            get_state: input_get_state,
            get_parameter_count: input_get_parameter_count,
            get_parameter: input_get_parameter,
            set_video_requested: input_set_video_requested,
            set_audio_requested: input_set_audio_requested,
            update: input_update,
            before_render: input_before_render,
            render: input_render,
            after_render: input_after_render,
        },
        inner,
        host: None,
        parameter_objects: Vec::new(),
    });
    Box::into_raw(object) as *mut RawInputStream
}

unsafe fn input<'a>(ptr: *mut RawInputStream) -> &'a mut InputStreamObject {
    unsafe { &mut *(ptr as *mut InputStreamObject) }
}

unsafe extern "C" fn input_release(ptr: *mut RawInputStream) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        drop(unsafe { Box::from_raw(ptr as *mut InputStreamObject) });
    }));
}

unsafe extern "C" fn input_initialize(
    ptr: *mut RawInputStream,
    host: *mut RawHostContext,
) -> bool {
    let object = unsafe { input(ptr) };
    let Some(context) = host_context_from_raw(host) else {
        return false;
    };
    object.host = Some(context.clone());
    guarded(Some(&context), "initialize", || false, || {
        match object.inner.initialize(context.clone()) {
            Ok(()) => true,
            Err(error) => {
                context.log_error(&format!("initializing input stream failed: {error}"));
                false
            }
        }
    })
}

unsafe extern "C" fn input_update_settings(ptr: *mut RawInputStream, settings: ValueSet) -> bool {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "update_settings", || false, || {
        object.inner.update_settings(settings)
    })
}

unsafe extern "C" fn input_get_property(ptr: *mut RawInputStream, name: &str) -> String {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_property", String::new, || {
        object.inner.property(name)
    })
}

unsafe extern "C" fn input_set_property(
    ptr: *mut RawInputStream,
    name: &str,
    value: String,
) -> bool {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "set_property", || false, || {
        object.inner.set_property(name, value)
    })
}

unsafe extern "C" fn input_get_state(ptr: *mut RawInputStream) -> ValueSet {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_state", ValueSet::new, || {
        object.inner.state()
    })
}

unsafe extern "C" fn input_get_parameter_count(ptr: *mut RawInputStream) -> usize {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_parameter_count", || 0, || {
        object.inner.parameters().len()
    })
}

unsafe extern "C" fn input_get_parameter(
    ptr: *mut RawInputStream,
    index: usize,
) -> *mut RawParameter {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_parameter", std::ptr::null_mut, || {
        while object.parameter_objects.len() <= index {
            let next_index = object.parameter_objects.len();
            match object.inner.parameters().get(next_index).cloned() {
                Some(parameter) => object
                    .parameter_objects
                    .push(ParameterObject::new(parameter)),
                None => return std::ptr::null_mut(),
            }
        }
        &mut object.parameter_objects[index].raw as *mut RawParameter
    })
}

unsafe extern "C" fn input_set_video_requested(ptr: *mut RawInputStream, requested: bool) {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "set_video_requested", || (), || {
        object.inner.set_video_requested(requested)
    });
}

unsafe extern "C" fn input_set_audio_requested(ptr: *mut RawInputStream, requested: bool) {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "set_audio_requested", || (), || {
        object.inner.set_audio_requested(requested)
    });
}

unsafe extern "C" fn input_update(ptr: *mut RawInputStream) -> bool {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "update", || false, || object.inner.update())
}

unsafe extern "C" fn input_before_render(ptr: *mut RawInputStream) -> SyncDesc {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "before_render", SyncDesc::none, || {
        object.inner.before_render()
    })
}

unsafe extern "C" fn input_render(ptr: *mut RawInputStream) -> RenderResult {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(
        host.as_ref(),
        "render",
        || RenderResult::Failed,
        || object.inner.render(),
    )
}

unsafe extern "C" fn input_after_render(ptr: *mut RawInputStream) -> SyncDesc {
    let object = unsafe { input(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "after_render", SyncDesc::none, || {
        object.inner.after_render()
    })
}

// ---------------------------------------------------------------------------
// Output streams
// ---------------------------------------------------------------------------

#[repr(C)]
struct OutputStreamObject {
    raw: RawOutputStream,
    inner: Box<dyn OutputStream>,
    host: Option<HostContext>,
}

/// Wrap an output stream for handing across the boundary.
pub fn output_stream_into_raw(inner: Box<dyn OutputStream>) -> *mut RawOutputStream {
    let object = Box::new(OutputStreamObject {
        raw: RawOutputStream {
            release: output_release,
            initialize: output_initialize,
            update_settings: output_update_settings,
            get_property: output_get_property,
            set_property: output_set_property,
            get_state: output_get_state,
            send_audio_frame: output_send_audio_frame,
            get_target: output_get_target,
            before_render: output_before_render,
            after_render: output_after_render,
            present: output_present,
            swap: output_swap,
        },
        inner,
        host: None,
    });
    Box::into_raw(object) as *mut RawOutputStream
}

unsafe fn output<'a>(ptr: *mut RawOutputStream) -> &'a mut OutputStreamObject {
    unsafe { &mut *(ptr as *mut OutputStreamObject) }
}

unsafe extern "C" fn output_release(ptr: *mut RawOutputStream) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        drop(unsafe { Box::from_raw(ptr as *mut OutputStreamObject) });
    }));
}

unsafe extern "C" fn output_initialize(
    ptr: *mut RawOutputStream,
    host: *mut RawHostContext,
) -> bool {
    let object = unsafe { output(ptr) };
    let Some(context) = host_context_from_raw(host) else {
        return false;
    };
    object.host = Some(context.clone());
    guarded(Some(&context), "initialize", || false, || {
        match object.inner.initialize(context.clone()) {
            Ok(()) => true,
            Err(error) => {
                context.log_error(&format!("initializing output stream failed: {error}"));
                false
            }
        }
    })
}

unsafe extern "C" fn output_update_settings(
    ptr: *mut RawOutputStream,
    settings: ValueSet,
) -> bool {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "update_settings", || false, || {
        object.inner.update_settings(settings)
    })
}

unsafe extern "C" fn output_get_property(ptr: *mut RawOutputStream, name: &str) -> String {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_property", String::new, || {
        object.inner.property(name)
    })
}

unsafe extern "C" fn output_set_property(
    ptr: *mut RawOutputStream,
    name: &str,
    value: String,
) -> bool {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "set_property", || false, || {
        object.inner.set_property(name, value)
    })
}

unsafe extern "C" fn output_get_state(ptr: *mut RawOutputStream) -> ValueSet {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_state", ValueSet::new, || {
        object.inner.state()
    })
}

unsafe extern "C" fn output_send_audio_frame(
    ptr: *mut RawOutputStream,
    frame: AudioFrame,
    on_complete: OnComplete,
) {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "send_audio_frame", || (), || {
        object.inner.send_audio_frame(frame, on_complete)
    });
}

unsafe extern "C" fn output_get_target(ptr: *mut RawOutputStream) -> *mut RawTexture {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_target", std::ptr::null_mut, || {
        match object.inner.target() {
            Some(texture) => texture.into_raw(),
            None => std::ptr::null_mut(),
        }
    })
}

unsafe extern "C" fn output_before_render(ptr: *mut RawOutputStream) -> SyncDesc {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "before_render", SyncDesc::none, || {
        object.inner.before_render()
    })
}

unsafe extern "C" fn output_after_render(ptr: *mut RawOutputStream) -> SyncDesc {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "after_render", SyncDesc::none, || {
        object.inner.after_render()
    })
}

unsafe extern "C" fn output_present(ptr: *mut RawOutputStream) {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "present", || (), || object.inner.present());
}

unsafe extern "C" fn output_swap(ptr: *mut RawOutputStream) {
    let object = unsafe { output(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "swap", || (), || object.inner.swap());
}

// ---------------------------------------------------------------------------
// Stream devices
// ---------------------------------------------------------------------------

#[repr(C)]
struct StreamDeviceObject {
    raw: RawStreamDevice,
    inner: Box<dyn StreamDevice>,
    host: Option<HostContext>,
}

/// Wrap a stream device for handing across the boundary.
pub fn stream_device_into_raw(inner: Box<dyn StreamDevice>) -> *mut RawStreamDevice {
    let object = Box::new(StreamDeviceObject {
        raw: RawStreamDevice {
            release: device_release,
            initialize: device_initialize,
            update_settings: device_update_settings,
            get_property: device_get_property,
            set_property: device_set_property,
            enumerate_stream_settings: device_enumerate_stream_settings,
            create_input_stream: device_create_input_stream,
            create_output_stream: device_create_output_stream,
            set_active_streams: device_set_active_streams,
            update: device_update,
            before_render: device_before_render,
            render: device_render,
            after_render: device_after_render,
        },
        inner,
        host: None,
    });
    Box::into_raw(object) as *mut RawStreamDevice
}

unsafe fn device<'a>(ptr: *mut RawStreamDevice) -> &'a mut StreamDeviceObject {
    unsafe { &mut *(ptr as *mut StreamDeviceObject) }
}

unsafe extern "C" fn device_release(ptr: *mut RawStreamDevice) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        drop(unsafe { Box::from_raw(ptr as *mut StreamDeviceObject) });
    }));
}

unsafe extern "C" fn device_initialize(
    ptr: *mut RawStreamDevice,
    host: *mut RawHostContext,
) -> bool {
    let object = unsafe { device(ptr) };
    let Some(context) = host_context_from_raw(host) else {
        return false;
    };
    object.host = Some(context.clone());
    guarded(Some(&context), "initialize", || false, || {
        match object.inner.initialize(context.clone()) {
            Ok(()) => true,
            Err(error) => {
                context.log_error(&format!("initializing stream device failed: {error}"));
                false
            }
        }
    })
}

unsafe extern "C" fn device_update_settings(ptr: *mut RawStreamDevice, settings: ValueSet) -> bool {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "update_settings", || false, || {
        object.inner.update_settings(settings)
    })
}

unsafe extern "C" fn device_get_property(ptr: *mut RawStreamDevice, name: &str) -> String {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "get_property", String::new, || {
        object.inner.property(name)
    })
}

unsafe extern "C" fn device_set_property(
    ptr: *mut RawStreamDevice,
    name: &str,
    value: String,
) -> bool {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "set_property", || false, || {
        object.inner.set_property(name, value)
    })
}

unsafe extern "C" fn device_enumerate_stream_settings(
    ptr: *mut RawStreamDevice,
) -> Vec<ValueSet> {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "enumerate_stream_settings", Vec::new, || {
        object.inner.enumerate_stream_settings()
    })
}

unsafe extern "C" fn device_create_input_stream(
    ptr: *mut RawStreamDevice,
    settings: ValueSet,
) -> *mut RawInputStream {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(
        host.as_ref(),
        "create_input_stream",
        std::ptr::null_mut,
        || match object.inner.create_input_stream(settings) {
            Ok(stream) => input_stream_into_raw(stream),
            Err(error) => {
                if let Some(host) = &host {
                    host.log_error(&format!("creating input stream failed: {error}"));
                }
                std::ptr::null_mut()
            }
        },
    )
}

unsafe extern "C" fn device_create_output_stream(
    ptr: *mut RawStreamDevice,
    settings: ValueSet,
) -> *mut RawOutputStream {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(
        host.as_ref(),
        "create_output_stream",
        std::ptr::null_mut,
        || match object.inner.create_output_stream(settings) {
            Ok(stream) => output_stream_into_raw(stream),
            Err(error) => {
                if let Some(host) = &host {
                    host.log_error(&format!("creating output stream failed: {error}"));
                }
                std::ptr::null_mut()
            }
        },
    )
}

unsafe extern "C" fn device_set_active_streams(
    ptr: *mut RawStreamDevice,
    inputs: *const StreamId,
    input_count: usize,
    outputs: *const StreamId,
    output_count: usize,
) -> bool {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    let inputs: &[StreamId] = if inputs.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(inputs, input_count) }
    };
    let outputs: &[StreamId] = if outputs.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(outputs, output_count) }
    };
    guarded(host.as_ref(), "set_active_streams", || false, || {
        object.inner.set_active_streams(inputs, outputs)
    })
}

unsafe extern "C" fn device_update(ptr: *mut RawStreamDevice) -> bool {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "update", || false, || object.inner.update())
}

unsafe extern "C" fn device_before_render(ptr: *mut RawStreamDevice) -> SyncDesc {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "before_render", SyncDesc::none, || {
        object.inner.before_render()
    })
}

unsafe extern "C" fn device_render(ptr: *mut RawStreamDevice) {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "render", || (), || object.inner.render());
}

unsafe extern "C" fn device_after_render(ptr: *mut RawStreamDevice) -> SyncDesc {
    let object = unsafe { device(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "after_render", SyncDesc::none, || {
        object.inner.after_render()
    })
}

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

#[repr(C)]
struct ExtensionObject {
    raw: RawExtension,
    inner: Box<dyn Extension>,
    host: Option<HostContext>,
}

/// Wrap an extension for handing across the boundary. The matching
/// destruction entry point is [`extension_drop_raw`] (the module's close
/// function).
pub fn extension_into_raw(inner: Box<dyn Extension>) -> *mut RawExtension {
    let object = Box::new(ExtensionObject {
        raw: RawExtension {
            initialize: extension_initialize,
            shutdown: extension_shutdown,
            get_property: extension_get_property,
            set_property: extension_set_property,
            enumerate_stream_device_settings: extension_enumerate_stream_device_settings,
            create_stream_device: extension_create_stream_device,
        },
        inner,
        host: None,
    });
    Box::into_raw(object) as *mut RawExtension
}

/// # Safety
/// `ptr` must come from [`extension_into_raw`] and must not be used again.
pub unsafe fn extension_drop_raw(ptr: *mut RawExtension) {
    if ptr.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        drop(unsafe { Box::from_raw(ptr as *mut ExtensionObject) });
    }));
}

/// In-process close entry point, matching the loader's close signature.
///
/// # Safety
/// Same contract as [`extension_drop_raw`].
pub unsafe extern "C" fn extension_close(ptr: *mut RawExtension) {
    unsafe { extension_drop_raw(ptr) }
}

unsafe fn extension<'a>(ptr: *mut RawExtension) -> &'a mut ExtensionObject {
    unsafe { &mut *(ptr as *mut ExtensionObject) }
}

unsafe extern "C" fn extension_initialize(
    ptr: *mut RawExtension,
    host: *mut RawHostContext,
) -> bool {
    let object = unsafe { extension(ptr) };
    let Some(context) = host_context_from_raw(host) else {
        return false;
    };
    object.host = Some(context.clone());
    guarded(Some(&context), "initialize", || false, || {
        match object.inner.initialize(context.clone()) {
            Ok(()) => true,
            Err(error) => {
                context.log_error(&format!("initializing extension failed: {error}"));
                false
            }
        }
    })
}

unsafe extern "C" fn extension_shutdown(ptr: *mut RawExtension) {
    let object = unsafe { extension(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "shutdown", || (), || object.inner.shutdown());
    object.host = None;
}

unsafe extern "C" fn extension_get_property(ptr: *mut RawExtension, name: &str) -> String {
    let object = unsafe { extension(ptr) };
    if name == property_names::API_VERSION {
        return super::API_VERSION.to_string();
    }
    let host = object.host.clone();
    guarded(host.as_ref(), "get_property", String::new, || {
        object.inner.property(name)
    })
}

unsafe extern "C" fn extension_set_property(
    ptr: *mut RawExtension,
    name: &str,
    value: String,
) -> bool {
    let object = unsafe { extension(ptr) };
    let host = object.host.clone();
    guarded(host.as_ref(), "set_property", || false, || {
        object.inner.set_property(name, value)
    })
}

unsafe extern "C" fn extension_enumerate_stream_device_settings(
    ptr: *mut RawExtension,
) -> Vec<ValueSet> {
    let object = unsafe { extension(ptr) };
    let host = object.host.clone();
    guarded(
        host.as_ref(),
        "enumerate_stream_device_settings",
        Vec::new,
        || object.inner.enumerate_stream_device_settings(),
    )
}

unsafe extern "C" fn extension_create_stream_device(
    ptr: *mut RawExtension,
    settings: ValueSet,
) -> *mut RawStreamDevice {
    let object = unsafe { extension(ptr) };
    let host = object.host.clone();
    guarded(
        host.as_ref(),
        "create_stream_device",
        std::ptr::null_mut,
        || match object.inner.create_stream_device(settings) {
            Ok(device) => stream_device_into_raw(device),
            Err(error) => {
                if let Some(host) = &host {
                    host.log_error(&format!("creating stream device failed: {error}"));
                }
                std::ptr::null_mut()
            }
        },
    )
}
