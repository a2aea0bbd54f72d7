// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The dispatch tables. Layout changes here are ABI breaks and require an
//! `EXTENSION_ABI_VERSION` bump in `bridgelib-extension-abi`.

use crate::core::events::{EventCategory, EventSeverity};
use crate::core::frames::{AudioFrame, PlaneBuf, VideoFrame};
use crate::core::host::{AsyncPolicy, OnComplete, OnTextureDownloaded, OnVideoFrameUnpacked};
use crate::core::parameter::{ParameterType, ParameterValue};
use crate::core::sync::SyncDesc;
use crate::core::texture::{RawTexture, TextureDesc};
use crate::core::traits::{RenderResult, StreamId};
use crate::core::values::ValueSet;

/// Host services as seen from the extension side. Owned by the host; an
/// extension must never free it.
#[repr(C)]
pub struct RawHostContext {
    pub send_event:
        unsafe extern "C" fn(*mut RawHostContext, EventSeverity, EventCategory, &str),
    pub monitor_value: unsafe extern "C" fn(*mut RawHostContext, &str, f64, bool),
    pub resolve_storage_filename: unsafe extern "C" fn(*mut RawHostContext, &str) -> String,
    pub get_userdata_path: unsafe extern "C" fn(*mut RawHostContext, &str) -> String,
    /// Delay is in seconds.
    pub set_timeout: unsafe extern "C" fn(*mut RawHostContext, AsyncPolicy, f64, OnComplete),
    pub create_texture:
        unsafe extern "C" fn(*mut RawHostContext, *const TextureDesc) -> *mut RawTexture,
    /// Consumes one texture reference.
    pub download_texture:
        unsafe extern "C" fn(*mut RawHostContext, *mut RawTexture, OnTextureDownloaded),
    /// Consumes one texture reference.
    pub upload_texture:
        unsafe extern "C" fn(*mut RawHostContext, *mut RawTexture, PlaneBuf, OnComplete),
    pub unpack_video_frame:
        unsafe extern "C" fn(*mut RawHostContext, VideoFrame, OnVideoFrameUnpacked),
    pub send_audio_frame: unsafe extern "C" fn(*mut RawHostContext, AudioFrame, OnComplete),
}

/// A stream parameter. Owned by its stream; valid while the stream lives.
#[repr(C)]
pub struct RawParameter {
    pub param_type: unsafe extern "C" fn(*const RawParameter) -> ParameterType,
    pub name: unsafe extern "C" fn(*const RawParameter) -> String,
    pub set_value: unsafe extern "C" fn(*mut RawParameter, ParameterValue) -> bool,
    pub get_value: unsafe extern "C" fn(*const RawParameter) -> ParameterValue,
    pub set_property: unsafe extern "C" fn(*mut RawParameter, &str, String) -> bool,
    pub get_property: unsafe extern "C" fn(*const RawParameter, &str) -> String,
}

/// An input stream. Released exactly once by its owner.
#[repr(C)]
pub struct RawInputStream {
    pub release: unsafe extern "C" fn(*mut RawInputStream),
    pub initialize: unsafe extern "C" fn(*mut RawInputStream, *mut RawHostContext) -> bool,
    pub update_settings: unsafe extern "C" fn(*mut RawInputStream, ValueSet) -> bool,
    pub get_property: unsafe extern "C" fn(*mut RawInputStream, &str) -> String,
    pub set_property: unsafe extern "C" fn(*mut RawInputStream, &str, String) -> bool,
    pub get_state: unsafe extern "C" fn(*mut RawInputStream) -> ValueSet,
    pub get_parameter_count: unsafe extern "C" fn(*mut RawInputStream) -> usize,
    pub get_parameter: unsafe extern "C" fn(*mut RawInputStream, usize) -> *mut RawParameter,
    pub set_video_requested: unsafe extern "C" fn(*mut RawInputStream, bool),
    pub set_audio_requested: unsafe extern "C" fn(*mut RawInputStream, bool),
    pub update: unsafe extern "C" fn(*mut RawInputStream) -> bool,
    pub before_render: unsafe extern "C" fn(*mut RawInputStream) -> SyncDesc,
    pub render: unsafe extern "C" fn(*mut RawInputStream) -> RenderResult,
    pub after_render: unsafe extern "C" fn(*mut RawInputStream) -> SyncDesc,
}

/// An output stream. Released exactly once by its owner.
#[repr(C)]
pub struct RawOutputStream {
    pub release: unsafe extern "C" fn(*mut RawOutputStream),
    pub initialize: unsafe extern "C" fn(*mut RawOutputStream, *mut RawHostContext) -> bool,
    pub update_settings: unsafe extern "C" fn(*mut RawOutputStream, ValueSet) -> bool,
    pub get_property: unsafe extern "C" fn(*mut RawOutputStream, &str) -> String,
    pub set_property: unsafe extern "C" fn(*mut RawOutputStream, &str, String) -> bool,
    pub get_state: unsafe extern "C" fn(*mut RawOutputStream) -> ValueSet,
    pub send_audio_frame: unsafe extern "C" fn(*mut RawOutputStream, AudioFrame, OnComplete),
    /// Transfers one texture reference to the caller; null when the output
    /// has no consumer.
    pub get_target: unsafe extern "C" fn(*mut RawOutputStream) -> *mut RawTexture,
    pub before_render: unsafe extern "C" fn(*mut RawOutputStream) -> SyncDesc,
    pub after_render: unsafe extern "C" fn(*mut RawOutputStream) -> SyncDesc,
    pub present: unsafe extern "C" fn(*mut RawOutputStream),
    pub swap: unsafe extern "C" fn(*mut RawOutputStream),
}

/// A stream device. Released exactly once by its owner.
#[repr(C)]
pub struct RawStreamDevice {
    pub release: unsafe extern "C" fn(*mut RawStreamDevice),
    pub initialize: unsafe extern "C" fn(*mut RawStreamDevice, *mut RawHostContext) -> bool,
    pub update_settings: unsafe extern "C" fn(*mut RawStreamDevice, ValueSet) -> bool,
    pub get_property: unsafe extern "C" fn(*mut RawStreamDevice, &str) -> String,
    pub set_property: unsafe extern "C" fn(*mut RawStreamDevice, &str, String) -> bool,
    pub enumerate_stream_settings: unsafe extern "C" fn(*mut RawStreamDevice) -> Vec<ValueSet>,
    /// Null on failure; the host must not call into a null result.
    pub create_input_stream:
        unsafe extern "C" fn(*mut RawStreamDevice, ValueSet) -> *mut RawInputStream,
    /// Null on failure; the host must not call into a null result.
    pub create_output_stream:
        unsafe extern "C" fn(*mut RawStreamDevice, ValueSet) -> *mut RawOutputStream,
    pub set_active_streams: unsafe extern "C" fn(
        *mut RawStreamDevice,
        *const StreamId,
        usize,
        *const StreamId,
        usize,
    ) -> bool,
    pub update: unsafe extern "C" fn(*mut RawStreamDevice) -> bool,
    pub before_render: unsafe extern "C" fn(*mut RawStreamDevice) -> SyncDesc,
    pub render: unsafe extern "C" fn(*mut RawStreamDevice),
    pub after_render: unsafe extern "C" fn(*mut RawStreamDevice) -> SyncDesc,
}

/// An extension module. Destroyed through the module's close entry point,
/// not through a table entry.
#[repr(C)]
pub struct RawExtension {
    pub initialize: unsafe extern "C" fn(*mut RawExtension, *mut RawHostContext) -> bool,
    pub shutdown: unsafe extern "C" fn(*mut RawExtension),
    pub get_property: unsafe extern "C" fn(*mut RawExtension, &str) -> String,
    pub set_property: unsafe extern "C" fn(*mut RawExtension, &str, String) -> bool,
    pub enumerate_stream_device_settings:
        unsafe extern "C" fn(*mut RawExtension) -> Vec<ValueSet>,
    /// Null on failure; the host must not call into a null result.
    pub create_stream_device:
        unsafe extern "C" fn(*mut RawExtension, ValueSet) -> *mut RawStreamDevice,
}
