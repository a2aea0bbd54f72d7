// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The binary boundary between host and extension.
//!
//! Internal code works with the traits in [`crate::core::traits`]; this
//! module is the only place where those traits meet a stable
//! struct-of-function-pointers representation. Each of the four entity
//! kinds (extension, device, input stream, output stream) plus parameters
//! and the host context gets a `#[repr(C)]` dispatch table whose first
//! argument identifies the implementation object — the table is embedded
//! as the object's first field, so the table pointer and the object
//! pointer coincide.
//!
//! The contract is Rust-to-Rust with an exact version gate (see the
//! `bridgelib-extension-abi` crate): plain-old-data protocol types are
//! `#[repr(C)]` with fixed discriminants, while strings, value sets and
//! callbacks cross as Rust types, which the version gate makes sound.
//! Nothing may unwind across a table call — every thunk catches panics and
//! converts them to the wire contract's false/null/empty signal plus a
//! `Failed` event.

// Strings, ValueSets and boxed callbacks deliberately cross these
// `extern "C"` signatures; the declaration's exact-version check is what
// guarantees both sides agree on their layout.
#![allow(improper_ctypes_definitions)]

mod handles;
mod tables;
mod wrap;

pub use handles::{
    DeviceHandle, ExtensionCloseFn, ExtensionHandle, InputStreamHandle, OutputStreamHandle,
    ParameterRef,
};
pub use tables::{
    RawExtension, RawHostContext, RawInputStream, RawOutputStream, RawParameter, RawStreamDevice,
};
pub use wrap::{
    extension_close, extension_drop_raw, extension_into_raw, host_context_drop_raw,
    host_context_into_raw, input_stream_into_raw, output_stream_into_raw, stream_device_into_raw,
};

/// Protocol revision answered by every extension's `api_version` property.
pub const API_VERSION: &str = "1.0";
