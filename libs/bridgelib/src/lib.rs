// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Host/extension boundary for real-time video/audio compositing.
//!
//! Independently built extensions supply video sources and sinks (cameras,
//! network streams, generative renderers, third-party compositing engines)
//! to a host renderer, each potentially using a different GPU API or
//! running in a different process. Host and extensions interoperate
//! through a binary-stable object protocol, a string-encoded settings
//! model and a fence-counter frame synchronization contract — never
//! through a shared language-level object model.
//!
//! - [`core::values`] — ordered name/value settings sets
//! - [`core::parameter`] — typed, lockable live-control parameters
//! - [`core::texture`] — refcounted shared texture handles
//! - [`core::sync`] — timeline fences and the wait/signal counter protocol
//! - [`core::traits`] + [`core::abi`] — the four entity kinds, as traits
//!   internally and as stable dispatch tables at the module boundary
//! - [`core::scheduling`] — frame-rate throttling, timers, shared-resource
//!   update coalescing
//! - [`host`] — reference host services and the per-frame driver

pub mod core;
pub mod host;

pub use crate::core::{BridgeError, Result};

pub mod prelude {
    pub use crate::core::{
        AudioFrame, BridgeError, EventCategory, EventSeverity, Extension, FromValue, HostContext,
        InputStream, OutputStream, Parameter, ParameterSet, ParameterType, ParameterValue,
        PixelFormat, RenderIntervalManager, RenderResult, Result, SettingsDescBuilder,
        ShareHandle, ShareHandleKind, StreamDevice, StreamId, SyncDesc, SyncStrategy, TextureDesc,
        TextureRef, ToValue, ValueSet, VideoFrame,
    };
    pub use crate::core::names::{
        parameter_names, property_names, purpose_names, setting_names, state_names,
    };
}
