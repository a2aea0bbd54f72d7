// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod abi;
pub mod error;
pub mod events;
pub mod format;
pub mod frames;
pub mod host;
pub mod names;
pub mod parameter;
pub mod scheduling;
pub mod settings_desc;
pub mod streams;
pub mod sync;
pub mod texture;
pub mod traits;
pub mod values;

pub use error::{BridgeError, Result};
pub use events::{EventCategory, EventSeverity, EventSender, HostEvent, event_channel};
pub use format::PixelFormat;
pub use frames::{AudioFrame, BoundedFrameQueue, PlaneBuf, VideoFrame};
pub use host::{
    AsyncPolicy, DownloadedBuffer, HostContext, HostServices, OnComplete, OnTextureDownloaded,
    OnVideoFrameUnpacked,
};
pub use parameter::{
    Parameter, ParameterSet, ParameterType, ParameterValue, update_input_texture,
};
pub use scheduling::{CancellationToken, RenderIntervalManager, StreamGroup, TimerQueue};
pub use settings_desc::SettingsDescBuilder;
pub use streams::{MemoryTargetPool, MemoryVideoQueue};
pub use sync::{
    FenceOps, FenceTimeline, NullFenceOps, RenderTicket, SoftwareFence, SoftwareFenceOps,
    SyncDesc, SyncStrategy, TimelineFence,
};
pub use texture::{
    RawTexture, ShareHandle, ShareHandleKind, SharedTexture, TextureDesc, TextureRef,
};
pub use traits::{Extension, InputStream, OutputStream, RenderResult, StreamDevice, StreamId};
pub use values::{FromValue, NamedValue, ToValue, ValueSet};
