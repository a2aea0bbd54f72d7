// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Sample bridgelib extension.
//!
//! Exercises the whole protocol surface without touching a real capture
//! SDK or GPU API: a discovery thread over a simulated source directory,
//! input streams sharing one scene (the first registered stream drives
//! its time), CPU pattern rendering under the fence-counter triad, a
//! memory-fed input with the bounded unpack queue, and a memory output
//! with pooled targets.

pub mod device;
pub mod directory;
pub mod extension;
pub mod input;
pub mod memory_input;
pub mod output;
pub mod scene;

pub use device::PatternDevice;
pub use extension::PatternExtension;
pub use input::PatternInput;
pub use memory_input::MemoryFrameInput;
pub use output::MemoryOutput;
pub use scene::Scene;

bridgelib_extension_abi::export_extension!(PatternExtension);
