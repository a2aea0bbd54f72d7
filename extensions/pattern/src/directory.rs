// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Simulated source directory.
//!
//! Stands in for the vendor discovery daemon a real source backend would
//! poll: sources announce and withdraw themselves, consumers connect to
//! outputs, and CPU-fed sources queue frames. The device's discovery
//! thread polls this directory; hosts and tests mutate it.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;

use bridgelib::core::VideoFrame;
use parking_lot::Mutex;

#[derive(Default)]
struct DirectoryState {
    sources: Vec<String>,
    consumers: Vec<String>,
    frames: HashMap<String, VecDeque<VideoFrame>>,
}

static DIRECTORY: LazyLock<Mutex<DirectoryState>> =
    LazyLock::new(|| Mutex::new(DirectoryState::default()));

/// Make a source visible to discovery.
pub fn announce_source(name: &str) {
    let mut state = DIRECTORY.lock();
    if !state.sources.iter().any(|s| s == name) {
        state.sources.push(name.to_string());
    }
}

/// Remove a source; streams bound to it start failing their renders.
pub fn withdraw_source(name: &str) {
    let mut state = DIRECTORY.lock();
    state.sources.retain(|s| s != name);
    state.frames.remove(name);
}

pub fn is_announced(name: &str) -> bool {
    DIRECTORY.lock().sources.iter().any(|s| s == name)
}

/// Snapshot of currently announced source names, in announce order.
pub fn sources() -> Vec<String> {
    DIRECTORY.lock().sources.clone()
}

/// Connect a consumer to a named output.
pub fn announce_consumer(name: &str) {
    let mut state = DIRECTORY.lock();
    if !state.consumers.iter().any(|c| c == name) {
        state.consumers.push(name.to_string());
    }
}

pub fn withdraw_consumer(name: &str) {
    DIRECTORY.lock().consumers.retain(|c| c != name);
}

pub fn has_consumer(name: &str) -> bool {
    DIRECTORY.lock().consumers.iter().any(|c| c == name)
}

/// Queue a CPU frame for a memory-fed source.
pub fn push_frame(source: &str, frame: VideoFrame) {
    DIRECTORY
        .lock()
        .frames
        .entry(source.to_string())
        .or_default()
        .push_back(frame);
}

pub fn pop_frame(source: &str) -> Option<VideoFrame> {
    DIRECTORY.lock().frames.get_mut(source)?.pop_front()
}

/// Drop every announcement and queued frame. Tests isolate through unique
/// source names; this is for explicit teardown.
pub fn clear() {
    let mut state = DIRECTORY.lock();
    state.sources.clear();
    state.consumers.clear();
    state.frames.clear();
}
