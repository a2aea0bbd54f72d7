// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pattern stream device.
//!
//! Runs a background discovery thread polling the source directory: the
//! render-thread-facing `enumerate_stream_settings` returns a snapshot
//! copy under the same mutex, and a change raises `StreamsChanged` so the
//! host knows to re-enumerate.

use std::sync::Arc;
use std::time::Duration;

use bridgelib::core::error::Result;
use bridgelib::prelude::*;
use parking_lot::{Condvar, Mutex};

use crate::directory;
use crate::input::PatternInput;
use crate::memory_input::MemoryFrameInput;
use crate::output::MemoryOutput;
use crate::scene::Scene;

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Default)]
struct Discovery {
    current: Vec<ValueSet>,
    shutdown: bool,
}

struct DiscoveryShared {
    state: Mutex<Discovery>,
    signal: Condvar,
}

pub struct PatternDevice {
    settings: ValueSet,
    scene: Arc<Scene>,
    shared: Arc<DiscoveryShared>,
    worker: Option<std::thread::JoinHandle<()>>,
    active_inputs: Vec<StreamId>,
    active_outputs: Vec<StreamId>,
}

fn stream_settings_for(source: &str) -> ValueSet {
    let mut entry = ValueSet::new();
    entry.set(setting_names::NAME, source);
    entry.set(setting_names::HANDLE, source);
    entry.set(setting_names::RESOLUTION_X, 1920);
    entry.set(setting_names::RESOLUTION_Y, 1080);

    let mut desc = SettingsDescBuilder::new();
    desc.add_int("resolution_x", "Resolution X", 128, 8192)
        .add_int("resolution_y", "Resolution Y", 128, 8192)
        .add_double("frame_rate", "Frame rate", 0.0, 240.0)
        .add_bool("preview", "Preview resolution")
        .add_enum("kind", "Stream kind", &["pattern", "memory"]);
    entry.set(setting_names::SETTINGS_DESC, desc.build());
    entry
}

impl PatternDevice {
    pub fn new(settings: ValueSet) -> Self {
        let layers: Vec<String> = settings.get("layers", Vec::new());
        Self {
            settings,
            scene: Scene::new(layers),
            shared: Arc::new(DiscoveryShared {
                state: Mutex::new(Discovery::default()),
                signal: Condvar::new(),
            }),
            worker: None,
            active_inputs: Vec::new(),
            active_outputs: Vec::new(),
        }
    }

    fn discovery_loop(shared: Arc<DiscoveryShared>, host: HostContext, poll: Duration) {
        loop {
            let discovered: Vec<ValueSet> = directory::sources()
                .iter()
                .map(|source| stream_settings_for(source))
                .collect();

            let mut state = shared.state.lock();
            if state.shutdown {
                return;
            }
            if state.current != discovered {
                state.current = discovered;
                drop(state);
                host.event(EventCategory::StreamsChanged);
                state = shared.state.lock();
            }
            let _ = shared.signal.wait_for(&mut state, poll);
            if state.shutdown {
                return;
            }
        }
    }
}

impl Drop for PatternDevice {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.signal.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl StreamDevice for PatternDevice {
    fn initialize(&mut self, host: HostContext) -> Result<()> {
        let poll = Duration::from_millis(
            self.settings
                .get("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS),
        );
        let shared = Arc::clone(&self.shared);
        let worker = std::thread::Builder::new()
            .name("pattern-discovery".to_string())
            .spawn(move || Self::discovery_loop(shared, host, poll))
            .map_err(|error| BridgeError::Device(format!("spawning discovery: {error}")))?;
        self.worker = Some(worker);
        Ok(())
    }

    fn update_settings(&mut self, settings: ValueSet) -> bool {
        // layer layout is fixed at creation; everything else may change
        if settings.get("layers", Vec::<String>::new())
            != self.settings.get("layers", Vec::<String>::new())
        {
            return false;
        }
        self.settings = settings;
        true
    }

    fn property(&mut self, name: &str) -> String {
        match name {
            property_names::NAME => "Pattern".to_string(),
            property_names::CHANNEL_COUNT => self.scene.layer_names().len().to_value(),
            "active_input_count" => self.active_inputs.len().to_value(),
            "active_output_count" => self.active_outputs.len().to_value(),
            "scene_frame_index" => self.scene.time().frame_index.to_value(),
            _ => String::new(),
        }
    }

    fn enumerate_stream_settings(&mut self) -> Vec<ValueSet> {
        self.shared.state.lock().current.clone()
    }

    fn create_input_stream(&mut self, settings: ValueSet) -> Result<Box<dyn InputStream>> {
        match settings.get_str("kind").as_str() {
            "" | "pattern" => Ok(Box::new(PatternInput::new(
                Arc::clone(&self.scene),
                settings,
            ))),
            "memory" => Ok(Box::new(MemoryFrameInput::new(settings))),
            other => Err(BridgeError::Stream(format!("unknown stream kind '{other}'"))),
        }
    }

    fn create_output_stream(&mut self, settings: ValueSet) -> Result<Box<dyn OutputStream>> {
        Ok(Box::new(MemoryOutput::new(settings)))
    }

    fn set_active_streams(&mut self, inputs: &[StreamId], outputs: &[StreamId]) -> bool {
        self.active_inputs = inputs.to_vec();
        self.active_outputs = outputs.to_vec();
        true
    }
}
