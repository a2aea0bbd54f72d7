// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! CPU pattern input stream: one layer of the device's shared scene.
//!
//! Paints a deterministic gradient pattern into a host texture every
//! frame the limiter lets through, as long as the bound source is still
//! announced in the directory. Render triads go through the scene's
//! timeline fence.

use std::sync::Arc;

use bridgelib::core::error::Result;
use bridgelib::prelude::*;
use bridgelib::core::{PlaneBuf, RenderIntervalManager, SyncDesc};

use crate::directory;
use crate::scene::Scene;

const DEFAULT_RESOLUTION: u32 = 256;
const DEFAULT_MAX_TIME_ELAPSED: f64 = 0.050;

pub struct PatternInput {
    scene: Arc<Scene>,
    member: u64,
    handle: String,
    settings: ValueSet,
    parameters: ParameterSet,
    sampler: Arc<Parameter>,
    time: Arc<Parameter>,
    visible: Arc<Parameter>,
    layer_index: Arc<Parameter>,
    interval: RenderIntervalManager,
    host: Option<HostContext>,
    prev_time: f64,
    max_time_elapsed: f64,
    video_requested: bool,
    audio_requested: bool,
    audio_phase: f64,
}

impl PatternInput {
    pub fn new(scene: Arc<Scene>, settings: ValueSet) -> Self {
        let member = scene.register();
        let handle = settings.get_str(setting_names::HANDLE);

        let mut parameters = ParameterSet::new();
        let layer_index = parameters.add_parameter(ParameterType::Int, "layer_index");
        layer_index.set_property(property_names::PURPOSE, purpose_names::LAYER_INDEX);
        layer_index.set_property(property_names::MIN_VALUE, 0);
        layer_index.set_property(
            property_names::MAX_VALUE,
            scene.layer_names().len().saturating_sub(1),
        );

        let time = parameters.add_parameter(ParameterType::Value, "time");
        time.set_property(property_names::PURPOSE, purpose_names::TIMELINE_TIME);

        let visible = parameters.add_internal_parameter(ParameterType::Bool, "visible");
        visible.set_value(ParameterValue::Bool(true));
        visible.set_property(property_names::PURPOSE, purpose_names::VISIBLE);

        let alpha = parameters.add_internal_parameter(ParameterType::Value, "alpha");
        alpha.set_value(ParameterValue::Value(1.0));

        let sampler =
            parameters.add_output_parameter(ParameterType::Texture, parameter_names::SAMPLER);

        Self {
            scene,
            member,
            handle,
            settings,
            parameters,
            sampler,
            time,
            visible,
            layer_index,
            interval: RenderIntervalManager::new(),
            host: None,
            prev_time: 0.0,
            max_time_elapsed: DEFAULT_MAX_TIME_ELAPSED,
            video_requested: true,
            audio_requested: false,
            audio_phase: 0.0,
        }
    }

    fn recreate_target(&mut self) -> bool {
        let Some(host) = &self.host else {
            return false;
        };
        let mut width = self
            .settings
            .get(setting_names::RESOLUTION_X, DEFAULT_RESOLUTION);
        let mut height = self
            .settings
            .get(setting_names::RESOLUTION_Y, DEFAULT_RESOLUTION);
        if self.settings.get(setting_names::PREVIEW, false) {
            width /= 4;
            height /= 4;
        }
        let format = PixelFormat::by_name(
            &self.settings.get_str(setting_names::FORMAT),
            PixelFormat::Rgba8Unorm,
        );
        let desc = TextureDesc {
            width: width.max(1),
            height: height.max(1),
            format,
            is_target: true,
            share_handle: ShareHandle::none(),
        };
        match host.create_texture(&desc) {
            Some(texture) => {
                self.sampler.set_texture(Some(texture));
                true
            }
            None => false,
        }
    }

    fn push_audio(&mut self) {
        let Some(host) = &self.host else { return };
        let sample_rate = 48_000u32;
        let samples = 480; // 10 ms
        let mut channel = Vec::with_capacity(samples);
        for _ in 0..samples {
            channel.push((self.audio_phase * std::f64::consts::TAU).sin() as f32);
            self.audio_phase = (self.audio_phase + 440.0 / sample_rate as f64).fract();
        }
        host.send_audio_frame(
            AudioFrame {
                sample_rate,
                channels: vec![channel],
            },
            Box::new(|| {}),
        );
    }
}

impl Drop for PatternInput {
    fn drop(&mut self) {
        self.scene.deregister(self.member);
    }
}

impl InputStream for PatternInput {
    fn initialize(&mut self, host: HostContext) -> Result<()> {
        host.log_info(&format!("initializing pattern stream '{}'", self.handle));
        self.host = Some(host);
        let settings = std::mem::take(&mut self.settings);
        if !self.update_settings(settings) {
            return Err(BridgeError::Stream(format!(
                "pattern stream '{}' rejected its initial settings",
                self.handle
            )));
        }
        Ok(())
    }

    fn update_settings(&mut self, settings: ValueSet) -> bool {
        self.settings = settings;
        self.interval
            .set_target_frame_rate(self.settings.get(setting_names::FRAME_RATE, 0.0));
        self.max_time_elapsed = self
            .settings
            .get("max_time_elapsed", DEFAULT_MAX_TIME_ELAPSED);
        self.recreate_target()
    }

    fn property(&mut self, name: &str) -> String {
        if name == property_names::LAYER_NAMES {
            return self.scene.layer_names().to_vec().to_value();
        }
        String::new()
    }

    fn state(&mut self) -> ValueSet {
        let desc = self
            .sampler
            .texture()
            .map(|t| t.desc())
            .unwrap_or_default();
        let mut state = ValueSet::new();
        state.set(state_names::RESOLUTION_X, desc.width);
        state.set(state_names::RESOLUTION_Y, desc.height);
        state.set(state_names::FORMAT, desc.format.name());
        state.set(
            state_names::FRAME_RATE,
            self.settings.get(setting_names::FRAME_RATE, 0.0),
        );
        state.set(state_names::SCALE_Y, -1);
        state
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn set_video_requested(&mut self, requested: bool) {
        self.video_requested = requested;
    }

    fn set_audio_requested(&mut self, requested: bool) {
        self.audio_requested = requested;
    }

    fn update(&mut self) -> bool {
        // skip update/rendering when a target frame rate is set
        if !self.interval.update() {
            return false;
        }

        let time = self.time.float_value();
        let elapsed = (time - self.prev_time).clamp(0.0, self.max_time_elapsed);
        self.prev_time = time;

        // update while visible or when time changed
        if !self.visible.bool_value() && elapsed == 0.0 {
            return false;
        }

        // only the first stream per scene pushes time updates
        if self.scene.is_driver(self.member) {
            self.scene.set_time(time, elapsed);
        }

        if self.audio_requested {
            self.push_audio();
        }
        true
    }

    fn before_render(&mut self) -> SyncDesc {
        self.scene.sync_desc()
    }

    fn render(&mut self) -> RenderResult {
        if !self.video_requested {
            return RenderResult::Succeeded;
        }
        let Some(host) = self.host.clone() else {
            return RenderResult::Failed;
        };
        let Some(texture) = self.sampler.texture() else {
            return RenderResult::Failed;
        };
        let handle = self.handle.clone();
        let layer = self.layer_index.int_value().max(0) as u32;
        self.scene.render(move |scene_time| {
            // a withdrawn source produces no frame
            if !directory::is_announced(&handle) {
                return false;
            }
            let desc = texture.desc();
            let bpp = desc.format.bytes_per_pixel().max(1);
            let pitch = desc.width as usize * bpp;
            let mut pixels = vec![0u8; pitch * desc.height as usize];
            let phase = (scene_time.time.fract() * 255.0) as u8;
            for y in 0..desc.height as usize {
                for x in 0..desc.width as usize {
                    let offset = y * pitch + x * bpp;
                    pixels[offset] = phase.wrapping_add((x + layer as usize) as u8);
                    if bpp >= 2 {
                        pixels[offset + 1] = y as u8;
                    }
                    if bpp >= 4 {
                        pixels[offset + 3] = 0xFF;
                    }
                }
            }
            host.upload_texture(
                &texture,
                &PlaneBuf {
                    data: pixels,
                    pitch,
                },
                Box::new(|| {}),
            );
            true
        })
    }

    fn after_render(&mut self) -> SyncDesc {
        self.scene.sync_desc()
    }
}
