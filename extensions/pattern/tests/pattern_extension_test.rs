// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pattern Extension End-To-End Test
//!
//! Runs the full protocol scenario against the sample extension, through
//! the exported declaration (open/close) and the dispatch tables: discover
//! sources, create a device and streams, drive the per-frame sequence and
//! verify render results, fence-counter advancement, shared-scene update
//! coalescing, bounded memory queues and the consumer-detection chain.

use std::time::Duration;

use bridgelib::core::{
    EventCategory, ParameterValue, RenderResult, SharedTexture, SoftwareFenceOps, ValueSet,
};
use bridgelib::host::{DeviceId, Host, RenderDriver};
use bridgelib::prelude::{property_names, setting_names, state_names};
use bridgelib_ext_pattern::{BRIDGELIB_EXTENSION, directory};
use bridgelib_extension_abi::EXTENSION_ABI_VERSION;

fn open_driver() -> (Host, RenderDriver, bridgelib::host::ExtensionId) {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let raw = unsafe { (BRIDGELIB_EXTENSION.open)() };
    let ext = unsafe { driver.attach_raw(raw, BRIDGELIB_EXTENSION.close) }.expect("attach");
    (host, driver, ext)
}

fn fast_device(driver: &mut RenderDriver, ext: bridgelib::host::ExtensionId) -> DeviceId {
    let mut settings = ValueSet::new();
    settings.set("poll_interval_ms", 10u64);
    driver.create_stream_device(ext, settings).expect("device")
}

/// Wait until the device's discovery thread reports our source.
fn wait_for_source(host: &Host, driver: &mut RenderDriver, device: DeviceId, handle: &str) -> ValueSet {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(event) = host.events().recv_timeout(Duration::from_millis(100)) {
            if event.category != EventCategory::StreamsChanged {
                continue;
            }
        }
        let found = driver
            .enumerate_stream_settings(device)
            .expect("enumerate")
            .into_iter()
            .find(|entry| entry.get_str(setting_names::HANDLE) == handle);
        if let Some(entry) = found {
            return entry;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "source '{handle}' never discovered"
        );
    }
}

#[test]
fn test_declaration_matches_host_abi() {
    assert_eq!(BRIDGELIB_EXTENSION.abi_version, EXTENSION_ABI_VERSION);
}

#[test]
fn test_extension_identity_properties() {
    let (_host, mut driver, ext) = open_driver();
    assert_eq!(
        driver.extension_property(ext, property_names::NAME).unwrap(),
        "Pattern"
    );
    assert!(
        !driver
            .extension_property(ext, property_names::API_VERSION)
            .unwrap()
            .is_empty()
    );
    let devices = driver.enumerate_stream_device_settings(ext).unwrap();
    assert_eq!(devices.len(), 1);
}

#[test]
fn test_discovery_scenario_end_to_end() {
    let (host, mut driver, ext) = open_driver();
    let device = fast_device(&mut driver, ext);

    directory::announce_source("e2e-cam");
    let entry = wait_for_source(&host, &mut driver, device, "e2e-cam");
    assert_eq!(entry.get_str(setting_names::NAME), "e2e-cam");

    // the settings description is valid JSON with typed entries
    let desc: serde_json::Value =
        serde_json::from_str(&entry.get_str(setting_names::SETTINGS_DESC)).expect("valid json");
    assert_eq!(desc["resolution_x"]["type"], "int");
    assert_eq!(desc["kind"]["type"], "enum");

    // create an input stream from the discovered entry, small for speed
    let mut settings = entry.clone();
    settings.set(setting_names::RESOLUTION_X, 16);
    settings.set(setting_names::RESOLUTION_Y, 8);
    let stream = driver.create_input_stream(device, settings).expect("input");

    // drive the frame sequence; the fence advances by exactly two per
    // successful render
    for frame in 1..=3u64 {
        {
            let input = driver.input_mut(device, stream).unwrap();
            let time = input.find_parameter("time").unwrap();
            time.set_value(ParameterValue::Value(frame as f64 / 60.0));
        }
        let report = driver.render_frame();
        assert_eq!(report.rendered, vec![(stream, RenderResult::Succeeded)]);
        let input = driver.input_mut(device, stream).unwrap();
        assert_eq!(input.after_render().value, frame * 2);
    }

    // the sampler texture holds the painted pattern
    {
        let input = driver.input_mut(device, stream).unwrap();
        let sampler = input.find_parameter("sampler").unwrap();
        let ParameterValue::Texture(Some(texture)) = sampler.value() else {
            panic!("sampler carries no texture");
        };
        assert_eq!(texture.desc().width, 16);
        let pixels = SharedTexture::from_ref(&texture).unwrap().read_pixels();
        assert!(pixels.iter().any(|&b| b != 0), "pattern was not painted");
    }

    // state reflects the negotiated mode
    let state = driver.input_mut(device, stream).unwrap().state();
    assert_eq!(state.get(state_names::RESOLUTION_X, 0u32), 16);
    assert_eq!(state.get_str(state_names::FORMAT), "R8G8B8A8_UNORM");

    // a vanished source fails the render and freezes the fence
    directory::withdraw_source("e2e-cam");
    let report = driver.render_frame();
    assert_eq!(report.rendered, vec![(stream, RenderResult::Failed)]);
    let frozen = driver.input_mut(device, stream).unwrap().after_render().value;
    assert_eq!(frozen, 6);

    // and a re-announced one resumes from the next counter pair
    directory::announce_source("e2e-cam");
    let report = driver.render_frame();
    assert_eq!(report.rendered, vec![(stream, RenderResult::Succeeded)]);
    assert_eq!(
        driver.input_mut(device, stream).unwrap().after_render().value,
        8
    );
    directory::withdraw_source("e2e-cam");
}

#[test]
fn test_shared_scene_updates_once_per_tick() {
    let (_host, mut driver, ext) = open_driver();
    let mut device_settings = ValueSet::new();
    device_settings.set("poll_interval_ms", 10u64);
    device_settings.set("layers", vec!["Front".to_string(), "Back".to_string()]);
    let device = driver.create_stream_device(ext, device_settings).unwrap();

    directory::announce_source("scene-src");
    let mut settings = ValueSet::new();
    settings.set(setting_names::HANDLE, "scene-src");
    settings.set(setting_names::RESOLUTION_X, 8);
    settings.set(setting_names::RESOLUTION_Y, 8);

    let first = driver.create_input_stream(device, settings.clone()).unwrap();
    let second = driver.create_input_stream(device, settings).unwrap();

    for frame in 1..=4u64 {
        for stream in [first, second] {
            let input = driver.input_mut(device, stream).unwrap();
            let time = input.find_parameter("time").unwrap();
            time.set_value(ParameterValue::Value(frame as f64 / 30.0));
        }
        driver.render_frame();
    }

    // with two streams registered, exactly one time push happened per tick
    let pushes: u64 = driver
        .device_property(device, "scene_frame_index")
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(pushes, 4);

    // the device saw both streams as active
    assert_eq!(
        driver.device_property(device, "active_input_count").unwrap(),
        "2"
    );

    // releasing the first stream passes the driver role to the second
    driver.release_stream(device, first).unwrap();
    {
        let input = driver.input_mut(device, second).unwrap();
        let time = input.find_parameter("time").unwrap();
        time.set_value(ParameterValue::Value(1.0));
    }
    driver.render_frame();
    let pushes: u64 = driver
        .device_property(device, "scene_frame_index")
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(pushes, 5);
    directory::withdraw_source("scene-src");
}

#[test]
fn test_memory_output_presents_composited_frames() {
    let (_host, mut driver, ext) = open_driver();
    let device = fast_device(&mut driver, ext);

    let mut settings = ValueSet::new();
    settings.set(setting_names::HANDLE, "out-basic");
    settings.set(setting_names::RESOLUTION_X, 4);
    settings.set(setting_names::RESOLUTION_Y, 2);
    settings.set(setting_names::FORMAT, "BGRA8");
    let output = driver.create_output_stream(device, settings).unwrap();

    for _ in 0..3 {
        let report = driver.render_frame_with(&mut |_, target| {
            if let Some(shared) = SharedTexture::from_ref(target) {
                let pitch = shared.row_pitch();
                shared.write_pixels(&vec![0xAB; pitch * 2], pitch);
            }
        });
        assert_eq!(report.presented, vec![output]);
    }

    let state = driver.output_mut(device, output).unwrap().state();
    assert_eq!(state.get("frames_delivered", 0u64), 3);
    assert_eq!(state.get(state_names::RESOLUTION_X, 0u32), 4);
}

#[test]
fn test_consumer_detection_gates_the_target() {
    let (_host, mut driver, ext) = open_driver();
    let device = fast_device(&mut driver, ext);

    let mut settings = ValueSet::new();
    settings.set(setting_names::HANDLE, "out-detect");
    settings.set(setting_names::RESOLUTION_X, 4);
    settings.set(setting_names::RESOLUTION_Y, 2);
    settings.set("detect_consumers", true);
    settings.set("consumer_poll_ms", 10u64);
    let output = driver.create_output_stream(device, settings).unwrap();

    // no consumer connected: the probe withdraws the target
    std::thread::sleep(Duration::from_millis(80));
    let report = driver.render_frame();
    assert_eq!(report.skipped, vec![output]);
    assert!(report.presented.is_empty());

    // consumer connects: the next probe re-enables video
    directory::announce_consumer("out-detect");
    std::thread::sleep(Duration::from_millis(80));
    let report = driver.render_frame();
    assert_eq!(report.presented, vec![output]);
    directory::withdraw_consumer("out-detect");
}

#[test]
fn test_memory_input_bounds_its_frame_queue() {
    let (_host, mut driver, ext) = open_driver();
    let device = fast_device(&mut driver, ext);

    let mut settings = ValueSet::new();
    settings.set(setting_names::HANDLE, "mem-src");
    settings.set("kind", "memory");
    let stream = driver.create_input_stream(device, settings).unwrap();
    driver
        .input_mut(device, stream)
        .unwrap()
        .set_video_requested(true);

    // six queued frames, capacity four: the two newest are dropped
    for index in 0u8..6 {
        directory::push_frame(
            "mem-src",
            bridgelib::core::VideoFrame {
                width: 2,
                height: 1,
                pixel_format: "RGBA8".to_string(),
                planes: vec![bridgelib::core::PlaneBuf {
                    data: vec![index + 1; 8],
                    pitch: 8,
                }],
            },
        );
    }

    let mut seen = Vec::new();
    for _ in 0..6 {
        driver.render_frame();
        let input = driver.input_mut(device, stream).unwrap();
        let sampler = input.find_parameter("sampler").unwrap();
        if let ParameterValue::TextureSet(textures) = sampler.value() {
            if let Some(texture) = textures.first() {
                let pixels = SharedTexture::from_ref(texture).unwrap().read_pixels();
                seen.push(pixels[0]);
            }
        }
    }

    // frame 1 is promoted on the same tick the six frames were queued, so
    // frames 1..=4 fit and 5/6 were dropped; delivery stays FIFO and the
    // last retained frame remains current afterwards
    assert_eq!(seen, vec![1, 2, 3, 4, 4, 4]);

    let state = driver.input_mut(device, stream).unwrap().state();
    assert_eq!(state.get(state_names::RESOLUTION_X, 0u32), 2);
    assert_eq!(state.get_str(state_names::PIXEL_FORMAT), "RGBA8");
}

#[test]
fn test_audio_flows_to_the_host_mixer() {
    let (host, mut driver, ext) = open_driver();
    let device = fast_device(&mut driver, ext);

    directory::announce_source("audio-src");
    let mut settings = ValueSet::new();
    settings.set(setting_names::HANDLE, "audio-src");
    settings.set(setting_names::RESOLUTION_X, 4);
    settings.set(setting_names::RESOLUTION_Y, 4);
    let stream = driver.create_input_stream(device, settings).unwrap();
    driver
        .input_mut(device, stream)
        .unwrap()
        .set_audio_requested(true);

    driver.render_frame();
    driver.render_frame();

    let frames = host.take_audio_frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].sample_rate, 48_000);
    assert_eq!(frames[0].channels.len(), 1);
    directory::withdraw_source("audio-src");
}
