// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Boundary Protocol Integration Test
//!
//! Drives a test-only extension through the dispatch tables — not the
//! traits — so the boundary itself is under test: creation failure maps to
//! null/None, panics convert to Failed signals plus events, settings
//! updates are gated on actual change, fence counters advance by exactly
//! two per successful render and zero on failure, and every object is
//! released exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bridgelib::core::error::Result;
use bridgelib::core::{
    EventCategory, Extension, FenceTimeline, HostContext, InputStream, OutputStream, ParameterSet,
    ParameterType, ParameterValue, RenderResult, SoftwareFence, SoftwareFenceOps, StreamDevice,
    SyncDesc, TimelineFence, ValueSet,
};
use bridgelib::host::{Host, RenderDriver};
use bridgelib::prelude::property_names;

// =============================================================================
// Test-only extension (not part of the library)
// =============================================================================

#[derive(Default)]
struct TestStats {
    input_released: AtomicUsize,
    settings_applied: AtomicUsize,
    fail_render: AtomicBool,
    panic_render: AtomicBool,
    skip_update: AtomicBool,
}

struct TestExtension {
    stats: Arc<TestStats>,
}

impl Extension for TestExtension {
    fn initialize(&mut self, _host: HostContext) -> Result<()> {
        Ok(())
    }

    fn create_stream_device(&mut self, _settings: ValueSet) -> Result<Box<dyn StreamDevice>> {
        Ok(Box::new(TestDevice {
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct TestDevice {
    stats: Arc<TestStats>,
}

impl StreamDevice for TestDevice {
    fn create_input_stream(&mut self, settings: ValueSet) -> Result<Box<dyn InputStream>> {
        if settings.get("fail_create", false) {
            return Err(bridgelib::BridgeError::Stream("creation refused".into()));
        }
        let fence = SoftwareFence::create();
        let timeline = FenceTimeline::new(fence.share_handle());
        let mut parameters = ParameterSet::new();
        let time = parameters.add_parameter(ParameterType::Value, "time");
        time.set_property(property_names::PURPOSE, "TimelineTime");
        parameters.add_output_parameter(ParameterType::Texture, "sampler");
        Ok(Box::new(TestInput {
            stats: Arc::clone(&self.stats),
            parameters,
            fence,
            timeline,
        }))
    }

    fn create_output_stream(&mut self, _settings: ValueSet) -> Result<Box<dyn OutputStream>> {
        Err(bridgelib::BridgeError::NotSupported("no outputs".into()))
    }
}

struct TestInput {
    stats: Arc<TestStats>,
    parameters: ParameterSet,
    fence: Arc<SoftwareFence>,
    timeline: FenceTimeline,
}

impl Drop for TestInput {
    fn drop(&mut self) {
        self.stats.input_released.fetch_add(1, Ordering::SeqCst);
    }
}

impl InputStream for TestInput {
    fn update_settings(&mut self, settings: ValueSet) -> bool {
        if settings.get("reject", false) {
            return false;
        }
        self.stats.settings_applied.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn update(&mut self) -> bool {
        !self.stats.skip_update.load(Ordering::SeqCst)
    }

    fn before_render(&mut self) -> SyncDesc {
        self.timeline.sync_desc()
    }

    fn render(&mut self) -> RenderResult {
        if self.stats.panic_render.load(Ordering::SeqCst) {
            panic!("simulated extension fault");
        }
        if self.stats.fail_render.load(Ordering::SeqCst) {
            return RenderResult::Failed;
        }
        let ticket = self.timeline.begin_render();
        self.fence.wait(ticket.wait_value);
        self.fence.signal(ticket.signal_value);
        self.timeline.commit(ticket);
        RenderResult::Succeeded
    }

    fn after_render(&mut self) -> SyncDesc {
        self.timeline.sync_desc()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_extension_answers_api_version() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::new(TestStats::default()),
        }))
        .unwrap();
    let version = driver
        .extension_property(ext, property_names::API_VERSION)
        .unwrap();
    assert!(!version.is_empty());
}

#[test]
fn test_device_name_defaults_to_readable() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
    // the default device name must always be readable or the host treats
    // the device as lost
    assert_eq!(
        driver.device_property(device, property_names::NAME).unwrap(),
        "Device"
    );
}

#[test]
fn test_failed_creation_maps_to_error_not_a_handle() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();

    let mut refuse = ValueSet::new();
    refuse.set("fail_create", true);
    assert!(driver.create_input_stream(device, refuse).is_err());
    assert!(driver.create_output_stream(device, ValueSet::new()).is_err());

    // the failure was reported through the event channel
    let events = host.drain_events();
    assert!(events.iter().any(|e| e.category == EventCategory::Message));
}

#[test]
fn test_fence_advances_two_per_success_and_zero_on_failure() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
    let stream = driver.create_input_stream(device, ValueSet::new()).unwrap();

    let value_after = |driver: &mut RenderDriver| {
        let input = driver.input_mut(device, stream).unwrap();
        input.after_render().value
    };

    let report = driver.render_frame();
    assert_eq!(report.rendered, vec![(stream, RenderResult::Succeeded)]);
    assert_eq!(value_after(&mut driver), 2);

    let report = driver.render_frame();
    assert_eq!(report.rendered, vec![(stream, RenderResult::Succeeded)]);
    assert_eq!(value_after(&mut driver), 4);

    stats.fail_render.store(true, Ordering::SeqCst);
    let report = driver.render_frame();
    assert_eq!(report.rendered, vec![(stream, RenderResult::Failed)]);
    assert_eq!(value_after(&mut driver), 4);
    assert!(report.fence_violations.is_empty());

    // a subsequent success resumes from the last advanced counter
    stats.fail_render.store(false, Ordering::SeqCst);
    driver.render_frame();
    assert_eq!(value_after(&mut driver), 6);
}

#[test]
fn test_panicking_render_becomes_failed_plus_event() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
    let stream = driver.create_input_stream(device, ValueSet::new()).unwrap();

    stats.panic_render.store(true, Ordering::SeqCst);
    let report = driver.render_frame();
    assert_eq!(report.rendered, vec![(stream, RenderResult::Failed)]);

    let events = host.drain_events();
    assert!(
        events
            .iter()
            .any(|e| e.category == EventCategory::Failed && e.message.contains("panicked")),
        "expected a Failed event, got {events:?}"
    );

    // the boundary stays usable after the fault
    stats.panic_render.store(false, Ordering::SeqCst);
    let report = driver.render_frame();
    assert_eq!(report.rendered, vec![(stream, RenderResult::Succeeded)]);
}

#[test]
fn test_settings_updates_are_gated_on_change() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
    let mut initial = ValueSet::new();
    initial.set("quality", 1);
    let stream = driver.create_input_stream(device, initial.clone()).unwrap();

    // identical settings: no update_settings call
    driver.update_stream_settings(device, stream, initial.clone()).unwrap();
    driver.render_frame();
    assert_eq!(stats.settings_applied.load(Ordering::SeqCst), 0);

    // changed settings: applied once
    let mut changed = initial.clone();
    changed.set("quality", 2);
    driver.update_stream_settings(device, stream, changed.clone()).unwrap();
    driver.render_frame();
    assert_eq!(stats.settings_applied.load(Ordering::SeqCst), 1);

    // re-sending the now-applied settings: no further call
    driver.update_stream_settings(device, stream, changed).unwrap();
    driver.render_frame();
    assert_eq!(stats.settings_applied.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rejected_settings_keep_previous_configuration() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
    let stream = driver.create_input_stream(device, ValueSet::new()).unwrap();

    let mut rejected = ValueSet::new();
    rejected.set("reject", true);
    driver.update_stream_settings(device, stream, rejected.clone()).unwrap();
    driver.render_frame();
    assert_eq!(stats.settings_applied.load(Ordering::SeqCst), 0);

    // the rejected set was not recorded as applied: sending it again
    // retries the update
    driver.update_stream_settings(device, stream, rejected).unwrap();
    driver.render_frame();
    assert_eq!(stats.settings_applied.load(Ordering::SeqCst), 0);
}

#[test]
fn test_parameters_cross_the_boundary_by_reference() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
    let stream = driver.create_input_stream(device, ValueSet::new()).unwrap();

    let input = driver.input_mut(device, stream).unwrap();
    assert_eq!(input.parameter_count(), 2);

    let time = input.find_parameter("time").expect("time parameter");
    assert_eq!(time.param_type(), ParameterType::Value);
    assert!(time.set_value(ParameterValue::Value(1.25)));
    assert!(matches!(time.value(), ParameterValue::Value(v) if v == 1.25));

    // fail closed on a tag mismatch
    assert!(!time.set_value(ParameterValue::Int(3)));
    assert!(matches!(time.value(), ParameterValue::Value(v) if v == 1.25));

    // lookup by property and the same object through both paths
    let by_purpose = input
        .find_parameter_by_property(property_names::PURPOSE, "TimelineTime")
        .expect("by purpose");
    assert_eq!(by_purpose.name(), "time");

    let sampler = input.find_parameter("sampler").expect("sampler");
    assert_eq!(sampler.property(property_names::DIRECTION), "out");
    assert!(input.parameter(99).is_none());
}

#[test]
fn test_streams_release_exactly_once() {
    let stats = {
        let host = Host::default();
        let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
        let stats = Arc::new(TestStats::default());
        let ext = driver
            .attach(Box::new(TestExtension {
                stats: Arc::clone(&stats),
            }))
            .unwrap();
        let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
        driver.create_input_stream(device, ValueSet::new()).unwrap();
        driver.create_input_stream(device, ValueSet::new()).unwrap();
        // driver drop releases streams, then devices, then the extension
        stats
    };
    assert_eq!(stats.input_released.load(Ordering::SeqCst), 2);
}

#[test]
fn test_skipped_update_skips_the_render_triad() {
    let host = Host::default();
    let mut driver = RenderDriver::new(host.services(), Box::new(SoftwareFenceOps));
    let stats = Arc::new(TestStats::default());
    let ext = driver
        .attach(Box::new(TestExtension {
            stats: Arc::clone(&stats),
        }))
        .unwrap();
    let device = driver.create_stream_device(ext, ValueSet::new()).unwrap();
    let stream = driver.create_input_stream(device, ValueSet::new()).unwrap();

    stats.skip_update.store(true, Ordering::SeqCst);
    let report = driver.render_frame();
    assert_eq!(report.skipped, vec![stream]);
    assert!(report.rendered.is_empty());

    let input = driver.input_mut(device, stream).unwrap();
    assert_eq!(input.after_render().value, 0);
}
