// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Target-frame-rate throttling.
//!
//! Decides per update tick whether a stream that requests a sub-native
//! frame rate actually advances its logic. The measured present interval is
//! tracked as an exponentially weighted mean; when the native/target ratio
//! is near-integral the limiter skips exactly 1-of-N ticks, otherwise it
//! free-runs a fixed-period accumulator and re-synchronizes whenever real
//! time has drifted past the next scheduled tick. Both branches avoid
//! rate overshoot as well as permanent drift.

use std::time::Instant;

/// Exponentially weighted running mean.
#[derive(Debug, Clone, Default)]
pub struct ExponentialMean {
    mean: f64,
}

impl ExponentialMean {
    pub fn reset(&mut self, value: f64) {
        self.mean = value;
    }

    pub fn push(&mut self, value: f64, weight: f64) {
        self.mean += weight * (value - self.mean);
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }
}

/// Monotonic time source in seconds, injectable for deterministic tests.
pub trait IntervalClock: Send {
    fn now(&self) -> f64;
}

/// Wall-clock implementation.
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl IntervalClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

const INTERVAL_MEAN_WEIGHT: f64 = 0.01;

/// Per-stream frame-rate limiter.
pub struct RenderIntervalManager {
    clock: Box<dyn IntervalClock>,
    target_frame_rate: f64,
    last_present_time: Option<f64>,
    frame_duration: ExponentialMean,
    last_frame_time: f64,
    render_interval_counter: u32,
}

impl RenderIntervalManager {
    pub fn new() -> Self {
        Self::with_clock(Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(clock: Box<dyn IntervalClock>) -> Self {
        Self {
            clock,
            target_frame_rate: 0.0,
            last_present_time: None,
            frame_duration: ExponentialMean::default(),
            last_frame_time: 0.0,
            render_interval_counter: 0,
        }
    }

    /// Zero disables throttling.
    pub fn set_target_frame_rate(&mut self, frame_rate: f64) {
        self.target_frame_rate = frame_rate;
    }

    /// Call once per native tick. Returns whether the stream should advance
    /// its logic this tick.
    pub fn update(&mut self) -> bool {
        self.update_frame_duration();
        self.update_render_interval()
    }

    fn update_frame_duration(&mut self) {
        let now = self.clock.now();
        if let Some(last) = self.last_present_time {
            let frame_duration = now - last;
            if self.frame_duration.mean() == 0.0 {
                self.frame_duration.reset(frame_duration);
            } else {
                self.frame_duration.push(frame_duration, INTERVAL_MEAN_WEIGHT);
            }
        }
        self.last_present_time = Some(now);
    }

    fn update_render_interval(&mut self) -> bool {
        if self.target_frame_rate == 0.0 {
            return true;
        }

        let mean = self.frame_duration.mean();
        if mean == 0.0 {
            return false;
        }
        let actual_frame_rate = (1.0 / mean).round();
        if actual_frame_rate == 0.0 || !actual_frame_rate.is_finite() {
            return false;
        }
        if self.target_frame_rate > actual_frame_rate {
            return true;
        }

        // skip exactly every nth tick when the ratio is almost integral
        let ratio = actual_frame_rate / self.target_frame_rate;
        let fraction = ratio.fract();
        let swap_interval = ratio.round() as u32;
        if (2..10).contains(&swap_interval) && (fraction > 0.9 || fraction < 0.1) {
            let counter = self.render_interval_counter;
            self.render_interval_counter += 1;
            if counter % swap_interval != 0 {
                return false;
            }
        } else {
            let now = self.clock.now();
            let frame_duration = 1.0 / self.target_frame_rate;
            if now < self.last_frame_time + frame_duration {
                return false;
            }
            self.last_frame_time += frame_duration;
            if self.last_frame_time + frame_duration <= now {
                // drifted past the next scheduled tick: re-synchronize
                self.last_frame_time = now;
            }
        }
        true
    }
}

impl Default for RenderIntervalManager {
    fn default() -> Self {
        Self::new()
    }
}
