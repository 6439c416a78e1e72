//! Offline rendering of the output timeline.
//!
//! Drives the same [`Mixer`] as the real cpal output, but renders into
//! memory on demand. Integration tests and the render harness use this to
//! exercise the full scheduling path deterministically.

use crate::audio::mixer::Mixer;
use crate::timeline::{GainId, OutputTimeline, TimelineEvent, UnitId};
use std::sync::Arc;

/// In-memory output timeline.
pub struct OfflineRenderer {
    mixer: Mixer,
    rendered: Vec<f32>,
}

impl OfflineRenderer {
    /// Create a renderer at the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            mixer: Mixer::new(sample_rate),
            rendered: Vec::new(),
        }
    }

    /// Render the next `frames` frames, returning any unit-ended events the
    /// block produced.
    pub fn step(&mut self, frames: usize) -> Vec<TimelineEvent> {
        let mut block = vec![0.0f32; frames];
        self.mixer.render(&mut block);
        self.rendered.extend_from_slice(&block);
        self.mixer.take_events()
    }

    /// Render `secs` seconds of output.
    pub fn step_secs(&mut self, secs: f64) -> Vec<TimelineEvent> {
        let frames = (secs * self.mixer.sample_rate() as f64).round() as usize;
        self.step(frames)
    }

    /// All audio rendered so far.
    pub fn rendered(&self) -> &[f32] {
        &self.rendered
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    /// Units scheduled or still sounding.
    pub fn active_units(&self) -> usize {
        self.mixer.active_units()
    }

    /// Evaluate a gain at a timeline position.
    pub fn gain_value(&self, gain: GainId, at: f64) -> f32 {
        self.mixer.gain_value(gain, at)
    }
}

impl OutputTimeline for OfflineRenderer {
    fn now(&self) -> f64 {
        self.mixer.now()
    }

    fn create_gain(&mut self, initial: f32) -> GainId {
        self.mixer.create_gain(initial)
    }

    fn ramp_gain(&mut self, gain: GainId, from: f32, to: f32, start_at: f64, duration: f64) {
        self.mixer.ramp_gain(gain, from, to, start_at, duration);
    }

    fn disconnect_gain(&mut self, gain: GainId, at: f64) {
        self.mixer.disconnect_gain(gain, at);
    }

    fn schedule_unit(
        &mut self,
        gain: GainId,
        samples: Arc<[f32]>,
        start_at: f64,
        fade_in: f64,
    ) -> UnitId {
        self.mixer.schedule_unit(gain, samples, start_at, fade_in)
    }
}
