//! Sample-accurate mixing of scheduled playback units.
//!
//! The mixer is pure state: scheduled one-shot sample buffers routed through
//! gain controls with piecewise-linear ramp automation, advanced by
//! [`Mixer::render`] one output block at a time. It has no device or clock
//! of its own — the cpal output callback and the offline renderer both drive
//! it — which keeps the whole scheduling path testable without hardware.

use crate::timeline::{GainId, TimelineEvent, UnitId};
use std::collections::HashMap;
use std::sync::Arc;

/// A linear gain ramp over a frame interval.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    start: u64,
    end: u64,
    from: f32,
    to: f32,
}

/// A gain control with ramp automation.
#[derive(Debug)]
struct GainNode {
    /// Value before the first ramp begins.
    base: f32,
    /// Ramps sorted by start frame. The scheduler never overlaps them.
    ramps: Vec<Ramp>,
    /// Frame from which this gain contributes nothing.
    disconnect_at: Option<u64>,
}

impl GainNode {
    fn value_at(&self, frame: u64) -> f32 {
        if let Some(at) = self.disconnect_at
            && frame >= at
        {
            return 0.0;
        }
        let mut value = self.base;
        for ramp in &self.ramps {
            if frame >= ramp.end {
                value = ramp.to;
            } else if frame >= ramp.start {
                let span = (ramp.end - ramp.start) as f32;
                let t = (frame - ramp.start) as f32 / span;
                return ramp.from + (ramp.to - ramp.from) * t;
            } else {
                break;
            }
        }
        value
    }
}

/// A scheduled one-shot buffer.
#[derive(Debug)]
struct ScheduledUnit {
    id: UnitId,
    gain: GainId,
    /// Frame at which sample 0 sounds.
    start: u64,
    samples: Arc<[f32]>,
    /// Samples already rendered.
    pos: usize,
    /// Linear fade-in length in frames, applied to the head of the buffer.
    fade_frames: u64,
}

/// Mixing state shared by the real and offline outputs.
#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    /// Frames rendered so far; the output clock.
    frame: u64,
    next_gain: u64,
    next_unit: u64,
    gains: HashMap<GainId, GainNode>,
    units: Vec<ScheduledUnit>,
    events: Vec<TimelineEvent>,
}

impl Mixer {
    /// Create a mixer rendering mono audio at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame: 0,
            next_gain: 0,
            next_unit: 0,
            gains: HashMap::new(),
            units: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current output clock position in seconds.
    pub fn now(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    fn to_frame(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Create a gain control with the given initial value.
    pub fn create_gain(&mut self, initial: f32) -> GainId {
        let id = GainId(self.next_gain);
        self.next_gain += 1;
        self.gains.insert(
            id,
            GainNode {
                base: initial,
                ramps: Vec::new(),
                disconnect_at: None,
            },
        );
        id
    }

    /// Add a linear ramp to a gain. Unknown gain ids are ignored.
    pub fn ramp_gain(&mut self, gain: GainId, from: f32, to: f32, start_at: f64, duration: f64) {
        let start = self.to_frame(start_at);
        let end = start.max(self.to_frame(start_at + duration));
        if let Some(node) = self.gains.get_mut(&gain) {
            node.ramps.push(Ramp {
                start,
                end,
                from,
                to,
            });
            node.ramps.sort_by_key(|r| r.start);
        }
    }

    /// Silence a gain from `at` onward.
    pub fn disconnect_gain(&mut self, gain: GainId, at: f64) {
        let frame = self.to_frame(at);
        if let Some(node) = self.gains.get_mut(&gain) {
            node.disconnect_at = Some(match node.disconnect_at {
                Some(existing) => existing.min(frame),
                None => frame,
            });
        }
    }

    /// Schedule a one-shot buffer. Start times in the past are clamped to
    /// the current frame so late scheduling begins immediately.
    pub fn schedule_unit(
        &mut self,
        gain: GainId,
        samples: Arc<[f32]>,
        start_at: f64,
        fade_in: f64,
    ) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        let start = self.to_frame(start_at).max(self.frame);
        let fade_frames = self.to_frame(fade_in);
        self.units.push(ScheduledUnit {
            id,
            gain,
            start,
            samples,
            pos: 0,
            fade_frames,
        });
        id
    }

    /// Render the next block of mono output into `out`, advancing the clock
    /// by `out.len()` frames and recording a [`TimelineEvent::UnitEnded`]
    /// for every unit drained within the block.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let block_start = self.frame;
        let block_end = block_start + out.len() as u64;

        for unit in &mut self.units {
            let next_frame = unit.start + unit.pos as u64;
            if next_frame >= block_end {
                continue;
            }
            let offset = (next_frame - block_start) as usize;
            let remaining = unit.samples.len() - unit.pos;
            let span = remaining.min(out.len() - offset);
            let node = self.gains.get(&unit.gain);

            for k in 0..span {
                let idx = unit.pos + k;
                let mut amp = unit.samples[idx];
                if (idx as u64) < unit.fade_frames {
                    amp *= idx as f32 / unit.fade_frames as f32;
                }
                let gain = node.map_or(0.0, |n| n.value_at(next_frame + k as u64));
                out[offset + k] += amp * gain;
            }
            unit.pos += span;
        }

        self.frame = block_end;

        let events = &mut self.events;
        self.units.retain(|unit| {
            let done = unit.pos >= unit.samples.len() && unit.start < block_end;
            if done {
                events.push(TimelineEvent::UnitEnded(unit.id));
            }
            !done
        });
    }

    /// Drain events recorded by previous renders.
    pub fn take_events(&mut self) -> Vec<TimelineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of units scheduled or still sounding.
    pub fn active_units(&self) -> usize {
        self.units.len()
    }

    /// Evaluate a gain at a timeline position. Unknown gains read as 0.
    pub fn gain_value(&self, gain: GainId, at: f64) -> f32 {
        let frame = self.to_frame(at);
        self.gains.get(&gain).map_or(0.0, |n| n.value_at(frame))
    }
}
