//! Output timeline abstraction.
//!
//! The playback scheduler talks to the audio output only through
//! [`OutputTimeline`]: it schedules one-shot sample buffers ("units") routed
//! through gain controls, ramps those gains, and is told when a unit has
//! finished playing. Real output is [`crate::audio::output::CpalOutput`];
//! tests and the render harness use [`crate::audio::offline::OfflineRenderer`].

use std::sync::Arc;

/// Handle to a gain control on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GainId(pub u64);

/// Handle to a scheduled playback unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub u64);

/// Events emitted by the output clock back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEvent {
    /// A scheduled unit has played to completion.
    UnitEnded(UnitId),
}

/// Sample-accurate audio output timeline.
///
/// Times are in seconds on the output clock, which starts at zero and
/// advances as audio is rendered. Implementations must tolerate `start_at`
/// values in the past by starting immediately.
pub trait OutputTimeline {
    /// Current position of the output clock in seconds.
    fn now(&self) -> f64;

    /// Create a gain control with the given initial value.
    fn create_gain(&mut self, initial: f32) -> GainId;

    /// Linearly ramp a gain from `from` to `to`, starting at `start_at` and
    /// lasting `duration` seconds.
    fn ramp_gain(&mut self, gain: GainId, from: f32, to: f32, start_at: f64, duration: f64);

    /// Disconnect a gain at time `at`: from then on it contributes nothing.
    fn disconnect_gain(&mut self, gain: GainId, at: f64);

    /// Schedule a one-shot sample buffer through `gain`, starting at
    /// `start_at`, with a linear amplitude fade-in over the first `fade_in`
    /// seconds of the unit. A [`TimelineEvent::UnitEnded`] is delivered when
    /// the buffer has fully played.
    fn schedule_unit(&mut self, gain: GainId, samples: Arc<[f32]>, start_at: f64, fade_in: f64)
    -> UnitId;
}
