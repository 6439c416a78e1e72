//! Shared test utilities used across multiple test modules.

use crate::timeline::{GainId, OutputTimeline, UnitId};
use std::sync::Arc;

/// One recorded timeline operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineOp {
    CreateGain {
        id: GainId,
        initial: f32,
    },
    RampGain {
        gain: GainId,
        from: f32,
        to: f32,
        start_at: f64,
        duration: f64,
    },
    DisconnectGain {
        gain: GainId,
        at: f64,
    },
    ScheduleUnit {
        id: UnitId,
        gain: GainId,
        samples: usize,
        start_at: f64,
        fade_in: f64,
    },
}

/// An op-recording [`OutputTimeline`] with a manually advanced clock.
///
/// Scheduler and engine unit tests assert on the recorded operations and
/// feed unit-ended events back by hand; nothing is actually mixed.
#[derive(Debug, Default)]
pub struct FakeTimeline {
    now: f64,
    next_gain: u64,
    next_unit: u64,
    /// Every operation in call order.
    pub ops: Vec<TimelineOp>,
}

impl FakeTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the fake clock.
    pub fn advance(&mut self, secs: f64) {
        self.now += secs;
    }

    /// All recorded unit schedules, in call order.
    pub fn scheduled_units(&self) -> Vec<&TimelineOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, TimelineOp::ScheduleUnit { .. }))
            .collect()
    }

    /// All recorded ramps for one gain, in call order.
    pub fn ramps_for(&self, target: GainId) -> Vec<&TimelineOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, TimelineOp::RampGain { gain, .. } if *gain == target))
            .collect()
    }
}

impl OutputTimeline for FakeTimeline {
    fn now(&self) -> f64 {
        self.now
    }

    fn create_gain(&mut self, initial: f32) -> GainId {
        let id = GainId(self.next_gain);
        self.next_gain += 1;
        self.ops.push(TimelineOp::CreateGain { id, initial });
        id
    }

    fn ramp_gain(&mut self, gain: GainId, from: f32, to: f32, start_at: f64, duration: f64) {
        self.ops.push(TimelineOp::RampGain {
            gain,
            from,
            to,
            start_at,
            duration,
        });
    }

    fn disconnect_gain(&mut self, gain: GainId, at: f64) {
        self.ops.push(TimelineOp::DisconnectGain { gain, at });
    }

    fn schedule_unit(
        &mut self,
        gain: GainId,
        samples: Arc<[f32]>,
        start_at: f64,
        fade_in: f64,
    ) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        self.ops.push(TimelineOp::ScheduleUnit {
            id,
            gain,
            samples: samples.len(),
            start_at,
            fade_in,
        });
        id
    }
}
