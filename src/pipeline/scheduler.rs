//! Playback scheduling: drains utterance chunk queues onto the output
//! timeline and chains same-owner utterances with a crossfade.
//!
//! Playback is driven by two events only: a chunk arriving while no chain
//! is active (chain start) and a scheduled unit ending (continuation). Both
//! funnel into [`PlaybackScheduler::play_next`], the state transition
//! function — there is no polling and no timer.

use crate::config::PlaybackConfig;
use crate::decode::is_mostly_silent;
use crate::pipeline::crossfade;
use crate::pipeline::messages::AnimationUpdate;
use crate::timeline::{OutputTimeline, TimelineEvent, UnitId};
use crate::utterance::UtteranceRegistry;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Continuation state for a scheduled unit.
#[derive(Debug, Clone, Copy)]
struct PendingUnit {
    /// Utterance the unit belongs to.
    index: u32,
    /// Carry offset to resume with when the unit ends.
    carry_after: f64,
}

/// Schedules decoded chunks for continuous, gapless playback.
pub struct PlaybackScheduler<T: OutputTimeline> {
    timeline: T,
    config: PlaybackConfig,
    sample_rate: u32,
    /// Global single-playback-head guard: true while any chain is active.
    is_playing: bool,
    pending: HashMap<UnitId, PendingUnit>,
    animation_tx: mpsc::UnboundedSender<AnimationUpdate>,
}

impl<T: OutputTimeline> PlaybackScheduler<T> {
    /// Create a scheduler over the given output timeline.
    pub fn new(
        timeline: T,
        config: PlaybackConfig,
        sample_rate: u32,
        animation_tx: mpsc::UnboundedSender<AnimationUpdate>,
    ) -> Self {
        Self {
            timeline,
            config,
            sample_rate,
            is_playing: false,
            pending: HashMap::new(),
            animation_tx,
        }
    }

    /// True while a playback chain is active.
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// The underlying output timeline.
    pub fn timeline(&self) -> &T {
        &self.timeline
    }

    /// Mutable access to the output timeline (offline rendering, tests).
    pub fn timeline_mut(&mut self) -> &mut T {
        &mut self.timeline
    }

    /// A chunk was appended to `index`'s queue. Starts a playback chain if
    /// none is active; otherwise the running chain will reach the chunk on
    /// its own.
    pub fn on_chunk_queued(&mut self, registry: &mut UtteranceRegistry, index: u32) {
        if self.is_playing {
            return;
        }
        let Some(utterance) = registry.get_mut(index) else {
            warn!("chunk queued for unknown utterance {index}");
            return;
        };
        utterance.playing = true;
        utterance.played = false;
        self.is_playing = true;
        debug!("starting playback chain at utterance {index}");
        self.play_next(registry, index, 0.0);
    }

    /// Dispatch an output-clock event.
    pub fn handle_timeline_event(&mut self, registry: &mut UtteranceRegistry, event: TimelineEvent) {
        match event {
            TimelineEvent::UnitEnded(unit) => self.on_unit_ended(registry, unit),
        }
    }

    /// A scheduled unit finished: continue its utterance with the carry
    /// recorded at schedule time.
    fn on_unit_ended(&mut self, registry: &mut UtteranceRegistry, unit: UnitId) {
        let Some(pending) = self.pending.remove(&unit) else {
            return;
        };
        if let Some(utterance) = registry.get_mut(pending.index)
            && utterance.active_unit == Some(unit)
        {
            utterance.active_unit = None;
        }
        self.play_next(registry, pending.index, pending.carry_after);
    }

    /// Schedule the next chunk of `index`, or finish/chain when the queue
    /// is exhausted.
    ///
    /// `carry` is the remaining duration of already-scheduled audio for the
    /// chain; the next unit starts at `now + carry` so consecutive chunks
    /// are back-to-back with no gap.
    fn play_next(&mut self, registry: &mut UtteranceRegistry, index: u32, carry: f64) {
        loop {
            let Some(utterance) = registry.get_mut(index) else {
                warn!("play_next on unknown utterance {index}");
                self.is_playing = false;
                return;
            };

            let Some(chunk) = utterance.chunks.pop_front() else {
                break;
            };

            if chunk.is_empty() {
                continue;
            }
            if self.config.skip_silent_chunks
                && is_mostly_silent(&chunk, self.config.silence_peak_threshold)
            {
                debug!("skipping silent chunk of utterance {index}");
                continue;
            }

            let gain = match utterance.gain {
                Some(gain) => gain,
                None => {
                    let gain = self.timeline.create_gain(1.0);
                    utterance.gain = Some(gain);
                    gain
                }
            };

            let duration = chunk.len() as f64 / self.sample_rate as f64;
            let start_at = self.timeline.now() + carry;
            let unit = self
                .timeline
                .schedule_unit(gain, chunk, start_at, self.config.unit_fade_in);
            utterance.active_unit = Some(unit);
            self.pending.insert(
                unit,
                PendingUnit {
                    index,
                    carry_after: (carry - duration).max(0.0),
                },
            );
            return;
        }

        self.finish_utterance(registry, index, carry);
    }

    /// The queue of `index` is empty: pause if more chunks are coming,
    /// otherwise mark it played and either crossfade into a same-owner
    /// successor or end the chain.
    fn finish_utterance(&mut self, registry: &mut UtteranceRegistry, index: u32, carry: f64) {
        self.is_playing = false;

        let (owner, generation_complete) = {
            let Some(utterance) = registry.get_mut(index) else {
                return;
            };
            utterance.playing = false;
            (utterance.owner.clone(), utterance.generation_complete)
        };

        if !generation_complete {
            // Starved: generation is still running, so more chunks will
            // arrive and restart the chain. Not a terminal state.
            debug!("utterance {index} starved, waiting for more chunks");
            return;
        }

        if let Some(utterance) = registry.get_mut(index) {
            utterance.played = true;
        }

        let successor = index + 1;
        let same_owner = registry
            .get(successor)
            .is_some_and(|next| next.owner == owner);
        if !same_owner {
            if let Some(gain) = registry.get(index).and_then(|u| u.gain) {
                self.timeline.disconnect_gain(gain, self.timeline.now());
            }
            if let Some(utterance) = registry.get_mut(index) {
                utterance.retire();
            }
            debug!("playback chain ended after utterance {index}");
            return;
        }

        self.chain_into(registry, index, successor, &owner, carry);
    }

    /// Crossfade from the finished `index` into `successor` and continue
    /// the chain there.
    fn chain_into(
        &mut self,
        registry: &mut UtteranceRegistry,
        index: u32,
        successor: u32,
        owner: &str,
        carry: f64,
    ) {
        // Hand the successor's animation cues to the animation sink as its
        // playback begins.
        if let Some(next) = registry.get(successor)
            && !next.animation_cues.is_empty()
        {
            let _ = self.animation_tx.send(AnimationUpdate {
                label: owner.to_owned(),
                cues: next.animation_cues.clone(),
            });
        }

        let outgoing = registry.get(index).and_then(|u| u.gain);
        let incoming = {
            let Some(next) = registry.get_mut(successor) else {
                return;
            };
            match next.gain {
                Some(gain) => gain,
                None => {
                    let gain = self.timeline.create_gain(0.0);
                    next.gain = Some(gain);
                    gain
                }
            }
        };

        let now = self.timeline.now();
        let plan = crossfade::plan(self.config.crossfade_window, self.config.crossfade_shrink);
        let mut outgoing_from = 1.0;
        let mut incoming_from = 0.0;
        for step in &plan.steps {
            if let Some(gain) = outgoing {
                self.timeline.ramp_gain(
                    gain,
                    outgoing_from,
                    step.outgoing_to,
                    now + step.offset,
                    step.window,
                );
            }
            self.timeline.ramp_gain(
                incoming,
                incoming_from,
                step.incoming_to,
                now + step.offset,
                step.window,
            );
            outgoing_from = step.outgoing_to;
            incoming_from = step.incoming_to;
        }
        if plan.steps.is_empty() {
            // Instant handoff when crossfading is configured off.
            self.timeline.ramp_gain(incoming, 0.0, 1.0, now, 0.0);
        }
        if let Some(gain) = outgoing {
            self.timeline.disconnect_gain(gain, now + plan.total);
        }

        if let Some(utterance) = registry.get_mut(index) {
            utterance.retire();
        }
        if let Some(next) = registry.get_mut(successor) {
            next.playing = true;
            next.played = false;
        }
        self.is_playing = true;
        debug!("crossfading from utterance {index} into {successor}");
        self.play_next(registry, successor, carry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeTimeline, TimelineOp};
    use crate::utterance::AnimationCue;
    use std::sync::Arc;

    const RATE: u32 = 16_000;

    fn scheduler() -> (
        PlaybackScheduler<FakeTimeline>,
        mpsc::UnboundedReceiver<AnimationUpdate>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = PlaybackScheduler::new(FakeTimeline::new(), PlaybackConfig::default(), RATE, tx);
        (scheduler, rx)
    }

    fn chunk(len: usize, value: f32) -> Arc<[f32]> {
        vec![value; len].into()
    }

    /// Queue `chunks` on a fresh utterance and return its index.
    fn queued_utterance(
        registry: &mut UtteranceRegistry,
        owner: &str,
        chunks: &[Arc<[f32]>],
        complete: bool,
    ) -> u32 {
        let index = registry.create(owner, "text");
        let utt = registry.get_mut(index).unwrap();
        for c in chunks {
            utt.chunks.push_back(Arc::clone(c));
        }
        utt.generation_complete = complete;
        index
    }

    fn end_unit(
        scheduler: &mut PlaybackScheduler<FakeTimeline>,
        registry: &mut UtteranceRegistry,
        unit: u64,
    ) {
        scheduler.handle_timeline_event(registry, TimelineEvent::UnitEnded(UnitId(unit)));
    }

    #[test]
    fn chunks_schedule_in_fifo_order_back_to_back() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let index = queued_utterance(
            &mut registry,
            "x",
            &[chunk(160, 0.5), chunk(320, 0.5), chunk(480, 0.5)],
            true,
        );

        scheduler.on_chunk_queued(&mut registry, index);
        end_unit(&mut scheduler, &mut registry, 0);
        end_unit(&mut scheduler, &mut registry, 1);

        let units = scheduler.timeline().scheduled_units();
        let lens: Vec<usize> = units
            .iter()
            .map(|op| match op {
                TimelineOp::ScheduleUnit { samples, .. } => *samples,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(lens, vec![160, 320, 480], "FIFO order must be preserved");
    }

    #[test]
    fn units_carry_the_configured_fade_in() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let index = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], true);

        scheduler.on_chunk_queued(&mut registry, index);
        match scheduler.timeline().scheduled_units()[0] {
            TimelineOp::ScheduleUnit { fade_in, .. } => {
                assert!((fade_in - 0.06).abs() < f64::EPSILON);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn never_played_while_chunks_remain() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let index = queued_utterance(&mut registry, "x", &[chunk(160, 0.5), chunk(160, 0.5)], true);

        scheduler.on_chunk_queued(&mut registry, index);
        let utt = registry.get(index).unwrap();
        assert!(utt.playing);
        assert!(!utt.played, "played must stay false while chunks remain");

        end_unit(&mut scheduler, &mut registry, 0);
        assert!(!registry.get(index).unwrap().played);

        end_unit(&mut scheduler, &mut registry, 1);
        let utt = registry.get(index).unwrap();
        assert!(utt.played);
        assert!(!utt.playing);
    }

    #[test]
    fn starved_utterance_pauses_and_resumes_without_played() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let index = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], false);

        scheduler.on_chunk_queued(&mut registry, index);
        end_unit(&mut scheduler, &mut registry, 0);

        let utt = registry.get(index).unwrap();
        assert!(!utt.playing);
        assert!(!utt.played, "starved utterance is not played");
        assert!(!scheduler.is_playing());

        // More audio arrives, then generation completes.
        registry
            .get_mut(index)
            .unwrap()
            .chunks
            .push_back(chunk(160, 0.5));
        scheduler.on_chunk_queued(&mut registry, index);
        assert!(scheduler.is_playing());
        registry.get_mut(index).unwrap().generation_complete = true;
        end_unit(&mut scheduler, &mut registry, 1);
        assert!(registry.get(index).unwrap().played);
    }

    #[test]
    fn same_owner_successor_crossfades_before_fade_out_completes() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let a = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], true);
        let b = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], true);

        scheduler.on_chunk_queued(&mut registry, a);
        end_unit(&mut scheduler, &mut registry, 0);

        // B's first unit was scheduled by the chain handoff.
        assert_eq!(scheduler.timeline().scheduled_units().len(), 2);
        assert!(registry.get(a).unwrap().played);
        assert!(registry.get(b).unwrap().playing);
        assert!(scheduler.is_playing());

        // Outgoing gain ramps monotonically to 0, incoming to 1.
        let out_gain = registry.get(a).unwrap().gain.unwrap();
        let in_gain = registry.get(b).unwrap().gain.unwrap();
        let out_targets: Vec<f32> = scheduler
            .timeline()
            .ramps_for(out_gain)
            .iter()
            .map(|op| match op {
                TimelineOp::RampGain { to, .. } => *to,
                _ => unreachable!(),
            })
            .collect();
        assert!(!out_targets.is_empty());
        assert!(out_targets.windows(2).all(|p| p[1] < p[0]));
        assert_eq!(*out_targets.last().unwrap(), 0.0);

        let in_targets: Vec<f32> = scheduler
            .timeline()
            .ramps_for(in_gain)
            .iter()
            .map(|op| match op {
                TimelineOp::RampGain { to, .. } => *to,
                _ => unreachable!(),
            })
            .collect();
        assert!(in_targets.windows(2).all(|p| p[1] > p[0]));
        assert_eq!(*in_targets.last().unwrap(), 1.0);

        // The outgoing gain is disconnected only after the whole plan.
        let plan = crossfade::plan(0.06, 0.005);
        let disconnect = scheduler
            .timeline()
            .ops
            .iter()
            .find_map(|op| match op {
                TimelineOp::DisconnectGain { gain, at } if *gain == out_gain => Some(*at),
                _ => None,
            })
            .expect("outgoing gain must be disconnected");
        assert!((disconnect - plan.total).abs() < 1e-9);
    }

    #[test]
    fn different_owner_does_not_chain() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let a = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], true);
        let c = queued_utterance(&mut registry, "y", &[chunk(160, 0.5)], true);

        scheduler.on_chunk_queued(&mut registry, a);
        end_unit(&mut scheduler, &mut registry, 0);

        assert_eq!(
            scheduler.timeline().scheduled_units().len(),
            1,
            "C must not be scheduled by A draining"
        );
        assert!(!registry.get(c).unwrap().playing);
        assert!(!scheduler.is_playing());
        // A's gain ends the chain disconnected.
        let out_gain = registry.get(a).unwrap().gain.unwrap();
        assert!(scheduler
            .timeline()
            .ops
            .iter()
            .any(|op| matches!(op, TimelineOp::DisconnectGain { gain, .. } if *gain == out_gain)));
    }

    #[test]
    fn animation_cues_hand_off_at_chain_start() {
        let (mut scheduler, mut rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let a = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], true);
        let b = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], true);
        registry.get_mut(b).unwrap().animation_cues.push(AnimationCue {
            name: "AA".to_owned(),
            start_ms: 0.0,
            duration_ms: 80.0,
        });

        scheduler.on_chunk_queued(&mut registry, a);
        end_unit(&mut scheduler, &mut registry, 0);

        let update = rx.try_recv().expect("animation update must be sent");
        assert_eq!(update.label, "x");
        assert_eq!(update.cues.len(), 1);
        assert!(rx.try_recv().is_err(), "exactly one update per handoff");
        // A is retired after the handoff; B keeps its cues until its own
        // successor starts.
        assert_eq!(registry.get(a).unwrap().buffered_samples(), 0);
    }

    #[test]
    fn empty_and_silent_chunks_are_skipped() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let index = queued_utterance(
            &mut registry,
            "x",
            &[chunk(0, 0.0), chunk(160, 0.0), chunk(160, 0.5)],
            true,
        );

        scheduler.on_chunk_queued(&mut registry, index);
        let units = scheduler.timeline().scheduled_units();
        assert_eq!(units.len(), 1, "only the audible chunk is scheduled");
        match units[0] {
            TimelineOp::ScheduleUnit { samples, .. } => assert_eq!(*samples, 160),
            _ => unreachable!(),
        }
    }

    #[test]
    fn carry_offsets_keep_units_gapless() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        // Two 160-sample chunks: 10ms each at 16kHz.
        let index = queued_utterance(&mut registry, "x", &[chunk(160, 0.5), chunk(160, 0.5)], true);

        scheduler.on_chunk_queued(&mut registry, index);
        // First unit starts at now (carry 0); it ends, clock has advanced
        // by its duration, second starts at the new now with carry 0.
        scheduler.timeline_mut().advance(0.01);
        end_unit(&mut scheduler, &mut registry, 0);

        let starts: Vec<f64> = scheduler
            .timeline()
            .scheduled_units()
            .iter()
            .map(|op| match op {
                TimelineOp::ScheduleUnit { start_at, .. } => *start_at,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(starts, vec![0.0, 0.01]);
    }

    #[test]
    fn single_playback_head_guard_blocks_second_chain() {
        let (mut scheduler, _rx) = scheduler();
        let mut registry = UtteranceRegistry::new();
        let a = queued_utterance(&mut registry, "x", &[chunk(160, 0.5)], false);
        let b = queued_utterance(&mut registry, "y", &[chunk(160, 0.5)], false);

        scheduler.on_chunk_queued(&mut registry, a);
        scheduler.on_chunk_queued(&mut registry, b);

        assert_eq!(scheduler.timeline().scheduled_units().len(), 1);
        assert!(registry.get(a).unwrap().playing);
        assert!(!registry.get(b).unwrap().playing);
    }
}
