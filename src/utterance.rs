//! Per-utterance state and the ordered utterance registry.

use crate::timeline::{GainId, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// A timed animation instruction associated with an utterance.
///
/// Cues are buffered on the record and handed to the animation sink when
/// the next utterance in the same owner's chain begins playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationCue {
    /// Animation name (e.g. a viseme or gesture identifier).
    pub name: String,
    /// Offset from utterance start in milliseconds.
    pub start_ms: f32,
    /// Duration in milliseconds.
    pub duration_ms: f32,
}

/// One requested speech segment and its buffered synthesis results.
#[derive(Debug)]
pub struct Utterance {
    /// Position in the registry; assigned at creation, identifies ordering
    /// and chaining.
    pub index: u32,
    /// Logical speaker/turn this utterance belongs to. Consecutive
    /// utterances crossfade-chain only when their owners match.
    pub owner: String,
    /// Source text for synthesis.
    pub text: String,
    /// Decoded audio chunks, FIFO. The decoder appends, the scheduler pops
    /// from the front; no chunk is read twice.
    pub chunks: VecDeque<Arc<[f32]>>,
    /// Buffered animation cues for this utterance.
    pub animation_cues: Vec<AnimationCue>,
    /// True once a completion signal has been received; reverted to false
    /// only by a synthesis error.
    pub generation_complete: bool,
    /// True while this utterance is actively emitting audio.
    pub playing: bool,
    /// True once the queue is exhausted and no more chunks will arrive.
    pub played: bool,
    /// Gain control owned by the scheduler while this utterance plays.
    pub gain: Option<GainId>,
    /// Currently sounding playback unit, if any.
    pub active_unit: Option<UnitId>,
}

impl Utterance {
    fn new(index: u32, owner: String, text: String) -> Self {
        Self {
            index,
            owner,
            text,
            chunks: VecDeque::new(),
            animation_cues: Vec::new(),
            generation_complete: false,
            playing: false,
            played: false,
            gain: None,
            active_unit: None,
        }
    }

    /// Drop heavy buffers once this record is fully played and no longer
    /// needed for crossfade lookahead. The record itself stays in the
    /// registry so chaining lookups keep working.
    pub fn retire(&mut self) {
        self.chunks.clear();
        self.chunks.shrink_to_fit();
        self.animation_cues.clear();
    }

    /// Total buffered samples across all queued chunks.
    pub fn buffered_samples(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }
}

/// Append-only collection of utterance records keyed by sequence index.
#[derive(Debug, Default)]
pub struct UtteranceRegistry {
    records: Vec<Utterance>,
}

impl UtteranceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new record. Its index is the current registry size.
    pub fn create(&mut self, owner: &str, text: &str) -> u32 {
        let index = self.records.len() as u32;
        self.records
            .push(Utterance::new(index, owner.to_owned(), text.to_owned()));
        index
    }

    /// Look up a record by sequence index.
    pub fn get(&self, index: u32) -> Option<&Utterance> {
        self.records.get(index as usize)
    }

    /// Mutable lookup by sequence index.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut Utterance> {
        self.records.get_mut(index as usize)
    }

    /// Number of records ever created.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no utterance has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_increase_from_zero() {
        let mut registry = UtteranceRegistry::new();
        assert_eq!(registry.create("a", "one"), 0);
        assert_eq!(registry.create("a", "two"), 1);
        assert_eq!(registry.create("b", "three"), 2);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(1).map(|u| u.text.as_str()), Some("two"));
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn new_record_starts_idle() {
        let mut registry = UtteranceRegistry::new();
        let index = registry.create("a", "hello");
        let utt = registry.get(index).unwrap();
        assert!(!utt.generation_complete);
        assert!(!utt.playing);
        assert!(!utt.played);
        assert!(utt.chunks.is_empty());
        assert!(utt.gain.is_none());
    }

    #[test]
    fn retire_clears_buffers_but_keeps_flags() {
        let mut registry = UtteranceRegistry::new();
        let index = registry.create("a", "hello");
        let utt = registry.get_mut(index).unwrap();
        utt.chunks.push_back(vec![0.5f32; 160].into());
        utt.animation_cues.push(AnimationCue {
            name: "AA".to_owned(),
            start_ms: 0.0,
            duration_ms: 80.0,
        });
        utt.played = true;

        utt.retire();
        assert_eq!(utt.buffered_samples(), 0);
        assert!(utt.animation_cues.is_empty());
        assert!(utt.played);
    }
}
