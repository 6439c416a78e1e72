//! Message types exchanged with the transport, animation, and UI
//! collaborators.

use crate::utterance::AnimationCue;
use serde::{Deserialize, Serialize};

/// Inbound events from the synthesis transport.
///
/// The serde representation matches the transport's wire naming: a tagged
/// object with kebab-case event names (`synthesis-completed`, `audio-chunk`,
/// …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TransportEvent {
    /// Synthesis for an utterance has started. Reserved hook; no-op.
    SynthesisStarted { id: u32 },
    /// Synthesis for an utterance finished; no more chunks will arrive.
    SynthesisCompleted { id: u32 },
    /// Synthesis for an utterance failed.
    SynthesisError { id: u32 },
    /// One arrival of raw PCM16LE audio bytes for an utterance.
    AudioChunk { id: u32, data: Vec<u8> },
    /// Timed animation cues for an utterance.
    AnimationCues { id: u32, cues: Vec<AnimationCue> },
    /// Transport connection established.
    Connect,
    /// Transport connection lost.
    Disconnect,
}

/// The single outbound transport request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    /// Sequence index of the utterance to synthesize.
    pub id: u32,
    /// Voice name.
    pub voice: String,
    /// Text to synthesize.
    pub text: String,
}

/// Outbound handoff to the animation collaborator, sent when a same-owner
/// successor utterance begins its crossfade-in.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationUpdate {
    /// Owner label of the chain being animated.
    pub label: String,
    /// The successor utterance's buffered cues.
    pub cues: Vec<AnimationCue>,
}

/// A user-triggered request to speak new text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakCommand {
    /// Logical speaker/turn the utterance belongs to.
    pub owner: String,
    /// Text to synthesize and play.
    pub text: String,
}

/// Externally observable transport connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}
