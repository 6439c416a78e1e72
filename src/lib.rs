//! Lilt: streaming text-to-speech playback engine.
//!
//! Ingests out-of-order, chunked synthesis results for a sequence of
//! utterances, buffers their audio, and schedules continuous, crossfaded,
//! gapless playback while pipelining synthesis requests ahead of playback.
//!
//! # Architecture
//!
//! One engine task owns all mutable state and is driven by channels:
//! - **Transport events** (`synthesis-completed`, `audio-chunk`, …) arrive
//!   from the synthesis transport and are routed by the engine.
//! - **Decoded chunks** (PCM16 → f32) queue per utterance in an append-only
//!   registry keyed by sequence index.
//! - **The playback scheduler** drains queues onto an output timeline,
//!   chaining same-owner utterances with a shrinking-window crossfade.
//! - **Output-clock events** (unit ended) feed back into the scheduler to
//!   continue playback without polling.
//!
//! The timeline is a trait: [`audio::output::CpalOutput`] plays through the
//! system speakers, [`audio::offline::OfflineRenderer`] renders to memory.

pub mod audio;
pub mod config;
pub mod decode;
pub mod error;
pub mod pipeline;
pub mod timeline;
pub mod utterance;

#[cfg(test)]
pub mod test_utils;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use pipeline::engine::{SpeechEngine, run};
pub use pipeline::messages::{
    AnimationUpdate, ConnectionStatus, SpeakCommand, SynthesizeRequest, TransportEvent,
};
pub use timeline::{OutputTimeline, TimelineEvent};
