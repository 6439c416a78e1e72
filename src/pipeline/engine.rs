//! The speech engine: routes transport events, controls synthesis
//! pipelining, and owns the utterance registry and playback scheduler.
//!
//! Everything here runs on one task. Transport events, user speak commands,
//! and output-clock events are multiplexed by [`run`]; no locking is needed
//! because all mutation happens on that task.

use crate::config::EngineConfig;
use crate::decode::decode_pcm16;
use crate::error::{EngineError, Result};
use crate::pipeline::messages::{
    AnimationUpdate, ConnectionStatus, SpeakCommand, SynthesizeRequest, TransportEvent,
};
use crate::pipeline::scheduler::PlaybackScheduler;
use crate::timeline::{OutputTimeline, TimelineEvent};
use crate::utterance::UtteranceRegistry;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Streaming playback engine over an output timeline.
pub struct SpeechEngine<T: OutputTimeline> {
    voice: String,
    registry: UtteranceRegistry,
    scheduler: PlaybackScheduler<T>,
    synth_tx: mpsc::UnboundedSender<SynthesizeRequest>,
    connection_tx: watch::Sender<ConnectionStatus>,
}

impl<T: OutputTimeline> SpeechEngine<T> {
    /// Create an engine.
    ///
    /// Synthesis requests go out on `synth_tx`; animation handoffs on
    /// `animation_tx`.
    pub fn new(
        config: &EngineConfig,
        timeline: T,
        synth_tx: mpsc::UnboundedSender<SynthesizeRequest>,
        animation_tx: mpsc::UnboundedSender<AnimationUpdate>,
    ) -> Self {
        let scheduler = PlaybackScheduler::new(
            timeline,
            config.playback.clone(),
            config.audio.sample_rate,
            animation_tx,
        );
        let (connection_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            voice: config.synthesis.voice.clone(),
            registry: UtteranceRegistry::new(),
            scheduler,
            synth_tx,
            connection_tx,
        }
    }

    /// Observe the transport connection status.
    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection_tx.subscribe()
    }

    /// The utterance registry (read-only).
    pub fn registry(&self) -> &UtteranceRegistry {
        &self.registry
    }

    /// True while a playback chain is active.
    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// The output timeline (offline rendering, tests).
    pub fn timeline_mut(&mut self) -> &mut T {
        self.scheduler.timeline_mut()
    }

    /// Request synthesis and playback of new text.
    ///
    /// The utterance record is always created (its index is the registry
    /// size), so a predecessor's completion can pick it up later. The
    /// synthesize request itself is withheld while the immediately
    /// preceding utterance is still generating.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PipelineBusy`] when the request was withheld.
    pub fn request_speech(&mut self, owner: &str, text: &str) -> Result<u32> {
        let index = self.registry.create(owner, text);
        if index > 0 {
            let prior_complete = self
                .registry
                .get(index - 1)
                .is_some_and(|u| u.generation_complete);
            if !prior_complete {
                warn!("utterance {index} registered but previous request is still synthesizing");
                return Err(EngineError::PipelineBusy);
            }
        }
        self.send_synthesize(index);
        Ok(index)
    }

    /// Route an inbound transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::SynthesisStarted { id } => {
                // Reserved hook.
                debug!("synthesis started for utterance {id}");
            }
            TransportEvent::SynthesisCompleted { id } => self.on_synthesis_completed(id),
            TransportEvent::SynthesisError { id } => self.on_synthesis_error(id),
            TransportEvent::AudioChunk { id, data } => self.on_audio_chunk(id, &data),
            TransportEvent::AnimationCues { id, cues } => {
                let Some(utterance) = self.registry.get_mut(id) else {
                    warn!("animation cues for unknown utterance {id}");
                    return;
                };
                utterance.animation_cues.extend(cues);
            }
            TransportEvent::Connect => {
                info!("transport connected");
                self.connection_tx.send_replace(ConnectionStatus::Connected);
            }
            TransportEvent::Disconnect => {
                info!("transport disconnected");
                self.connection_tx
                    .send_replace(ConnectionStatus::Disconnected);
            }
        }
    }

    /// Dispatch an output-clock event to the scheduler.
    pub fn handle_timeline_event(&mut self, event: TimelineEvent) {
        self.scheduler
            .handle_timeline_event(&mut self.registry, event);
    }

    /// Completion path: mark the utterance generated and pipeline the next
    /// synthesis request if one is already registered and waiting.
    fn on_synthesis_completed(&mut self, id: u32) {
        let Some(utterance) = self.registry.get_mut(id) else {
            warn!("completion signal for unknown utterance {id}");
            return;
        };
        utterance.generation_complete = true;
        debug!("generation complete for utterance {id}");

        let next = id + 1;
        let next_waiting = self
            .registry
            .get(next)
            .is_some_and(|u| !u.generation_complete);
        if next_waiting {
            self.send_synthesize(next);
        }
    }

    /// Error path: revert the completion flag so this utterance is never
    /// chained from. No automatic retry.
    fn on_synthesis_error(&mut self, id: u32) {
        let Some(utterance) = self.registry.get_mut(id) else {
            warn!("error signal for unknown utterance {id}");
            return;
        };
        utterance.generation_complete = false;
        warn!("synthesis failed for utterance {id}; chain will not advance past it");
    }

    /// Decode an arriving chunk, queue it, and kick the scheduler.
    fn on_audio_chunk(&mut self, id: u32, data: &[u8]) {
        let Some(utterance) = self.registry.get_mut(id) else {
            warn!("audio chunk for unknown utterance {id}");
            return;
        };
        let samples = decode_pcm16(data);
        debug!(
            "audio chunk for utterance {id}: {} bytes -> {} samples",
            data.len(),
            samples.len()
        );
        utterance.chunks.push_back(samples);
        self.scheduler.on_chunk_queued(&mut self.registry, id);
    }

    fn send_synthesize(&mut self, index: u32) {
        let Some(utterance) = self.registry.get(index) else {
            return;
        };
        let request = SynthesizeRequest {
            id: index,
            voice: self.voice.clone(),
            text: utterance.text.clone(),
        };
        if self.synth_tx.send(request).is_err() {
            warn!("transport channel closed; dropping synthesize request for {index}");
        }
    }
}

/// Drive an engine until cancellation: the single-threaded cooperative loop
/// multiplexing transport events, user speak commands, and output-clock
/// events.
pub async fn run<T: OutputTimeline>(
    mut engine: SpeechEngine<T>,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    mut command_rx: mpsc::UnboundedReceiver<SpeakCommand>,
    mut timeline_rx: mpsc::UnboundedReceiver<TimelineEvent>,
    cancel: CancellationToken,
) {
    info!("playback engine running");
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = transport_rx.recv() => {
                let Some(event) = event else { break };
                engine.handle_event(event);
            }
            command = command_rx.recv() => {
                let Some(command) = command else { break };
                if let Err(e) = engine.request_speech(&command.owner, &command.text) {
                    warn!("speech request rejected: {e}");
                }
            }
            event = timeline_rx.recv() => {
                let Some(event) = event else { break };
                engine.handle_timeline_event(event);
            }
        }
    }
    info!("playback engine stopped");
}
