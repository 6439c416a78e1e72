//! Offline render harness: scripts a two-utterance conversation through the
//! engine against the in-memory timeline and writes the crossfaded mix to a
//! WAV file. Useful for listening to the chaining behavior without a
//! transport or an output device.

use lilt::audio::offline::OfflineRenderer;
use lilt::{EngineConfig, SpeechEngine, TransportEvent};
use tokio::sync::mpsc;

const BLOCK_FRAMES: usize = 512;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::default();
    let sample_rate = config.audio.sample_rate;

    let (synth_tx, mut synth_rx) = mpsc::unbounded_channel();
    let (animation_tx, mut animation_rx) = mpsc::unbounded_channel();
    let mut engine = SpeechEngine::new(
        &config,
        OfflineRenderer::new(sample_rate),
        synth_tx,
        animation_tx,
    );

    // Two same-owner utterances so the handoff crossfades.
    engine.request_speech("narrator", "first utterance")?;
    let _ = engine.request_speech("narrator", "second utterance");

    // Stand in for the transport: answer each synthesize request with two
    // PCM chunks at a distinct pitch, then a completion signal.
    let mut pitch = 220.0;
    while let Ok(request) = synth_rx.try_recv() {
        tracing::info!("synthesizing utterance {}: {:?}", request.id, request.text);
        for _ in 0..2 {
            engine.handle_event(TransportEvent::AudioChunk {
                id: request.id,
                data: sine_pcm16(0.4, pitch, sample_rate),
            });
        }
        engine.handle_event(TransportEvent::SynthesisCompleted { id: request.id });
        pitch *= 1.5;
    }

    // Drive the output clock until the timeline drains.
    let mut idle_blocks = 0;
    while idle_blocks < 3 {
        let events = engine.timeline_mut().step(BLOCK_FRAMES);
        if events.is_empty() && !engine.is_playing() {
            idle_blocks += 1;
        } else {
            idle_blocks = 0;
        }
        for event in events {
            engine.handle_timeline_event(event);
        }
        // The transport answers follow-up synthesize requests as they appear.
        while let Ok(request) = synth_rx.try_recv() {
            for _ in 0..2 {
                engine.handle_event(TransportEvent::AudioChunk {
                    id: request.id,
                    data: sine_pcm16(0.4, pitch, sample_rate),
                });
            }
            engine.handle_event(TransportEvent::SynthesisCompleted { id: request.id });
            pitch *= 1.5;
        }
    }

    while let Ok(update) = animation_rx.try_recv() {
        tracing::info!("animation handoff: {} ({} cues)", update.label, update.cues.len());
    }

    let rendered = engine.timeline_mut().rendered().to_vec();
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lilt-render.wav".to_owned());
    write_wav(&path, &rendered, sample_rate)?;

    println!(
        "rendered {:.2}s of audio to {path}",
        rendered.len() as f64 / sample_rate as f64
    );
    Ok(())
}

/// Generate PCM16LE bytes for a sine tone.
fn sine_pcm16(seconds: f64, freq: f64, sample_rate: u32) -> Vec<u8> {
    let frames = (seconds * sample_rate as f64) as usize;
    let mut bytes = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let sample = (0.4 * (2.0 * std::f64::consts::PI * freq * t).sin() * 32767.0) as i16;
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

fn write_wav(path: &str, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
