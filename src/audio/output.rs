//! Real-time audio output to system speakers via cpal.
//!
//! The cpal stream lives on a dedicated thread (streams are not `Send`, and
//! the engine task must stay spawnable). The output callback renders from
//! the shared [`Mixer`] and forwards unit-ended events into an unbounded
//! channel; it never blocks.

use crate::audio::mixer::Mixer;
use crate::config::AudioConfig;
use crate::error::{EngineError, Result};
use crate::timeline::{GainId, OutputTimeline, TimelineEvent, UnitId};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Audio output timeline backed by a cpal stream.
pub struct CpalOutput {
    mixer: Arc<Mutex<Mixer>>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the output device and start streaming.
    ///
    /// Unit-ended events from the output clock are delivered on `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available or the stream
    /// cannot be built or started.
    pub fn new(config: &AudioConfig, events: mpsc::UnboundedSender<TimelineEvent>) -> Result<Self> {
        let mixer = Arc::new(Mutex::new(Mixer::new(config.sample_rate)));
        let stop = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let thread = {
            let config = config.clone();
            let mixer = Arc::clone(&mixer);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("lilt-output".into())
                .spawn(move || {
                    let stream = match build_output_stream(&config, &mixer, events) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(EngineError::Audio(format!(
                            "failed to start output stream: {e}"
                        ))));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));
                    // Hold the stream alive until dropped.
                    while !stop.load(Ordering::Relaxed) {
                        std::thread::sleep(std::time::Duration::from_millis(10));
                    }
                    drop(stream);
                })
                .map_err(|e| EngineError::Audio(format!("failed to spawn output thread: {e}")))?
        };

        ready_rx
            .recv()
            .map_err(|_| EngineError::Audio("output thread exited during init".into()))??;

        Ok(Self {
            mixer,
            stop,
            thread: Some(thread),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| EngineError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl OutputTimeline for CpalOutput {
    fn now(&self) -> f64 {
        self.lock().now()
    }

    fn create_gain(&mut self, initial: f32) -> GainId {
        self.lock().create_gain(initial)
    }

    fn ramp_gain(&mut self, gain: GainId, from: f32, to: f32, start_at: f64, duration: f64) {
        self.lock().ramp_gain(gain, from, to, start_at, duration);
    }

    fn disconnect_gain(&mut self, gain: GainId, at: f64) {
        self.lock().disconnect_gain(gain, at);
    }

    fn schedule_unit(
        &mut self,
        gain: GainId,
        samples: Arc<[f32]>,
        start_at: f64,
        fade_in: f64,
    ) -> UnitId {
        self.lock().schedule_unit(gain, samples, start_at, fade_in)
    }
}

fn build_output_stream(
    config: &AudioConfig,
    mixer: &Arc<Mutex<Mixer>>,
    events: mpsc::UnboundedSender<TimelineEvent>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = if let Some(ref name) = config.output_device {
        host.output_devices()
            .map_err(|e| EngineError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| EngineError::Audio(format!("output device '{name}' not found")))?
    } else {
        host.default_output_device()
            .ok_or_else(|| EngineError::Audio("no default output device".into()))?
    };

    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!("using output device: {device_name}");

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: config.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let mixer = Arc::clone(mixer);
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut mixer = mixer.lock().unwrap_or_else(PoisonError::into_inner);
                mixer.render(data);
                for event in mixer.take_events() {
                    let _ = events.send(event);
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| EngineError::Audio(format!("failed to build output stream: {e}")))?;

    Ok(stream)
}
