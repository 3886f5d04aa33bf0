//! Audio output through the default cpal device.
//!
//! Voices and their gain automation live in a shared [`Mixer`] that the
//! stream callback renders sample by sample. The device is opened lazily
//! on the first `resume()`, so a dashboard that never enables audio never
//! touches the sound card.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::fs::File;
use std::io::BufWriter;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use super::{AudioBackend, AudioError, ContextState, GainAutomation, GainEnvelope, ToneGenerator, Waveform};
use crate::params::{audio_constants::OUTPUT_LIMIT, RecordingConfig};

type WavRecorder = hound::WavWriter<BufWriter<File>>;

#[derive(Debug)]
struct Voice {
    id: u64,
    frequency_hz: f32,
    waveform: Waveform,
    phase: f32,
    running: bool,
    /// Bypasses the master gain
    direct: bool,
    gain: GainAutomation,
}

/// Shared between the control side and the stream callback
struct Mixer {
    sample_rate: u32,
    clock_samples: u64,
    master: GainAutomation,
    voices: Vec<Voice>,
    next_voice: u64,
    recorder: Option<WavRecorder>,
}

impl Mixer {
    fn new() -> Self {
        Self {
            sample_rate: crate::params::audio_constants::FALLBACK_SAMPLE_RATE_HZ,
            clock_samples: 0,
            master: GainAutomation::new(0.0),
            voices: Vec::new(),
            next_voice: 0,
            recorder: None,
        }
    }

    /// Stream clock (milliseconds)
    fn now_ms(&self) -> f64 {
        self.clock_samples as f64 * 1000.0 / self.sample_rate as f64
    }

    fn voice_mut(&mut self, id: u64) -> Result<&mut Voice, AudioError> {
        self.voices
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(AudioError::ToneStopped)
    }

    /// Fill an interleaved buffer
    fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let step = 1.0 / self.sample_rate as f32;

        for frame in data.chunks_mut(channels) {
            let now = self.now_ms();
            let master = self.master.value_at(now);

            let mut bus = 0.0;
            let mut direct = 0.0;
            for voice in self.voices.iter_mut().filter(|v| v.running) {
                let value = voice.waveform.sample(voice.phase) * voice.gain.value_at(now);
                if voice.direct {
                    direct += value;
                } else {
                    bus += value;
                }
                voice.phase = (voice.phase + voice.frequency_hz * step).fract();
            }

            // Safety limiter: hard clip to protect ears and speakers
            let sample = (bus * master + direct).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);
            frame.fill(sample);

            if let Some(writer) = self.recorder.as_mut() {
                let _ = writer.write_sample(sample);
                let _ = writer.write_sample(sample);
            }

            self.clock_samples += 1;
        }
    }
}

/// Default output device backend
pub struct CpalBackend {
    mixer: Arc<Mutex<Mixer>>,
    /// Output stream (kept alive while running)
    stream: Option<cpal::Stream>,
    state: ContextState,
    recording: Option<RecordingConfig>,
}

impl CpalBackend {
    /// Backend that records the mix to WAV when `recording` is set
    pub fn new(recording: Option<RecordingConfig>) -> Self {
        Self {
            mixer: Arc::new(Mutex::new(Mixer::new())),
            stream: None,
            state: ContextState::Suspended,
            recording,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Mixer>, AudioError> {
        self.mixer
            .lock()
            .map_err(|_| AudioError::Stream("mixer lock poisoned".to_string()))
    }

    fn open_stream(&mut self) -> Result<(), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            channels,
            "audio output"
        );

        let recorder = match &self.recording {
            Some(recording) => {
                let spec = hound::WavSpec {
                    channels: 2,
                    sample_rate,
                    bits_per_sample: 32,
                    sample_format: hound::SampleFormat::Float,
                };
                let writer = hound::WavWriter::create(&recording.wav_path, spec)
                    .map_err(|e| AudioError::Recording(e.to_string()))?;
                info!(path = %recording.wav_path.display(), "recording audio");
                Some(writer)
            }
            None => None,
        };

        {
            let mut mixer = self.lock()?;
            mixer.sample_rate = sample_rate.max(1);
            mixer.recorder = recorder;
        }

        let mixer = Arc::clone(&self.mixer);
        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| match mixer.lock() {
                    Ok(mut mixer) => mixer.render(data, channels),
                    Err(_) => data.fill(0.0),
                },
                |err| warn!(error = %err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    /// Stop the stream and finalize any recording
    ///
    /// The context cannot be resumed afterwards.
    pub fn close(&mut self) -> Result<(), AudioError> {
        self.stream = None;
        self.state = ContextState::Closed;

        let recorder = self.lock()?.recorder.take();
        if let Some(writer) = recorder {
            writer
                .finalize()
                .map_err(|e| AudioError::Recording(e.to_string()))?;
            info!("recording finalized");
        }
        Ok(())
    }

    fn add_voice(&mut self, direct: bool) -> Result<CpalTone, AudioError> {
        if self.state != ContextState::Running {
            return Err(AudioError::ContextInactive);
        }
        let mut mixer = self.lock()?;
        let id = mixer.next_voice;
        mixer.next_voice += 1;
        mixer.voices.push(Voice {
            id,
            frequency_hz: 0.0,
            waveform: Waveform::Sine,
            phase: 0.0,
            running: false,
            direct,
            gain: GainAutomation::new(0.0),
        });

        Ok(CpalTone {
            mixer: Arc::clone(&self.mixer),
            id,
            stopped: false,
        })
    }

    /// Seconds of audio rendered so far
    pub fn elapsed_secs(&self) -> f64 {
        self.lock().map_or(0.0, |m| m.now_ms() / 1000.0)
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        if self.state != ContextState::Closed {
            if let Err(e) = self.close() {
                warn!(error = %e, "audio shutdown failed");
            }
        }
    }
}

impl AudioBackend for CpalBackend {
    type Tone = CpalTone;

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        match self.state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(AudioError::ContextInactive),
            ContextState::Suspended => {
                self.open_stream()?;
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn create_tone(&mut self) -> Result<CpalTone, AudioError> {
        self.add_voice(false)
    }

    fn create_direct_tone(&mut self) -> Result<CpalTone, AudioError> {
        self.add_voice(true)
    }

    fn cancel_master_ramps(&mut self) {
        if let Ok(mut mixer) = self.lock() {
            let now = mixer.now_ms();
            mixer.master.cancel_and_hold(now);
        }
    }

    fn set_master_gain(&mut self, value: f32, ramp_ms: f32) -> Result<(), AudioError> {
        let mut mixer = self.lock()?;
        let now = mixer.now_ms();
        mixer.master.move_to(value, now, ramp_ms);
        Ok(())
    }
}

/// Handle to one mixer voice
pub struct CpalTone {
    mixer: Arc<Mutex<Mixer>>,
    id: u64,
    stopped: bool,
}

impl CpalTone {
    fn with_voice<T>(
        &mut self,
        f: impl FnOnce(&mut Voice, f64) -> T,
    ) -> Result<T, AudioError> {
        if self.stopped {
            return Err(AudioError::ToneStopped);
        }
        let mut mixer = self
            .mixer
            .lock()
            .map_err(|_| AudioError::Stream("mixer lock poisoned".to_string()))?;
        let now = mixer.now_ms();
        let voice = mixer.voice_mut(self.id)?;
        Ok(f(voice, now))
    }
}

impl ToneGenerator for CpalTone {
    fn start(&mut self, frequency_hz: f32, waveform: Waveform) -> Result<(), AudioError> {
        self.with_voice(|voice, _| {
            voice.frequency_hz = frequency_hz;
            voice.waveform = waveform;
            voice.phase = 0.0;
            voice.running = true;
        })
    }

    fn set_gain(&mut self, value: f32, ramp_ms: f32) -> Result<(), AudioError> {
        self.with_voice(|voice, now| voice.gain.move_to(value, now, ramp_ms))
    }

    fn cancel_scheduled(&mut self) -> Result<(), AudioError> {
        self.with_voice(|voice, now| voice.gain.cancel_and_hold(now))
    }

    fn apply_envelope(&mut self, envelope: &GainEnvelope) -> Result<(), AudioError> {
        self.with_voice(|voice, now| voice.gain.apply(envelope, now))
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if self.stopped {
            return Err(AudioError::ToneStopped);
        }
        self.stopped = true;
        let mut mixer = self
            .mixer
            .lock()
            .map_err(|_| AudioError::Stream("mixer lock poisoned".to_string()))?;
        mixer.voices.retain(|v| v.id != self.id);
        Ok(())
    }
}

impl Drop for CpalTone {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.stop();
        }
    }
}
