//! Microphone recorder: capture, live level metering and silence trimming.
//!
//! # Design
//!
//! `cpal::Stream` is `!Send`, so the stream lives on a dedicated
//! `audio-capture` control thread that owns it for the duration of a
//! recording.  [`Recorder`] is the `Send + Sync` handle the orchestrator
//! uses: `start()` / `stop()` are forwarded to the control thread over a
//! command channel, while the buffer, the capture flag and the live level
//! share a single mutex that the cpal callback also takes — the callback
//! never blocks on anything else.
//!
//! [`Recorder::detached`] constructs a recorder without a device thread;
//! tests feed chunks straight through [`Recorder::ingest`], the same path
//! the real callback uses.
//!
//! # Silence trimming
//!
//! `stop()` resamples the native-rate mono buffer to 16 kHz, converts to
//! i16 PCM, drops leading/trailing spans whose amplitude never exceeds the
//! configured threshold (keeping a short padding on each side), and returns
//! the kept span normalized back to f32.  A recording with no voiced sample
//! at all comes back empty.

use std::sync::mpsc::{sync_channel, Receiver, Sender, SyncSender};
use std::sync::{mpsc, Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::config::AudioConfig;

use super::resample::{pcm16_to_f32, resample_to_16k, scale_to_pcm16, stereo_to_mono};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring or releasing the microphone.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No input device is available on the default host.
    #[error("no audio input device available")]
    NoInputDevice,

    /// The default input configuration could not be queried or is unusable.
    #[error("cannot configure audio input device: {0}")]
    DeviceConfig(String),

    /// cpal failed to build the input stream.
    #[error("cannot build audio input stream: {0}")]
    BuildStream(String),

    /// cpal failed to start the input stream.
    #[error("cannot start audio input stream: {0}")]
    PlayStream(String),

    /// The capture control thread is gone.
    #[error("audio capture thread is not running")]
    WorkerGone,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

struct RecorderInner {
    /// Mono samples at `source_rate`, accumulated while capturing.
    frames: Vec<f32>,
    /// Native rate of the frames currently in the buffer.
    source_rate: u32,
    /// Smoothed loudness in [0, 1] for the UI meter.
    live_level: f32,
    /// Whether a recording is in flight.  The callback drops chunks that
    /// arrive outside a recording (stream teardown races the last callback).
    capturing: bool,
}

enum StreamCommand {
    Start(SyncSender<Result<(), CaptureError>>),
    Stop(SyncSender<()>),
}

/// Thread-safe microphone recorder handle.
pub struct Recorder {
    config: AudioConfig,
    inner: Arc<Mutex<RecorderInner>>,
    control: Option<Sender<StreamCommand>>,
}

impl Recorder {
    /// Create a recorder backed by the default input device.
    ///
    /// The device is not touched until [`start`](Self::start).
    pub fn new(config: AudioConfig) -> Self {
        let inner = Arc::new(Mutex::new(RecorderInner {
            frames: Vec::new(),
            source_rate: config.sample_rate,
            live_level: 0.0,
            capturing: false,
        }));

        let (tx, rx) = mpsc::channel();
        let thread_inner = Arc::clone(&inner);
        let gain = config.level_gain;
        std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || control_loop(rx, thread_inner, gain))
            .expect("failed to spawn audio-capture thread");

        Self {
            config,
            inner,
            control: Some(tx),
        }
    }

    /// Create a recorder with no device thread.  `start`/`stop` only toggle
    /// the capture flag; audio is supplied through [`ingest`](Self::ingest).
    pub fn detached(config: AudioConfig) -> Self {
        let inner = Arc::new(Mutex::new(RecorderInner {
            frames: Vec::new(),
            source_rate: config.sample_rate,
            live_level: 0.0,
            capturing: false,
        }));
        Self {
            config,
            inner,
            control: None,
        }
    }

    /// Whether a recording is currently in flight.
    pub fn is_recording(&self) -> bool {
        self.inner.lock().unwrap().capturing
    }

    /// Begin capturing.  Idempotent: a no-op while already recording.
    ///
    /// # Errors
    ///
    /// Propagates device acquisition failures; the recorder is left idle.
    pub fn start(&self) -> Result<(), CaptureError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.capturing {
                return Ok(());
            }
            inner.frames.clear();
            inner.live_level = 0.0;
            inner.capturing = true;
        }

        if let Some(control) = &self.control {
            let (reply_tx, reply_rx) = sync_channel(1);
            let sent = control.send(StreamCommand::Start(reply_tx)).is_ok();
            let result = if sent {
                reply_rx.recv().unwrap_or(Err(CaptureError::WorkerGone))
            } else {
                Err(CaptureError::WorkerGone)
            };

            if let Err(e) = result {
                self.inner.lock().unwrap().capturing = false;
                return Err(e);
            }
        }

        Ok(())
    }

    /// Stop capturing and return the trimmed recording as 16 kHz mono f32
    /// samples in [-1, 1].  Empty when nothing exceeded the silence
    /// threshold, or when no recording was in flight.
    pub fn stop(&self) -> Result<Vec<f32>, CaptureError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.capturing {
                return Ok(Vec::new());
            }
            // Flag first so the callback stops appending while the stream
            // is torn down.
            inner.capturing = false;
        }

        if let Some(control) = &self.control {
            let (reply_tx, reply_rx) = sync_channel(1);
            if control.send(StreamCommand::Stop(reply_tx)).is_err() || reply_rx.recv().is_err() {
                return Err(CaptureError::WorkerGone);
            }
        }

        let (frames, source_rate) = {
            let mut inner = self.inner.lock().unwrap();
            inner.live_level = 0.0;
            (std::mem::take(&mut inner.frames), inner.source_rate)
        };

        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let mono_16k = resample_to_16k(&frames, source_rate);
        let pcm = scale_to_pcm16(&mono_16k);
        let pad = (self.config.silence_padding_secs * self.config.sample_rate as f32) as usize;
        let kept = trim_silence(&pcm, self.config.silence_threshold, pad);

        Ok(pcm16_to_f32(kept))
    }

    /// Smoothed loudness of the recording in flight, in [0, 1].
    pub fn live_level(&self) -> f32 {
        self.inner.lock().unwrap().live_level
    }

    /// Reset the loudness meter to zero.
    pub fn reset_live_level(&self) {
        self.inner.lock().unwrap().live_level = 0.0;
    }

    /// Append a mono chunk and update the live level — the path the device
    /// callback feeds.  Chunks arriving while not capturing are dropped.
    pub fn ingest(&self, mono: &[f32]) {
        ingest_chunk(&self.inner, self.config.level_gain, mono);
    }
}

/// Shared between [`Recorder::ingest`] and the cpal data callback.
fn ingest_chunk(inner: &Mutex<RecorderInner>, level_gain: f32, mono: &[f32]) {
    let instant = chunk_level(mono, level_gain);

    let mut guard = inner.lock().unwrap();
    if !guard.capturing {
        return;
    }
    guard.frames.extend_from_slice(mono);
    // Smooth sudden jumps a little so the indicator feels stable.
    guard.live_level = (guard.live_level * 0.60 + instant * 0.40).clamp(0.0, 1.0);
}

/// Gain-scaled RMS of a chunk, clamped to [0, 1].  The gain expands
/// low-level speech dynamics so quiet speech still moves the meter.
pub fn chunk_level(mono: &[f32], gain: f32) -> f32 {
    if mono.is_empty() {
        return 0.0;
    }
    let mean_sq = mono.iter().map(|s| s * s).sum::<f32>() / mono.len() as f32;
    (mean_sq.sqrt() * gain).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Silence trimming
// ---------------------------------------------------------------------------

/// Keep the span from the first to the last sample whose absolute amplitude
/// exceeds `threshold`, padded by `pad` samples on each side (clamped to the
/// buffer).  Returns an empty slice when no sample exceeds the threshold.
pub fn trim_silence(samples: &[i16], threshold: i32, pad: usize) -> &[i16] {
    let exceeds = |s: &i16| (*s as i32).abs() > threshold;

    let first = match samples.iter().position(exceeds) {
        Some(i) => i,
        None => return &[],
    };
    // A voiced sample exists, so rposition is Some.
    let last = samples.iter().rposition(exceeds).unwrap_or(first);

    let start = first.saturating_sub(pad);
    let end = (last + pad + 1).min(samples.len());
    &samples[start..end]
}

// ---------------------------------------------------------------------------
// cpal control thread
// ---------------------------------------------------------------------------

/// Owns the `!Send` stream.  One command at a time; the stream is dropped on
/// `Stop` or when the command channel closes.
fn control_loop(rx: Receiver<StreamCommand>, inner: Arc<Mutex<RecorderInner>>, gain: f32) {
    let mut active: Option<cpal::Stream> = None;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            StreamCommand::Start(reply) => {
                let result = open_stream(&inner, gain);
                let outcome = match result {
                    Ok(stream) => {
                        active = Some(stream);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(outcome);
            }
            StreamCommand::Stop(reply) => {
                // Dropping the stream releases the OS audio resource.
                active = None;
                let _ = reply.send(());
            }
        }
    }
}

fn open_stream(
    inner: &Arc<Mutex<RecorderInner>>,
    gain: f32,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceConfig(e.to_string()))?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(CaptureError::DeviceConfig(format!(
            "unsupported sample format {:?}",
            supported.sample_format()
        )));
    }

    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels;
    inner.lock().unwrap().source_rate = config.sample_rate.0;

    log::debug!(
        "audio: opening input stream ({} Hz, {} ch)",
        config.sample_rate.0,
        channels
    );

    let data_inner = Arc::clone(inner);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = stereo_to_mono(data, channels);
                ingest_chunk(&data_inner, gain, &mono);
            },
            |e| log::warn!("audio: stream error: {e}"),
            None,
        )
        .map_err(|e| CaptureError::BuildStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::PlayStream(e.to_string()))?;

    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
