//! Audio capture — microphone → mono f32 → 16 kHz → silence-trimmed PCM.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → stereo_to_mono → Recorder buffer (+ level)
//!   stop() → resample_to_16k → scale_to_pcm16 → trim_silence → f32 samples
//! ```
//!
//! The [`Recorder`] is the only stateful piece; everything else is a pure
//! conversion function in [`resample`].

pub mod recorder;
pub mod resample;

pub use recorder::{chunk_level, trim_silence, CaptureError, Recorder};
pub use resample::{pcm16_to_f32, resample_to_16k, scale_to_pcm16, stereo_to_mono};
