//! Speech-to-text: the [`SttEngine`] trait and its implementations.
//!
//! [`SttEngine`] is the pipeline's black-box contract: 16 kHz mono f32 audio
//! in, a [`Transcript`] out.  Empty audio yields an empty transcript, never
//! an error — the worker treats "nothing was said" as a normal outcome.
//!
//! [`WhisperEngine`] is the production implementation backed by
//! `whisper_rs`.  [`MockSttEngine`] (test-only) returns canned transcripts so
//! the pipeline can be tested without a GGML model file.

pub mod whisper;

pub use whisper::WhisperEngine;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Output of one transcription call.  Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Raw transcript text, trimmed.
    pub raw_text: String,
    /// ISO-639-1 code of the detected speech language, when available.
    pub detected_language: Option<String>,
    /// Language-detection confidence in [0, 1], when available.
    pub confidence: Option<f32>,
}

impl Transcript {
    /// The transcript for empty audio: empty text, no language.
    pub fn empty() -> Self {
        Self {
            raw_text: String::new(),
            detected_language: None,
            confidence: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the STT subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a `WhisperContext` or `WhisperState`.
    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("Transcription error: {0}")]
    Transcription(String),
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-to-text engines.
///
/// Implementations must be `Send + Sync` so that they can be held behind an
/// `Arc<dyn SttEngine>` and called from the blocking thread pool.
///
/// # Contract
///
/// - `audio` must be **16 kHz, mono, f32** PCM samples in [-1, 1].
/// - Empty `audio` returns `Ok(Transcript::empty())`, not an error.
pub trait SttEngine: Send + Sync {
    /// Transcribe `audio` and return the transcript.
    fn transcribe(&self, audio: &[f32]) -> Result<Transcript, SttError>;
}

// Compile-time assertion: Box<dyn SttEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured transcript without loading any
/// model file.
#[cfg(test)]
pub struct MockSttEngine {
    response: Result<Transcript, SttError>,
}

#[cfg(test)]
impl MockSttEngine {
    /// Create a mock that returns `Ok` with the given text and no language.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(Transcript {
                raw_text: text.into(),
                detected_language: None,
                confidence: None,
            }),
        }
    }

    /// Create a mock that returns `Ok` with text, language and confidence.
    pub fn with_language(text: impl Into<String>, lang: &str, confidence: f32) -> Self {
        Self {
            response: Ok(Transcript {
                raw_text: text.into(),
                detected_language: Some(lang.into()),
                confidence: Some(confidence),
            }),
        }
    }

    /// Create a mock that always returns `Err(error)`.
    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<Transcript, SttError> {
        // Enforce the empty-audio contract even in the mock.
        if audio.is_empty() {
            return Ok(Transcript::empty());
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ok_returns_configured_text() {
        let engine = MockSttEngine::ok("hello there");
        let audio = vec![0.1f32; 16_000];
        assert_eq!(engine.transcribe(&audio).unwrap().raw_text, "hello there");
    }

    #[test]
    fn mock_with_language_carries_metadata() {
        let engine = MockSttEngine::with_language("kya haal hai", "hi", 0.8);
        let t = engine.transcribe(&[0.1f32; 100]).unwrap();
        assert_eq!(t.detected_language.as_deref(), Some("hi"));
        assert_eq!(t.confidence, Some(0.8));
    }

    #[test]
    fn mock_empty_audio_returns_empty_transcript() {
        let engine = MockSttEngine::ok("should not appear");
        let t = engine.transcribe(&[]).unwrap();
        assert!(t.raw_text.is_empty());
        assert!(t.detected_language.is_none());
    }

    #[test]
    fn mock_err_returns_configured_error() {
        let engine = MockSttEngine::err(SttError::Transcription("boom".into()));
        let err = engine.transcribe(&[0.1f32; 100]).unwrap_err();
        assert!(matches!(err, SttError::Transcription(_)));
    }

    #[test]
    fn box_dyn_stt_engine_compiles() {
        // If this test compiles, the trait is object-safe.
        let engine: Box<dyn SttEngine> = Box::new(MockSttEngine::ok("ok"));
        let _ = engine.transcribe(&[0.0f32; 100]);
    }

    #[test]
    fn stt_error_display_model_not_found() {
        let e = SttError::ModelNotFound("/some/path.bin".into());
        assert!(e.to_string().contains("/some/path.bin"));
    }
}
