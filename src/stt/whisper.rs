//! Whisper-based [`SttEngine`] implementation.
//!
//! The GGML model is loaded lazily on the first transcription call, so the
//! daemon starts instantly and the (multi-second) model load cost is paid on
//! the first dictation instead of at boot.  A new `WhisperState` is created
//! per call; the context itself is created once and reused.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{SttEngine, SttError, Transcript};

/// Threads used for inference: physical parallelism capped at 8, where
/// whisper.cpp's scaling flattens out.
fn inference_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4) as i32
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production STT engine wrapping a lazily-loaded `whisper_rs::WhisperContext`.
pub struct WhisperEngine {
    model_path: PathBuf,
    /// ISO-639-1 code, or `"auto"` for Whisper's built-in detection.
    language: String,
    ctx: Mutex<Option<WhisperContext>>,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("model_path", &self.model_path)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send` and `unsafe impl Sync` in whisper-rs — the model
// weights are read-only after loading, and our `ctx` cell is mutex-guarded.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Create an engine for the model at `model_path`.
    ///
    /// The file must exist, but it is not read until the first
    /// [`transcribe`](SttEngine::transcribe) call.
    ///
    /// # Errors
    ///
    /// [`SttError::ModelNotFound`] when `model_path` does not exist.
    pub fn new(model_path: impl AsRef<Path>, language: impl Into<String>) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        Ok(Self {
            model_path: path.to_path_buf(),
            language: language.into(),
            ctx: Mutex::new(None),
        })
    }

    /// Load the context on first use.  Runs under the `ctx` mutex so
    /// concurrent first calls load the model exactly once.
    fn with_context<T>(
        &self,
        f: impl FnOnce(&WhisperContext) -> Result<T, SttError>,
    ) -> Result<T, SttError> {
        let mut guard = self.ctx.lock().unwrap();
        if guard.is_none() {
            let path_str = self.model_path.to_str().ok_or_else(|| {
                SttError::ModelNotFound(format!(
                    "model path contains non-UTF-8 characters: {}",
                    self.model_path.display()
                ))
            })?;

            log::info!("stt: loading whisper model from {path_str}");
            let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
                .map_err(|e| SttError::ContextInit(e.to_string()))?;
            *guard = Some(ctx);
        }

        // The Option was just populated above.
        f(guard.as_ref().unwrap())
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<Transcript, SttError> {
        if audio.is_empty() {
            return Ok(Transcript::empty());
        }

        self.with_context(|ctx| {
            let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

            let lang: Option<&str> = if self.language == "auto" {
                None
            } else {
                Some(self.language.as_str())
            };
            fp.set_language(lang);
            fp.set_n_threads(inference_threads());
            fp.set_print_progress(false);
            fp.set_print_realtime(false);

            let mut state = ctx
                .create_state()
                .map_err(|e| SttError::ContextInit(e.to_string()))?;

            state
                .full(fp, audio)
                .map_err(|e| SttError::Transcription(e.to_string()))?;

            let n_segments = state
                .full_n_segments()
                .map_err(|e| SttError::Transcription(e.to_string()))?;

            let mut text = String::new();
            for i in 0..n_segments {
                let seg = state
                    .full_get_segment_text(i)
                    .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
                if !text.is_empty() && !seg.starts_with(' ') {
                    text.push(' ');
                }
                text.push_str(&seg);
            }

            // Whisper reports the language it decoded with; confidence is not
            // exposed through the full() pipeline, so it stays None here.
            let detected_language = state
                .full_lang_id_from_state()
                .ok()
                .and_then(whisper_rs::get_lang_str)
                .map(str::to_string);

            Ok(Transcript {
                raw_text: text.trim().to_string(),
                detected_language,
                confidence: None,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
