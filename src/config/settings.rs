//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// LanguageMode
// ---------------------------------------------------------------------------

/// Output-language policy for the cleanup stage.
///
/// | Variant       | Behaviour                                              |
/// |---------------|--------------------------------------------------------|
/// | Auto          | Classify per transcript (script, language, confidence) |
/// | English       | Always render plain English                            |
/// | HinglishRoman | Always render Romanized Hinglish                       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageMode {
    Auto,
    English,
    HinglishRoman,
}

impl Default for LanguageMode {
    fn default() -> Self {
        Self::Auto
    }
}

// ---------------------------------------------------------------------------
// CleanupProvider
// ---------------------------------------------------------------------------

/// Selects which rewrite provider chain the cleanup engine attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupProvider {
    /// Remote-first: Groq, then LM Studio.
    Groq,
    /// Local-first: LM Studio, then Groq.
    Lmstudio,
    /// Deterministic normalization only — no rewrite calls at all.
    Deterministic,
}

impl Default for CleanupProvider {
    fn default() -> Self {
        Self::Lmstudio
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// GGML model name / file stem (e.g. `"large-v3"`); resolved against the
    /// models directory as `<models_dir>/ggml-<model>.bin`.
    pub model: String,
    /// Primary speech language as an ISO-639-1 code, or `"auto"` for
    /// Whisper's built-in language detection.
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "large-v3".into(),
            language: "auto".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture and silence trimming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz handed to Whisper (must be 16 000).
    pub sample_rate: u32,
    /// Amplitude threshold in the i16 PCM domain; samples at or below it are
    /// treated as silence when trimming.
    pub silence_threshold: i32,
    /// Seconds of audio kept on each side of the detected voiced span.
    pub silence_padding_secs: f32,
    /// Gain applied to chunk RMS before clamping for the live level meter.
    /// Tuned so quiet speech still moves the meter; flagged for re-tuning.
    pub level_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            silence_threshold: 450,
            silence_padding_secs: 0.12,
            level_gain: 6.0,
        }
    }
}

// ---------------------------------------------------------------------------
// CleanupConfig
// ---------------------------------------------------------------------------

/// Settings for the text cleanup engine and its rewrite providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Which provider chain to attempt (see [`CleanupProvider`]).
    pub provider: CleanupProvider,
    /// Master switch for rewrite calls; `false` forces deterministic-only.
    pub rewrite_enabled: bool,
    /// Hard per-request timeout for provider calls, in milliseconds.
    pub timeout_ms: u64,
    /// Minimum lexical overlap between original and rewritten text; rewrites
    /// below this are rejected.  Tuned value, kept configurable.
    pub min_overlap_ratio: f32,
    /// Maximum rewritten-to-original word-count ratio before rejection.
    pub max_expansion_ratio: f32,
    /// LM Studio OpenAI-compatible base URL (including `/v1`).
    pub lmstudio_base_url: String,
    /// LM Studio model id; `None` resolves the first loaded model at runtime.
    pub lmstudio_model: Option<String>,
    /// Launch the LM Studio app once per process lifetime if it is offline.
    pub lmstudio_auto_start: bool,
    /// How long to poll for LM Studio after an auto-start, in milliseconds.
    pub lmstudio_start_timeout_ms: u64,
    /// Groq OpenAI-compatible base URL.
    pub groq_base_url: String,
    /// Groq model identifier.
    pub groq_model: String,
    /// Groq API key — `None` disables the Groq provider.
    pub groq_api_key: Option<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            provider: CleanupProvider::default(),
            rewrite_enabled: true,
            timeout_ms: 1_000,
            min_overlap_ratio: 0.45,
            max_expansion_ratio: 2.0,
            lmstudio_base_url: "http://127.0.0.1:1234/v1".into(),
            lmstudio_model: None,
            lmstudio_auto_start: true,
            lmstudio_start_timeout_ms: 8_000,
            groq_base_url: "https://api.groq.com/openai/v1".into(),
            groq_model: "meta-llama/llama-4-maverick-17b-128e-instruct".into(),
            groq_api_key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// InsertConfig
// ---------------------------------------------------------------------------

/// Settings for text insertion into the focused application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertConfig {
    /// Additional paste attempts after the first one fails.
    pub paste_retry: u32,
    /// When pasting fails, leave the dictation in the clipboard instead of
    /// restoring the previous contents, so it can be pasted manually.
    pub keep_dictation_on_failure: bool,
}

impl Default for InsertConfig {
    fn default() -> Self {
        Self {
            paste_retry: 1,
            keep_dictation_on_failure: true,
        }
    }
}

// ---------------------------------------------------------------------------
// DuckingConfig
// ---------------------------------------------------------------------------

/// Settings for system audio ducking while recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuckingConfig {
    /// Whether to duck system output volume during capture.
    pub enabled: bool,
    /// Output volume percentage while recording (0–100).
    pub target_volume_percent: u8,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_volume_percent: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Push-to-talk key name (e.g. `"F9"`).
    pub push_to_talk_key: String,
    /// Key that re-pastes the most recent dictation (e.g. `"F10"`).
    pub paste_last_key: String,
    /// Whether the paste-last shortcut is active at all.
    pub paste_last_enabled: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            push_to_talk_key: "F9".into(),
            paste_last_key: "F10".into(),
            paste_last_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use speakflow::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output-language policy.
    pub language_mode: LanguageMode,
    /// STT engine settings.
    pub stt: SttConfig,
    /// Audio capture / trimming settings.
    pub audio: AudioConfig,
    /// Cleanup engine and rewrite provider settings.
    pub cleanup: CleanupConfig,
    /// Text insertion settings.
    pub insert: InsertConfig,
    /// System audio ducking settings.
    pub ducking: DuckingConfig,
    /// Global hotkey bindings.
    pub hotkey: HotkeyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language_mode: LanguageMode::default(),
            stt: SttConfig::default(),
            audio: AudioConfig::default(),
            cleanup: CleanupConfig::default(),
            insert: InsertConfig::default(),
            ducking: DuckingConfig::default(),
            hotkey: HotkeyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.  A file that exists but fails to parse also falls back to
    /// defaults with a warning rather than refusing to start.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match toml::from_str::<Self>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!(
                    "settings file {} is invalid ({e}); using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check invariants that would break the pipeline at runtime.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.audio.sample_rate == 16_000,
            "audio.sample_rate must be 16000 (Whisper requirement), got {}",
            self.audio.sample_rate
        );
        anyhow::ensure!(
            self.audio.silence_padding_secs >= 0.0,
            "audio.silence_padding_secs must be non-negative"
        );
        anyhow::ensure!(
            self.audio.silence_threshold >= 0,
            "audio.silence_threshold must be non-negative"
        );
        anyhow::ensure!(
            self.audio.level_gain > 0.0,
            "audio.level_gain must be positive"
        );
        anyhow::ensure!(!self.stt.model.is_empty(), "stt.model must not be empty");
        anyhow::ensure!(
            self.cleanup.timeout_ms >= 200,
            "cleanup.timeout_ms must be at least 200"
        );
        anyhow::ensure!(
            self.cleanup.lmstudio_start_timeout_ms >= 500,
            "cleanup.lmstudio_start_timeout_ms must be at least 500"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.cleanup.min_overlap_ratio),
            "cleanup.min_overlap_ratio must be in [0, 1]"
        );
        anyhow::ensure!(
            self.cleanup.max_expansion_ratio >= 1.0,
            "cleanup.max_expansion_ratio must be at least 1"
        );
        anyhow::ensure!(
            self.ducking.target_volume_percent <= 100,
            "ducking.target_volume_percent must be at most 100"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
