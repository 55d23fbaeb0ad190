//! Output-language classification and deterministic text normalization.
//!
//! The classifier decides whether a transcript should be rendered as plain
//! English or as Romanized Hinglish (Hindi in Latin script, as colloquially
//! typed).  The decision is a pure function of the configured
//! [`LanguageMode`] policy and the transcript's script/language diagnostics,
//! so the same transcript always classifies the same way.
//!
//! Normalization here is the deterministic cleanup floor: whitespace
//! collapsing, first-letter capitalization (English only) and terminal
//! punctuation.  It always succeeds and is what the cleanup engine falls
//! back to when every rewrite provider fails.

pub mod translit;

pub use translit::transliterate_devanagari;

use crate::config::LanguageMode;
use crate::stt::Transcript;

// ---------------------------------------------------------------------------
// OutputMode / LanguageDecision
// ---------------------------------------------------------------------------

/// How the final dictation text should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    English,
    HinglishRoman,
}

impl OutputMode {
    /// Stable identifier used in logs and the history store.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::English => "english",
            OutputMode::HinglishRoman => "hinglish_roman",
        }
    }
}

/// Result of classifying a transcript, including the script diagnostics that
/// fed the decision.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDecision {
    pub output_mode: OutputMode,
    pub contains_devanagari: bool,
    pub mixed_script_ratio: f32,
}

// ---------------------------------------------------------------------------
// Script diagnostics
// ---------------------------------------------------------------------------

/// Hindi language-detection confidence at or above which an auto-mode
/// transcript is treated as Hinglish.
const HINDI_CONFIDENCE_THRESHOLD: f32 = 0.45;

/// Non-ASCII character ratio at or above which a transcript is treated as
/// mixed-script Hinglish even without a detected language.
const MIXED_SCRIPT_THRESHOLD: f32 = 0.07;

/// Whether `text` contains any codepoint in the Devanagari block
/// (U+0900–U+097F).
pub fn contains_devanagari(text: &str) -> bool {
    text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))
}

/// Fraction of characters in `text` that are non-ASCII; `0.0` for empty text.
pub fn mixed_script_ratio(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
    non_ascii as f32 / total as f32
}

// ---------------------------------------------------------------------------
// decide_output_mode
// ---------------------------------------------------------------------------

/// Decide the output mode for a transcript.
///
/// A forced policy wins unconditionally; the script diagnostics are still
/// computed so they can be logged and stored.  In auto mode the order is:
/// Devanagari present, then detected Hindi with sufficient confidence, then
/// the non-ASCII ratio, then English.
pub fn decide_output_mode(mode: LanguageMode, transcript: &Transcript) -> LanguageDecision {
    let has_devanagari = contains_devanagari(&transcript.raw_text);
    let ratio = mixed_script_ratio(&transcript.raw_text);

    let decision = |output_mode| LanguageDecision {
        output_mode,
        contains_devanagari: has_devanagari,
        mixed_script_ratio: ratio,
    };

    match mode {
        LanguageMode::English => return decision(OutputMode::English),
        LanguageMode::HinglishRoman => return decision(OutputMode::HinglishRoman),
        LanguageMode::Auto => {}
    }

    if has_devanagari {
        return decision(OutputMode::HinglishRoman);
    }

    if transcript.detected_language.as_deref() == Some("hi")
        && transcript.confidence.unwrap_or(0.0) >= HINDI_CONFIDENCE_THRESHOLD
    {
        return decision(OutputMode::HinglishRoman);
    }

    if ratio >= MIXED_SCRIPT_THRESHOLD {
        return decision(OutputMode::HinglishRoman);
    }

    decision(OutputMode::English)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic English normalization: collapse spaces, capitalize the first
/// letter, append terminal punctuation when missing.
pub fn normalize_english(text: &str) -> String {
    let text = normalize_spaces(text);
    if text.is_empty() {
        return text;
    }

    let mut chars = text.chars();
    let first = chars.next().map(|c| c.to_uppercase().to_string());
    let mut out = first.unwrap_or_default();
    out.push_str(chars.as_str());

    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

/// Deterministic Hinglish normalization: transliterate any Devanagari, then
/// collapse spaces.  Colloquial casing is preserved; only terminal
/// punctuation is normalized.
pub fn normalize_hinglish_roman(text: &str) -> String {
    let text = if contains_devanagari(text) {
        transliterate_devanagari(text)
    } else {
        text.to_string()
    };
    let text = normalize_spaces(&text);
    if text.is_empty() {
        return text;
    }

    let mut out = text;
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
