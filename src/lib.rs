//! SpeakFlow — push-to-talk dictation for the desktop.
//!
//! Hold a global hotkey to record from the microphone; release it and the
//! audio flows through a background pipeline: Whisper transcription, language
//! classification (English vs. Romanized Hinglish), text cleanup with
//! optional LLM rewrite providers, and clipboard-paste insertion into the
//! focused application.  Every completed dictation is appended to a local
//! SQLite history.
//!
//! Module map:
//!
//! - [`audio`]    — microphone capture, silence trimming, live level meter
//! - [`language`] — output-mode decision, normalization, transliteration
//! - [`stt`]      — the `SttEngine` trait and the Whisper implementation
//! - [`cleanup`]  — deterministic cleanup plus validated rewrite providers
//! - [`insert`]   — clipboard-paste text insertion with retries
//! - [`pipeline`] — orchestrator state machine and the background worker
//! - [`hotkey`]   — global push-to-talk / paste-last key listener
//! - [`history`]  — transcript history store
//! - [`config`]   — settings file and platform paths

pub mod audio;
pub mod cleanup;
pub mod config;
pub mod history;
pub mod hotkey;
pub mod insert;
pub mod language;
pub mod pipeline;
pub mod stt;
pub mod system_audio;
