//! Transcript cleanup — deterministic normalization plus optional LLM rewrite.
//!
//! # Flow
//!
//! ```text
//! Transcript ──► decide_output_mode ──► deterministic normalization (floor)
//!                                              │
//!                        provider chain ◄──────┘ (skipped when empty text
//!                              │                  or no providers)
//!                   rewrite ──► validate_rewrite ──► accepted? return it
//!                              │
//!                              └── rejected/failed ──► next provider,
//!                                                      else the floor
//! ```
//!
//! [`TextCleanup::clean`] is infallible: every provider failure or rejection
//! degrades to the deterministic floor, never to an error.

pub mod provider;
pub mod validate;

use std::sync::Arc;

use crate::config::{AppConfig, CleanupConfig, CleanupProvider, LanguageMode};
use crate::language::{
    decide_output_mode, normalize_english, normalize_hinglish_roman, OutputMode,
};
use crate::stt::Transcript;

pub use provider::{GroqClient, LmStudioClient, RewriteError, RewriteProvider};
pub use validate::{validate_rewrite, RewriteLimits};

// ---------------------------------------------------------------------------
// CleanupOutcome
// ---------------------------------------------------------------------------

/// Result of cleaning one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupOutcome {
    /// Final text, ready for insertion.  Empty when the transcript was empty.
    pub text: String,
    /// The output mode the text was normalized into.
    pub output_mode: OutputMode,
    /// Whether an LLM rewrite was accepted (as opposed to the deterministic
    /// floor).
    pub used_remote_rewrite: bool,
    /// Name of the provider whose rewrite was accepted, if any.
    pub provider: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// TextCleanup
// ---------------------------------------------------------------------------

/// The cleanup engine: owns the provider chain and the validation limits.
pub struct TextCleanup {
    language_mode: LanguageMode,
    limits: RewriteLimits,
    providers: Vec<Arc<dyn RewriteProvider>>,
}

impl TextCleanup {
    /// Build the engine from config, wiring the provider chain according to
    /// the configured policy.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            language_mode: config.language_mode,
            limits: RewriteLimits {
                min_overlap_ratio: config.cleanup.min_overlap_ratio,
                max_expansion_ratio: config.cleanup.max_expansion_ratio,
            },
            providers: provider_chain(&config.cleanup),
        }
    }

    /// Construct with an explicit provider chain.  Used by tests to inject
    /// scripted providers.
    pub fn with_providers(
        language_mode: LanguageMode,
        limits: RewriteLimits,
        providers: Vec<Arc<dyn RewriteProvider>>,
    ) -> Self {
        Self {
            language_mode,
            limits,
            providers,
        }
    }

    /// Clean a transcript.  Never fails; the deterministic normalization is
    /// always available as the floor result.
    pub async fn clean(&self, transcript: &Transcript) -> CleanupOutcome {
        let decision = decide_output_mode(self.language_mode, transcript);

        let deterministic = match decision.output_mode {
            OutputMode::English => normalize_english(&transcript.raw_text),
            OutputMode::HinglishRoman => normalize_hinglish_roman(&transcript.raw_text),
        };

        let floor = CleanupOutcome {
            text: deterministic.clone(),
            output_mode: decision.output_mode,
            used_remote_rewrite: false,
            provider: None,
        };

        if self.providers.is_empty() || deterministic.is_empty() {
            return floor;
        }

        log::info!(
            "cleanup: rewrite order: {}",
            self.providers
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for provider in &self.providers {
            match provider.rewrite(&deterministic, decision.output_mode).await {
                Ok(raw) => {
                    if let Some(text) = validate_rewrite(
                        &deterministic,
                        &raw,
                        decision.output_mode,
                        &self.limits,
                    ) {
                        return CleanupOutcome {
                            text,
                            output_mode: decision.output_mode,
                            used_remote_rewrite: true,
                            provider: Some(provider.name()),
                        };
                    }
                    log::info!(
                        "cleanup: provider '{}' output rejected, trying next fallback",
                        provider.name()
                    );
                }
                Err(err) => {
                    log::warn!(
                        "cleanup: provider '{}' failed ({err}), trying next fallback",
                        provider.name()
                    );
                }
            }
        }

        floor
    }
}

/// Provider chain for the configured policy.
///
/// * `groq` — remote first, local fallback.
/// * `lmstudio` — local first, remote fallback.
/// * `deterministic` (or rewrites disabled) — no providers at all.
fn provider_chain(config: &CleanupConfig) -> Vec<Arc<dyn RewriteProvider>> {
    if !config.rewrite_enabled {
        return Vec::new();
    }

    let groq = || Arc::new(GroqClient::from_config(config)) as Arc<dyn RewriteProvider>;
    let lmstudio = || Arc::new(LmStudioClient::from_config(config)) as Arc<dyn RewriteProvider>;

    match config.provider {
        CleanupProvider::Deterministic => Vec::new(),
        CleanupProvider::Groq => vec![groq(), lmstudio()],
        CleanupProvider::Lmstudio => vec![lmstudio(), groq()],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    /// Provider scripted to return a fixed response (or error) and count
    /// invocations.
    struct ScriptedProvider {
        name: &'static str,
        response: Result<String, fn() -> RewriteError>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn ok(name: &'static str, text: &str) -> Arc<Self> {
            Arc::new(Self {
                name,
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str, err: fn() -> RewriteError) -> Arc<Self> {
            Arc::new(Self {
                name,
                response: Err(err),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RewriteProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn rewrite(&self, _text: &str, _mode: OutputMode) -> Result<String, RewriteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn limits() -> RewriteLimits {
        RewriteLimits {
            min_overlap_ratio: 0.45,
            max_expansion_ratio: 2.0,
        }
    }

    fn transcript(text: &str) -> Transcript {
        Transcript {
            raw_text: text.to_string(),
            detected_language: Some("en".to_string()),
            confidence: Some(0.9),
        }
    }

    #[tokio::test]
    async fn deterministic_floor_without_providers() {
        let cleanup = TextCleanup::with_providers(LanguageMode::English, limits(), vec![]);
        let outcome = cleanup.clean(&transcript("hello there")).await;
        assert_eq!(outcome.text, "Hello there.");
        assert!(!outcome.used_remote_rewrite);
        assert_eq!(outcome.provider, None);
    }

    #[tokio::test]
    async fn empty_transcript_short_circuits_providers() {
        let provider = ScriptedProvider::ok("mock", "should never be used");
        let cleanup = TextCleanup::with_providers(
            LanguageMode::English,
            limits(),
            vec![provider.clone()],
        );
        let outcome = cleanup.clean(&Transcript::empty()).await;
        assert!(outcome.text.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn accepted_rewrite_wins() {
        let provider = ScriptedProvider::ok("mock", "Hello there, how are you?");
        let cleanup = TextCleanup::with_providers(
            LanguageMode::English,
            limits(),
            vec![provider.clone()],
        );
        let outcome = cleanup.clean(&transcript("hello there how are you")).await;
        assert_eq!(outcome.text, "Hello there, how are you?");
        assert!(outcome.used_remote_rewrite);
        assert_eq!(outcome.provider, Some("mock"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn rejected_rewrite_falls_through_to_next_provider() {
        let drifting = ScriptedProvider::ok("drifting", "Something entirely unrelated instead");
        let faithful = ScriptedProvider::ok("faithful", "Hello there, how are you?");
        let cleanup = TextCleanup::with_providers(
            LanguageMode::English,
            limits(),
            vec![drifting.clone(), faithful.clone()],
        );
        let outcome = cleanup.clean(&transcript("hello there how are you")).await;
        assert_eq!(outcome.provider, Some("faithful"));
        assert_eq!(drifting.calls(), 1);
        assert_eq!(faithful.calls(), 1);
    }

    #[tokio::test]
    async fn provider_error_falls_through_to_next_provider() {
        let broken = ScriptedProvider::failing("broken", || RewriteError::Timeout);
        let faithful = ScriptedProvider::ok("faithful", "Hello there.");
        let cleanup = TextCleanup::with_providers(
            LanguageMode::English,
            limits(),
            vec![broken.clone(), faithful.clone()],
        );
        let outcome = cleanup.clean(&transcript("hello there")).await;
        assert_eq!(outcome.provider, Some("faithful"));
        assert!(outcome.used_remote_rewrite);
    }

    #[tokio::test]
    async fn all_providers_fail_returns_floor() {
        let broken = ScriptedProvider::failing("broken", || {
            RewriteError::Unavailable("down".into())
        });
        let also_broken = ScriptedProvider::failing("also-broken", || RewriteError::Timeout);
        let cleanup = TextCleanup::with_providers(
            LanguageMode::English,
            limits(),
            vec![broken, also_broken],
        );
        let outcome = cleanup.clean(&transcript("hello there")).await;
        assert_eq!(outcome.text, "Hello there.");
        assert!(!outcome.used_remote_rewrite);
        assert_eq!(outcome.provider, None);
    }

    #[tokio::test]
    async fn hinglish_translation_rejected_keeps_floor() {
        let translator = ScriptedProvider::ok("translator", "Brother, what is going on?");
        let cleanup = TextCleanup::with_providers(
            LanguageMode::HinglishRoman,
            limits(),
            vec![translator],
        );
        let outcome = cleanup.clean(&transcript("bhai kya haal hai")).await;
        assert_eq!(outcome.output_mode, OutputMode::HinglishRoman);
        assert!(!outcome.used_remote_rewrite);
        assert_eq!(outcome.text, "bhai kya haal hai.");
    }

    // ---- provider_chain ----

    #[test]
    fn chain_disabled_when_rewrite_off() {
        let config = CleanupConfig {
            rewrite_enabled: false,
            ..CleanupConfig::default()
        };
        assert!(provider_chain(&config).is_empty());
    }

    #[test]
    fn chain_empty_for_deterministic_policy() {
        let config = CleanupConfig {
            provider: CleanupProvider::Deterministic,
            ..CleanupConfig::default()
        };
        assert!(provider_chain(&config).is_empty());
    }

    #[test]
    fn chain_remote_first_for_groq_policy() {
        let config = CleanupConfig {
            provider: CleanupProvider::Groq,
            ..CleanupConfig::default()
        };
        let chain = provider_chain(&config);
        let names: Vec<_> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["groq", "lmstudio"]);
    }

    #[test]
    fn chain_local_first_for_lmstudio_policy() {
        let config = CleanupConfig {
            provider: CleanupProvider::Lmstudio,
            ..CleanupConfig::default()
        };
        let chain = provider_chain(&config);
        let names: Vec<_> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["lmstudio", "groq"]);
    }
}
