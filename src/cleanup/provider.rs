//! LLM rewrite providers speaking the OpenAI chat-completions dialect.
//!
//! Two backends share the same request shape: a local LM Studio server and
//! the hosted Groq API.  Both are driven through the [`RewriteProvider`]
//! trait so the cleanup engine can walk a fallback chain without caring
//! which is which.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::CleanupConfig;
use crate::language::OutputMode;

/// Floor applied to the configured request timeout.
const MIN_TIMEOUT_MS: u64 = 200;
/// Floor applied to the LM Studio auto-start wait.
const MIN_START_TIMEOUT_MS: u64 = 500;
/// Poll interval while waiting for LM Studio to come up.
const START_POLL_INTERVAL: Duration = Duration::from_millis(350);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("provider returned empty output")]
    Empty,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for RewriteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RewriteError::Timeout
        } else if err.is_decode() {
            RewriteError::Parse(err.to_string())
        } else {
            RewriteError::Request(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// RewriteProvider
// ---------------------------------------------------------------------------

/// A backend that can rewrite dictated text in a given output mode.
#[async_trait]
pub trait RewriteProvider: Send + Sync {
    /// Short stable identifier used in logs and cleanup outcomes.
    fn name(&self) -> &'static str;

    /// Rewrite `text`, returning the model's raw (unvalidated) output.
    async fn rewrite(&self, text: &str, mode: OutputMode) -> Result<String, RewriteError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RewriteProvider>) {}
};

// ---------------------------------------------------------------------------
// Prompting
// ---------------------------------------------------------------------------

/// Per-mode system prompt.  Deliberately strict: the model is a normalizer,
/// not an editor, and the validator rejects anything that drifts.
pub fn build_system_prompt(mode: OutputMode) -> &'static str {
    match mode {
        OutputMode::HinglishRoman => {
            "You are a strict dictation text normalizer.\n\
             Task: minimally clean text while preserving the original words and meaning.\n\
             Rules:\n\
             1) Output Roman Hinglish only.\n\
             2) Keep Hindi words in Roman script as spoken.\n\
             3) Never translate Hindi words to English (e.g. bhai->brother, kya->what is forbidden).\n\
             4) Do not paraphrase, summarize, explain, or add content.\n\
             5) Only fix spacing, punctuation, casing, and stretched letters.\n\
             6) Return one plain line only. No quotes, markdown, or preface."
        }
        OutputMode::English => {
            "You are a strict dictation text normalizer.\n\
             Task: minimally clean English text while preserving original words and meaning.\n\
             Rules:\n\
             1) Keep the same wording as much as possible.\n\
             2) Do not paraphrase, summarize, explain, or add content.\n\
             3) Only fix spacing, punctuation, and casing.\n\
             4) Return one plain line only. No quotes, markdown, or preface."
        }
    }
}

/// Completion token budget scaled to the input length: roughly four tokens
/// per word plus headroom, clamped to [40, 180].
pub fn token_budget_for(text: &str) -> u32 {
    let words = text.split_whitespace().count() as u32;
    (words * 4 + 20).clamp(40, 180)
}

fn chat_payload(model: &str, text: &str, mode: OutputMode) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "temperature": 0,
        "max_tokens": token_budget_for(text),
        "messages": [
            { "role": "system", "content": build_system_prompt(mode) },
            { "role": "user", "content": text },
        ],
    })
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn extract_content(body: &serde_json::Value) -> Result<String, RewriteError> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| RewriteError::Parse("missing choices[0].message.content".into()))?;

    let content = content.trim();
    if content.is_empty() {
        return Err(RewriteError::Empty);
    }
    Ok(content.to_string())
}

fn request_timeout(timeout_ms: u64) -> Duration {
    Duration::from_millis(timeout_ms.max(MIN_TIMEOUT_MS))
}

// ---------------------------------------------------------------------------
// LM Studio
// ---------------------------------------------------------------------------

/// Client for a local LM Studio server.
///
/// When no model is configured the first loaded model reported by
/// `GET /models` is used.  If the server is unreachable the client can launch
/// the LM Studio app once per process lifetime and poll until it answers.
pub struct LmStudioClient {
    client: reqwest::Client,
    base_url: String,
    model: Mutex<Option<String>>,
    auto_start: bool,
    start_timeout: Duration,
    start_attempted: AtomicBool,
}

impl LmStudioClient {
    pub fn from_config(config: &CleanupConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout(config.timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url: config.lmstudio_base_url.trim_end_matches('/').to_string(),
            model: Mutex::new(config.lmstudio_model.clone()),
            auto_start: config.lmstudio_auto_start,
            start_timeout: Duration::from_millis(
                config.lmstudio_start_timeout_ms.max(MIN_START_TIMEOUT_MS),
            ),
            start_attempted: AtomicBool::new(false),
        }
    }

    /// Model identifiers from `GET /models`, or `None` when the server did
    /// not answer.  `quiet` downgrades the failure log while polling.
    async fn list_models(&self, quiet: bool) -> Option<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let result: Result<serde_json::Value, RewriteError> = async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            Ok(response.json().await?)
        }
        .await;

        match result {
            Ok(body) => {
                let ids = body
                    .get("data")
                    .and_then(|d| d.as_array())
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(|e| e.get("id").and_then(|id| id.as_str()))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                Some(ids)
            }
            Err(err) => {
                if quiet {
                    log::debug!("cleanup: LM Studio model lookup failed: {err}");
                } else {
                    log::warn!("cleanup: LM Studio model lookup failed: {err}");
                }
                None
            }
        }
    }

    /// Try to launch the LM Studio app and wait for the server to answer.
    /// Only ever attempted once per process.
    async fn ensure_server_running(&self) -> bool {
        if !self.auto_start || self.start_attempted.swap(true, Ordering::SeqCst) {
            return false;
        }

        log::warn!("cleanup: LM Studio appears offline, attempting to launch the app");
        if !launch_lmstudio_app() {
            return false;
        }

        let deadline = Instant::now() + self.start_timeout;
        while Instant::now() < deadline {
            if self.list_models(true).await.is_some() {
                log::info!("cleanup: LM Studio became reachable after auto-start");
                return true;
            }
            tokio::time::sleep(START_POLL_INTERVAL).await;
        }

        log::warn!(
            "cleanup: LM Studio did not become reachable within {:.1}s",
            self.start_timeout.as_secs_f32()
        );
        false
    }

    async fn resolve_model(&self) -> Result<String, RewriteError> {
        let mut cached = self.model.lock().await;
        if let Some(model) = cached.as_ref() {
            return Ok(model.clone());
        }

        log::info!("cleanup: resolving LM Studio model from {}/models", self.base_url);
        let mut models = self.list_models(false).await;
        if models.is_none() && self.ensure_server_running().await {
            models = self.list_models(false).await;
        }

        match models {
            None => Err(RewriteError::Unavailable("LM Studio is not reachable".into())),
            Some(ids) if ids.is_empty() => Err(RewriteError::Unavailable(
                "LM Studio is reachable but no models are loaded".into(),
            )),
            Some(ids) => {
                let model = ids[0].clone();
                log::info!("cleanup: LM Studio using model '{model}'");
                *cached = Some(model.clone());
                Ok(model)
            }
        }
    }
}

#[async_trait]
impl RewriteProvider for LmStudioClient {
    fn name(&self) -> &'static str {
        "lmstudio"
    }

    async fn rewrite(&self, text: &str, mode: OutputMode) -> Result<String, RewriteError> {
        let model = self.resolve_model().await?;

        log::info!(
            "cleanup: LM Studio rewrite started (mode={}, chars={})",
            mode.as_str(),
            text.len()
        );
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&chat_payload(&model, text, mode))
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        let content = extract_content(&body)?;
        log::info!(
            "cleanup: LM Studio rewrite returned (chars={} -> {})",
            text.len(),
            content.len()
        );
        Ok(content)
    }
}

/// Launch the LM Studio desktop app.  macOS only; elsewhere there is nothing
/// sensible to exec, so this reports failure and the caller skips the wait.
#[cfg(target_os = "macos")]
fn launch_lmstudio_app() -> bool {
    match std::process::Command::new("open")
        .args(["-a", "LM Studio"])
        .spawn()
    {
        Ok(_) => true,
        Err(err) => {
            log::warn!("cleanup: unable to launch LM Studio app: {err}");
            false
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn launch_lmstudio_app() -> bool {
    false
}

// ---------------------------------------------------------------------------
// Groq
// ---------------------------------------------------------------------------

/// Client for the hosted Groq chat-completions API.
pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GroqClient {
    pub fn from_config(config: &CleanupConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout(config.timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url: config.groq_base_url.trim_end_matches('/').to_string(),
            model: config.groq_model.clone(),
            api_key: config
                .groq_api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        }
    }
}

#[async_trait]
impl RewriteProvider for GroqClient {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn rewrite(&self, text: &str, mode: OutputMode) -> Result<String, RewriteError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| RewriteError::Unavailable("Groq API key is missing".into()))?;

        log::info!(
            "cleanup: Groq rewrite started (mode={}, chars={})",
            mode.as_str(),
            text.len()
        );
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&chat_payload(&self.model, text, mode))
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        let content = extract_content(&body)?;
        log::info!(
            "cleanup: Groq rewrite returned (chars={} -> {})",
            text.len(),
            content.len()
        );
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_budget_clamps_low() {
        assert_eq!(token_budget_for(""), 40);
        assert_eq!(token_budget_for("one two"), 40);
    }

    #[test]
    fn token_budget_scales_with_words() {
        // 10 words * 4 + 20 = 60.
        let text = "a b c d e f g h i j";
        assert_eq!(token_budget_for(text), 60);
    }

    #[test]
    fn token_budget_clamps_high() {
        let text = "word ".repeat(100);
        assert_eq!(token_budget_for(&text), 180);
    }

    #[test]
    fn system_prompt_differs_per_mode() {
        let english = build_system_prompt(OutputMode::English);
        let hinglish = build_system_prompt(OutputMode::HinglishRoman);
        assert_ne!(english, hinglish);
        assert!(hinglish.contains("Roman Hinglish"));
        assert!(english.contains("English"));
    }

    #[test]
    fn extract_content_happy_path() {
        let body = serde_json::json!({
            "choices": [ { "message": { "content": "  hello there  " } } ]
        });
        assert_eq!(extract_content(&body).ok().as_deref(), Some("hello there"));
    }

    #[test]
    fn extract_content_empty_is_error() {
        let body = serde_json::json!({
            "choices": [ { "message": { "content": "   " } } ]
        });
        assert!(matches!(extract_content(&body), Err(RewriteError::Empty)));
    }

    #[test]
    fn extract_content_missing_choices_is_parse_error() {
        let body = serde_json::json!({ "choices": [] });
        assert!(matches!(extract_content(&body), Err(RewriteError::Parse(_))));
    }

    #[test]
    fn chat_payload_shape() {
        let payload = chat_payload("test-model", "hello there", OutputMode::English);
        assert_eq!(payload["model"], "test-model");
        assert_eq!(payload["temperature"], 0);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(payload["messages"][1]["content"], "hello there");
    }

    #[test]
    fn groq_without_key_is_unavailable() {
        let config = CleanupConfig {
            groq_api_key: None,
            ..CleanupConfig::default()
        };
        let client = GroqClient::from_config(&config);
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let result = rt.block_on(client.rewrite("hello", OutputMode::English));
        assert!(matches!(result, Err(RewriteError::Unavailable(_))));
    }

    #[test]
    fn groq_blank_key_is_unavailable() {
        let config = CleanupConfig {
            groq_api_key: Some("   ".into()),
            ..CleanupConfig::default()
        };
        let client = GroqClient::from_config(&config);
        assert!(client.api_key.is_none());
    }

    #[test]
    fn request_timeout_floor() {
        assert_eq!(request_timeout(50), Duration::from_millis(200));
        assert_eq!(request_timeout(1_500), Duration::from_millis(1_500));
    }
}
