//! Pipeline worker — drains the work queue one dictation at a time.
//!
//! Exactly one worker runs per daemon, so dictations complete in the order
//! they were spoken.  Each item goes STT → cleanup → insert → history; any
//! stage failure surfaces through the Error state and the worker moves on to
//! the next item.
//!
//! Blocking work (Whisper inference, clipboard I/O) goes through
//! `tokio::task::spawn_blocking` so the runtime stays responsive.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cleanup::TextCleanup;
use crate::history::{HistorySink, NewTranscript};
use crate::insert::TextInserter;
use crate::stt::SttEngine;

use super::runner::{PipelineError, WorkItem};
use super::state::{lock_state, PipelineState, SharedState};

// ---------------------------------------------------------------------------
// PipelineWorker
// ---------------------------------------------------------------------------

/// Processes queued dictations.
pub struct PipelineWorker {
    state: SharedState,
    stt: Arc<dyn SttEngine>,
    cleanup: Arc<TextCleanup>,
    inserter: Arc<TextInserter>,
    history: Arc<dyn HistorySink>,
}

impl PipelineWorker {
    pub fn new(
        state: SharedState,
        stt: Arc<dyn SttEngine>,
        cleanup: Arc<TextCleanup>,
        inserter: Arc<TextInserter>,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            state,
            stt,
            cleanup,
            inserter,
            history,
        }
    }

    /// Run until the work channel closes.
    pub async fn run(self, mut work_rx: mpsc::Receiver<WorkItem>) {
        while let Some(item) = work_rx.recv().await {
            match self.process(item).await {
                Ok(()) => {
                    let mut st = lock_state(&self.state);
                    st.last_error = None;
                    st.pipeline = PipelineState::Idle;
                }
                Err(err) => {
                    let mut st = lock_state(&self.state);
                    st.set_error(err.to_string());
                }
            }
        }

        log::info!("pipeline: work channel closed, worker shutting down");
    }

    async fn process(&self, item: WorkItem) -> Result<(), PipelineError> {
        // ── STT ──
        let stt = Arc::clone(&self.stt);
        let audio = item.audio;
        let transcript = tokio::task::spawn_blocking(move || stt.transcribe(&audio))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?
            .map_err(|e| PipelineError::Stt(e.to_string()))?;

        log::debug!("pipeline: transcript = {:?}", transcript.raw_text);

        // ── Cleanup (infallible, degrades to the deterministic floor) ──
        let outcome = self.cleanup.clean(&transcript).await;

        // Whisper heard nothing usable; not an error.
        if outcome.text.is_empty() {
            log::debug!("pipeline: cleanup produced empty text, nothing to insert");
            return Ok(());
        }

        // Remember the dictation before pasting so paste-last works even if
        // the insert below fails.
        {
            let mut st = lock_state(&self.state);
            st.last_dictation = Some(outcome.text.clone());
        }

        // ── Insert ──
        let inserter = Arc::clone(&self.inserter);
        let text = outcome.text.clone();
        let target_pid = item.source_app_pid;
        tokio::task::spawn_blocking(move || inserter.insert_text(&text, true, target_pid, None))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?
            .map_err(|e| PipelineError::Insert(e.to_string()))?;

        // ── History (fire-and-forget; a broken store never fails a dictation) ──
        let record = NewTranscript {
            raw_text: transcript.raw_text,
            final_text: outcome.text,
            detected_language: transcript.detected_language,
            confidence: transcript.confidence,
            output_mode: outcome.output_mode.as_str().to_string(),
            source_app: item.source_app_name,
        };
        let history = Arc::clone(&self.history);
        let history_result =
            tokio::task::spawn_blocking(move || history.add(&record)).await;
        match history_result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::warn!("pipeline: history write failed: {err}"),
            Err(err) => log::warn!("pipeline: history task panicked: {err}"),
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::cleanup::RewriteLimits;
    use crate::config::LanguageMode;
    use crate::history::HistoryError;
    use crate::insert::clipboard::MemClipboard;
    use crate::insert::PasteDriver;
    use crate::pipeline::state::new_shared_state;
    use crate::stt::{MockSttEngine, SttError, Transcript};

    /// Fails the first transcription, succeeds afterwards.
    struct FlakyStt {
        text: String,
        calls: AtomicUsize,
    }

    impl SttEngine for FlakyStt {
        fn transcribe(&self, _audio: &[f32]) -> Result<Transcript, SttError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SttError::Transcription("inference failed".into()))
            } else {
                Ok(Transcript {
                    raw_text: self.text.clone(),
                    detected_language: None,
                    confidence: None,
                })
            }
        }
    }

    struct AlwaysPaste;

    impl PasteDriver for AlwaysPaste {
        fn primary(&self, _target_pid: Option<i32>) -> bool {
            true
        }
        fn secondary(&self) -> bool {
            false
        }
    }

    struct NeverPaste;

    impl PasteDriver for NeverPaste {
        fn primary(&self, _target_pid: Option<i32>) -> bool {
            false
        }
        fn secondary(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingHistory {
        records: Mutex<Vec<NewTranscript>>,
    }

    impl HistorySink for RecordingHistory {
        fn add(&self, transcript: &NewTranscript) -> Result<(), HistoryError> {
            self.records.lock().unwrap().push(transcript.clone());
            Ok(())
        }
    }

    struct FailingHistory {
        attempts: AtomicUsize,
    }

    impl HistorySink for FailingHistory {
        fn add(&self, _transcript: &NewTranscript) -> Result<(), HistoryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HistoryError::Io(std::io::Error::other("disk full")))
        }
    }

    fn cleanup() -> Arc<TextCleanup> {
        Arc::new(TextCleanup::with_providers(
            LanguageMode::English,
            RewriteLimits {
                min_overlap_ratio: 0.45,
                max_expansion_ratio: 2.0,
            },
            vec![],
        ))
    }

    fn item() -> WorkItem {
        WorkItem {
            audio: vec![0.1_f32; 16_000],
            source_app_name: Some("Notes".to_string()),
            source_app_pid: Some(4242),
        }
    }

    fn worker(
        stt: Arc<dyn SttEngine>,
        driver: Arc<dyn PasteDriver>,
        history: Arc<dyn HistorySink>,
    ) -> (PipelineWorker, SharedState, Arc<MemClipboard>) {
        let state = new_shared_state();
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        let inserter = Arc::new(TextInserter::with_ports(0, false, clipboard.clone(), driver));
        let w = PipelineWorker::new(
            Arc::clone(&state),
            stt,
            cleanup(),
            inserter,
            history,
        );
        (w, state, clipboard)
    }

    #[tokio::test]
    async fn successful_dictation_returns_to_idle() {
        let history = Arc::new(RecordingHistory::default());
        let (w, state, clipboard) = worker(
            Arc::new(MockSttEngine::ok("hello there")),
            Arc::new(AlwaysPaste),
            history.clone(),
        );

        let (tx, rx) = mpsc::channel(5);
        tx.send(item()).await.unwrap();
        drop(tx);
        w.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Idle);
        assert!(st.last_error.is_none());
        assert_eq!(st.last_dictation.as_deref(), Some("Hello there."));
        drop(st);

        // Clipboard was restored after the paste.
        assert_eq!(clipboard.content().as_deref(), Some("before"));

        let records = history.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].final_text, "Hello there.");
        assert_eq!(records[0].raw_text, "hello there");
        assert_eq!(records[0].output_mode, "english");
        assert_eq!(records[0].source_app.as_deref(), Some("Notes"));
    }

    #[tokio::test]
    async fn stt_failure_enters_error_state() {
        let (w, state, _clipboard) = worker(
            Arc::new(MockSttEngine::err(SttError::Transcription(
                "inference failed".into(),
            ))),
            Arc::new(AlwaysPaste),
            Arc::new(RecordingHistory::default()),
        );

        let (tx, rx) = mpsc::channel(5);
        tx.send(item()).await.unwrap();
        drop(tx);
        w.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Error);
        let message = st.last_error.clone().unwrap();
        assert!(message.contains("Transcription failed"), "got: {message}");
    }

    #[tokio::test]
    async fn empty_transcript_skips_insert_and_history() {
        let history = Arc::new(RecordingHistory::default());
        let (w, state, clipboard) = worker(
            Arc::new(MockSttEngine::ok("")),
            Arc::new(NeverPaste),
            history.clone(),
        );

        let (tx, rx) = mpsc::channel(5);
        tx.send(item()).await.unwrap();
        drop(tx);
        w.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Idle);
        assert!(st.last_dictation.is_none());
        drop(st);
        assert_eq!(clipboard.content().as_deref(), Some("before"));
        assert!(history.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_failure_enters_error_but_keeps_last_dictation() {
        let (w, state, _clipboard) = worker(
            Arc::new(MockSttEngine::ok("hello there")),
            Arc::new(NeverPaste),
            Arc::new(RecordingHistory::default()),
        );

        let (tx, rx) = mpsc::channel(5);
        tx.send(item()).await.unwrap();
        drop(tx);
        w.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Error);
        // The text is still available to paste-last.
        assert_eq!(st.last_dictation.as_deref(), Some("Hello there."));
    }

    #[tokio::test]
    async fn history_failure_does_not_fail_the_dictation() {
        let history = Arc::new(FailingHistory {
            attempts: AtomicUsize::new(0),
        });
        let (w, state, _clipboard) = worker(
            Arc::new(MockSttEngine::ok("hello there")),
            Arc::new(AlwaysPaste),
            history.clone(),
        );

        let (tx, rx) = mpsc::channel(5);
        tx.send(item()).await.unwrap();
        drop(tx);
        w.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Idle);
        assert!(st.last_error.is_none());
        assert_eq!(history.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn worker_continues_after_an_error() {
        // First item fails in STT, second succeeds; the worker must recover.
        let stt = Arc::new(FlakyStt {
            text: "hello there".to_string(),
            calls: AtomicUsize::new(0),
        });
        let (w, state, _clipboard) = worker(
            stt,
            Arc::new(AlwaysPaste),
            Arc::new(RecordingHistory::default()),
        );

        let (tx, rx) = mpsc::channel(5);
        tx.send(item()).await.unwrap();
        tx.send(item()).await.unwrap();
        drop(tx);
        w.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Idle);
        assert!(st.last_error.is_none());
        assert_eq!(st.last_dictation.as_deref(), Some("Hello there."));
    }
}
