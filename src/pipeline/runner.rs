//! Dictation orchestrator — reacts to hotkeys and feeds the worker queue.
//!
//! The orchestrator owns the interactive half of the pipeline: starting and
//! stopping capture, ducking system audio, resolving the frontmost app and
//! queueing work items.  The heavy half (STT, cleanup, insertion, history)
//! runs in the [`PipelineWorker`](super::worker::PipelineWorker) so a long
//! transcription never blocks the next press.
//!
//! The work queue is a bounded `tokio::sync::mpsc` channel; when it is full
//! the orchestrator awaits on `send`, which back-pressures further releases
//! instead of dropping dictations.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::Recorder;
use crate::hotkey::HotkeyEvent;
use crate::insert::TextInserter;
use crate::system_audio::SystemAudioDucker;

use super::frontmost::FrontmostApp;
use super::state::{lock_state, PipelineState, ServiceGates, SharedState};

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// One captured dictation, queued for the worker.
#[derive(Debug)]
pub struct WorkItem {
    /// Trimmed 16 kHz mono samples.
    pub audio: Vec<f32>,
    /// Frontmost app at the moment of key release.
    pub source_app_name: Option<String>,
    pub source_app_pid: Option<i32>,
}

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Failures surfaced to the user through the Error state.
#[derive(Debug)]
pub enum PipelineError {
    /// STT engine failed.
    Stt(String),
    /// Text insertion failed.
    Insert(String),
    /// Unexpected failure (e.g. a panicked blocking task).
    Internal(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Stt(msg) => write!(f, "Transcription failed: {msg}"),
            PipelineError::Insert(msg) => write!(f, "Text insertion failed: {msg}"),
            PipelineError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// DictationOrchestrator
// ---------------------------------------------------------------------------

/// Drives the press/release/paste-last event loop.
pub struct DictationOrchestrator {
    state: SharedState,
    recorder: Arc<Recorder>,
    ducker: Arc<SystemAudioDucker>,
    inserter: Arc<TextInserter>,
    frontmost: Arc<dyn FrontmostApp>,
    gates: Arc<ServiceGates>,
    work_tx: mpsc::Sender<WorkItem>,
    paste_last_enabled: bool,
}

impl DictationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: SharedState,
        recorder: Arc<Recorder>,
        ducker: Arc<SystemAudioDucker>,
        inserter: Arc<TextInserter>,
        frontmost: Arc<dyn FrontmostApp>,
        gates: Arc<ServiceGates>,
        work_tx: mpsc::Sender<WorkItem>,
        paste_last_enabled: bool,
    ) -> Self {
        Self {
            state,
            recorder,
            ducker,
            inserter,
            frontmost,
            gates,
            work_tx,
            paste_last_enabled,
        }
    }

    /// Run until the hotkey channel closes.
    pub async fn run(self, mut hotkey_rx: mpsc::Receiver<HotkeyEvent>) {
        while let Some(event) = hotkey_rx.recv().await {
            if !self.gates.ready() {
                log::debug!("pipeline: service gated, ignoring {event:?}");
                continue;
            }

            match event {
                HotkeyEvent::PushToTalkPressed => self.handle_pressed(),
                HotkeyEvent::PushToTalkReleased => self.handle_released().await,
                HotkeyEvent::PasteLast => self.handle_paste_last().await,
            }
        }

        log::info!("pipeline: hotkey channel closed, orchestrator shutting down");
    }

    /// Key down: clear any stale error, duck system audio and open the mic.
    fn handle_pressed(&self) {
        // Auto-repeat and double events arrive as extra presses; a press
        // while already recording is a no-op.
        if self.recorder.is_recording() {
            return;
        }

        {
            let mut st = lock_state(&self.state);
            st.last_error = None;
        }
        self.recorder.reset_live_level();
        self.ducker.duck();

        match self.recorder.start() {
            Ok(()) => {
                log::debug!("pipeline: PushToTalkPressed -> Recording");
                let mut st = lock_state(&self.state);
                st.pipeline = PipelineState::Recording;
            }
            Err(err) => {
                self.ducker.restore();
                let mut st = lock_state(&self.state);
                st.set_error(format!("Unable to start recording: {err}"));
            }
        }
    }

    /// Key up: close the mic, restore volume, and queue the dictation.
    async fn handle_released(&self) {
        if !self.recorder.is_recording() {
            return;
        }

        let stopped = self.recorder.stop();
        // Volume comes back no matter how the stop went.
        self.ducker.restore();

        let audio = match stopped {
            Ok(audio) => audio,
            Err(err) => {
                let mut st = lock_state(&self.state);
                st.set_error(format!("Unable to stop recording: {err}"));
                return;
            }
        };

        if audio.is_empty() {
            log::debug!("pipeline: release produced no speech, back to Idle");
            let mut st = lock_state(&self.state);
            st.pipeline = PipelineState::Idle;
            return;
        }

        let (source_app_name, source_app_pid) = self.frontmost.resolve();
        {
            let mut st = lock_state(&self.state);
            st.pipeline = PipelineState::Transcribing;
        }

        let item = WorkItem {
            audio,
            source_app_name,
            source_app_pid,
        };
        if self.work_tx.send(item).await.is_err() {
            let mut st = lock_state(&self.state);
            st.set_error("Transcription worker is gone".to_string());
        }
    }

    /// Re-insert the last successful dictation at the current cursor.
    ///
    /// The clipboard is deliberately not restored and the text stays on it on
    /// failure, so a failed paste is still recoverable by hand.
    async fn handle_paste_last(&self) {
        if !self.paste_last_enabled {
            return;
        }

        let text = {
            let st = lock_state(&self.state);
            st.last_dictation
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };

        let text = match text {
            Some(text) => text,
            None => {
                let mut st = lock_state(&self.state);
                st.last_error = Some("No recent dictation available to paste.".to_string());
                return;
            }
        };

        let (_, target_pid) = self.frontmost.resolve();
        let inserter = Arc::clone(&self.inserter);
        let result = tokio::task::spawn_blocking(move || {
            inserter.insert_text(&text, false, target_pid, Some(true))
        })
        .await;

        let mut st = lock_state(&self.state);
        match result {
            Ok(Ok(())) => st.last_error = None,
            Ok(Err(err)) => st.set_error(PipelineError::Insert(err.to_string()).to_string()),
            Err(err) => st.set_error(PipelineError::Internal(err.to_string()).to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
