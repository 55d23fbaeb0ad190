//! Pipeline state machine and shared daemon state.
//!
//! [`PipelineState`] is the externally observable phase of the dictation
//! pipeline.  [`AppState`] is the single source of truth read by status
//! surfaces (menu bar, logs); the orchestrator and worker mutate it.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>` — cheap to
//! clone and safe to share across threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Phases of the dictation pipeline.
///
/// ```text
/// Idle ──key press──▶ Recording ──key release──▶ Transcribing
///                         │ (empty audio)              │ (work item done)
///                         ▼                            ▼
///                       Idle ◀──────────────────────── Idle
/// any stage failure ──▶ Error   (cleared on the next key press)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Waiting for the push-to-talk key.
    Idle,

    /// Microphone is hot; audio is accumulating in the recorder.
    Recording,

    /// A work item is queued or in flight through STT → cleanup → insert.
    Transcribing,

    /// The last dictation failed.  The message lives in
    /// [`AppState::last_error`]; the state clears on the next key press.
    Error,
}

impl PipelineState {
    /// `true` while the pipeline is capturing or processing audio.
    ///
    /// ```
    /// use speakflow::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Recording.is_busy());
    /// assert!(PipelineState::Transcribing.is_busy());
    /// assert!(!PipelineState::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Recording | PipelineState::Transcribing)
    }

    /// Short label for status display.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Recording => "Recording",
            PipelineState::Transcribing => "Transcribing",
            PipelineState::Error => "Error",
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared daemon state mutated by the orchestrator and the worker.
#[derive(Debug, Default)]
pub struct AppState {
    /// Current pipeline phase.
    pub pipeline: PipelineState,

    /// Message for the last failure, cleared on the next key press and after
    /// a successful dictation.
    pub last_error: Option<String>,

    /// The most recent successfully produced dictation text, kept for the
    /// paste-last shortcut.
    pub last_dictation: Option<String>,
}

impl AppState {
    pub fn set_error(&mut self, message: String) {
        log::error!("pipeline: {message}");
        self.pipeline = PipelineState::Error;
        self.last_error = Some(message);
    }
}

/// Thread-safe handle to [`AppState`].
///
/// Lock for short critical sections only; never hold the lock across an
/// `.await` point.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::default()))
}

/// Lock the shared state, recovering the guard when a previous holder
/// panicked.  [`AppState`] is plain data with no invariant spanning multiple
/// fields mid-update, so a poisoned lock still holds a usable value and the
/// orchestrator keeps running.
pub fn lock_state(state: &SharedState) -> std::sync::MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// ServiceGates
// ---------------------------------------------------------------------------

/// Runtime switches consulted before reacting to any hotkey.
///
/// Both flags are plain atomics so the hotkey path never blocks on a lock.
#[derive(Debug)]
pub struct ServiceGates {
    /// Master enable; when off every hotkey event is ignored.
    enabled: AtomicBool,
    /// Result of the startup Automation-permission preflight.
    automation_granted: AtomicBool,
}

impl ServiceGates {
    pub fn new(enabled: bool, automation_granted: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            automation_granted: AtomicBool::new(automation_granted),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_automation_granted(&self, granted: bool) {
        self.automation_granted.store(granted, Ordering::SeqCst);
    }

    /// `true` when hotkeys should be acted on.
    pub fn ready(&self) -> bool {
        self.enabled.load(Ordering::SeqCst) && self.automation_granted.load(Ordering::SeqCst)
    }
}

impl Default for ServiceGates {
    fn default() -> Self {
        Self::new(true, true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
