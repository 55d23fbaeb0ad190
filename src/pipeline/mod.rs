//! Dictation pipeline — hotkeys in, pasted text out.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────┐
//!  HotkeyEvent ──▶│ DictationOrchestr.│── duck / capture / frontmost
//!                 └─────────┬─────────┘
//!                           │ WorkItem (bounded queue, cap 5)
//!                 ┌─────────▼─────────┐
//!                 │  PipelineWorker   │── STT → cleanup → insert → history
//!                 └─────────┬─────────┘
//!                           │
//!                    SharedState (Idle / Recording / Transcribing / Error)
//! ```
//!
//! The orchestrator stays responsive to hotkeys while the single worker
//! processes dictations in speech order.  [`WORK_QUEUE_CAPACITY`] bounds the
//! backlog; a full queue back-pressures the orchestrator's release handler
//! rather than dropping audio.

pub mod frontmost;
pub mod runner;
pub mod state;
pub mod worker;

pub use frontmost::{FrontmostApp, SystemFrontmost};
pub use runner::{DictationOrchestrator, PipelineError, WorkItem};
pub use state::{
    lock_state, new_shared_state, AppState, PipelineState, ServiceGates, SharedState,
};
pub use worker::PipelineWorker;

/// Maximum number of dictations waiting for the worker.
pub const WORK_QUEUE_CAPACITY: usize = 5;
