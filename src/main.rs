//! Daemon entry point — speakflow push-to-talk dictation.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load and validate [`AppConfig`] (defaults on first run).
//! 3. Preflight the Automation permission and build the service gates.
//! 4. Build the recorder, ducker, inserter, cleanup engine, history store
//!    and the (lazily loaded) Whisper engine.
//! 5. Wire the channels: hotkeys → orchestrator, work items → worker.
//! 6. Spawn the worker and orchestrator tasks, start the hotkey listener.
//! 7. Block on Ctrl-C; on shutdown stop any live capture and restore the
//!    system volume.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use speakflow::audio::Recorder;
use speakflow::cleanup::TextCleanup;
use speakflow::config::{AppConfig, AppPaths};
use speakflow::history::{HistorySink, NoopHistory, TranscriptHistory};
use speakflow::hotkey::{parse_key, HotkeyEvent, HotkeyListener};
use speakflow::insert::{preflight_automation_permission, TextInserter};
use speakflow::pipeline::{
    new_shared_state, DictationOrchestrator, PipelineWorker, ServiceGates, SystemFrontmost,
    WORK_QUEUE_CAPACITY,
};
use speakflow::stt::{SttEngine, SttError, Transcript, WhisperEngine};
use speakflow::system_audio::SystemAudioDucker;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("speakflow starting up");

    let paths = AppPaths::new();
    let config = AppConfig::load().context("loading settings")?;
    config.validate().context("validating settings")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    // Automation preflight: the first call also triggers the system prompt.
    let automation_granted = preflight_automation_permission();
    if !automation_granted {
        log::warn!(
            "Automation permission not granted; dictation is disabled until it is. \
             Grant access to System Events in System Settings > Privacy & Security."
        );
    }
    let gates = Arc::new(ServiceGates::new(true, automation_granted));

    // ── Components ──
    let state = new_shared_state();
    let recorder = Arc::new(Recorder::new(config.audio.clone()));
    let ducker = Arc::new(SystemAudioDucker::from_config(&config.ducking));
    let inserter = Arc::new(TextInserter::from_config(&config.insert));
    let cleanup = Arc::new(TextCleanup::from_config(&config));
    let frontmost = Arc::new(SystemFrontmost);

    let history: Arc<dyn HistorySink> = match TranscriptHistory::open(&paths.history_db) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            log::warn!(
                "history database unavailable ({err}); dictations will not be recorded"
            );
            Arc::new(NoopHistory)
        }
    };

    // The model file is only read on the first dictation; a missing file is
    // reported per-dictation instead of refusing to start.
    let model_path = paths.models_dir.join(format!("ggml-{}.bin", config.stt.model));
    let stt: Arc<dyn SttEngine> =
        match WhisperEngine::new(&model_path, config.stt.language.clone()) {
            Ok(engine) => Arc::new(engine),
            Err(err) => {
                log::warn!("whisper model unavailable: {err}");
                Arc::new(MissingModelStt {
                    path: model_path.display().to_string(),
                })
            }
        };

    // ── Channels and tasks ──
    let (hotkey_tx, hotkey_rx) = mpsc::channel::<HotkeyEvent>(16);
    let (work_tx, work_rx) = mpsc::channel(WORK_QUEUE_CAPACITY);

    let worker = PipelineWorker::new(
        Arc::clone(&state),
        stt,
        cleanup,
        Arc::clone(&inserter),
        history,
    );
    rt.spawn(worker.run(work_rx));

    let orchestrator = DictationOrchestrator::new(
        Arc::clone(&state),
        Arc::clone(&recorder),
        Arc::clone(&ducker),
        inserter,
        frontmost,
        gates,
        work_tx,
        config.hotkey.paste_last_enabled,
    );
    rt.spawn(orchestrator.run(hotkey_rx));

    // ── Hotkeys ──
    let push_to_talk = parse_key(&config.hotkey.push_to_talk_key).unwrap_or_else(|| {
        log::warn!(
            "unknown push-to-talk key {:?}, falling back to F9",
            config.hotkey.push_to_talk_key
        );
        rdev::Key::F9
    });
    let paste_last = if config.hotkey.paste_last_enabled {
        let key = parse_key(&config.hotkey.paste_last_key);
        if key.is_none() {
            log::warn!(
                "unknown paste-last key {:?}, shortcut disabled",
                config.hotkey.paste_last_key
            );
        }
        key
    } else {
        None
    };
    let _listener = HotkeyListener::start(push_to_talk, paste_last, hotkey_tx);

    log::info!(
        "ready: hold {} to dictate{}",
        config.hotkey.push_to_talk_key,
        if paste_last.is_some() {
            format!(", press {} to re-paste", config.hotkey.paste_last_key)
        } else {
            String::new()
        }
    );

    // ── Run until Ctrl-C ──
    rt.block_on(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    log::info!("shutting down");
    if recorder.is_recording() {
        if let Err(err) = recorder.stop() {
            log::warn!("could not stop capture cleanly: {err}");
        }
    }
    // Never leave the system volume ducked.
    ducker.restore();

    Ok(())
}

// ---------------------------------------------------------------------------
// MissingModelStt — placeholder engine when no GGML model is installed
// ---------------------------------------------------------------------------

/// Keeps the daemon running without a model file; every dictation surfaces a
/// pointer to the missing path instead of silently doing nothing.
struct MissingModelStt {
    path: String,
}

impl SttEngine for MissingModelStt {
    fn transcribe(&self, _audio: &[f32]) -> Result<Transcript, SttError> {
        Err(SttError::ModelNotFound(self.path.clone()))
    }
}
