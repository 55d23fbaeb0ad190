//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`HotkeyListener`] owns that thread and a stop flag; dropping the handle
//! sets the flag so the callback silently discards further events.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has no graceful shutdown API.  Once stopped the OS thread
//! remains blocked in the rdev event loop until the process exits, which is
//! safe: rdev holds no resources needing explicit cleanup.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::HotkeyEvent;

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to a running hotkey listener thread.
pub struct HotkeyListener {
    /// Shared stop flag, set on [`Drop`].
    stop: Arc<AtomicBool>,
    /// Kept so the thread is not detached prematurely; never joined because
    /// `rdev::listen` never returns.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn the listener thread.
    ///
    /// * `push_to_talk` — key watched for press/release pairs.
    /// * `paste_last` — optional key whose press emits
    ///   [`HotkeyEvent::PasteLast`]; key-up is ignored.
    /// * `tx` — events are forwarded with `blocking_send`, which is correct
    ///   from a non-async thread and applies backpressure if the orchestrator
    ///   falls behind.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread.
    pub fn start(
        push_to_talk: rdev::Key,
        paste_last: Option<rdev::Key>,
        tx: mpsc::Sender<HotkeyEvent>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }

                    let forwarded = match event.event_type {
                        rdev::EventType::KeyPress(k) if k == push_to_talk => {
                            Some(HotkeyEvent::PushToTalkPressed)
                        }
                        rdev::EventType::KeyRelease(k) if k == push_to_talk => {
                            Some(HotkeyEvent::PushToTalkReleased)
                        }
                        rdev::EventType::KeyPress(k) if Some(k) == paste_last => {
                            Some(HotkeyEvent::PasteLast)
                        }
                        _ => None,
                    };

                    if let Some(ev) = forwarded {
                        let _ = tx.blocking_send(ev);
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {e:?}");
                }
            })
            .expect("failed to spawn hotkey-listener thread");

        Self {
            stop,
            _thread: thread,
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
