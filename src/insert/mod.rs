//! Text insertion via clipboard paste.
//!
//! Typing Unicode text through synthetic key events is unreliable, so the
//! inserter goes through the clipboard instead:
//!
//! 1. **Save** the current clipboard text (best-effort).
//! 2. **Set** the dictated text into the clipboard.
//! 3. Wait briefly for the clipboard to propagate.
//! 4. **Paste** with retry — System Events keystroke first, synthetic key
//!    events second, per attempt.
//! 5. **Restore** the saved clipboard after the target app has processed the
//!    paste (skipped when `restore_clipboard` is false).
//!
//! On paste failure with `keep_dictation_on_failure` the dictated text is
//! deliberately left on the clipboard so the user can paste it by hand, and
//! the error says so.

pub mod clipboard;
pub mod keyboard;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::config::InsertConfig;

pub use clipboard::{ClipboardPort, SystemClipboard};
pub use keyboard::{preflight_automation_permission, OsPasteDriver, PasteDriver};

/// Wait after writing the clipboard before pasting, so the clipboard manager
/// has flushed.
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(50);
/// Wait after a successful keystroke before reporting success.
const POST_PASTE_SETTLE: Duration = Duration::from_millis(60);
/// Backoff between paste attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(80);
/// Wait before restoring the clipboard, so the target app has read the paste.
const RESTORE_WAIT: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// InsertError
// ---------------------------------------------------------------------------

fn kept_suffix(kept: &bool) -> &'static str {
    if *kept {
        " Clipboard now contains the last dictation for manual paste."
    } else {
        ""
    }
}

#[derive(Debug, Error)]
pub enum InsertError {
    /// Could not open or read the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Every paste attempt failed.
    #[error(
        "failed to paste into the focused app; check Accessibility and Automation permissions ({detail}).{}",
        kept_suffix(.dictation_kept)
    )]
    PasteFailed {
        detail: String,
        /// Whether the dictated text was left on the clipboard.
        dictation_kept: bool,
    },
}

// ---------------------------------------------------------------------------
// TextInserter
// ---------------------------------------------------------------------------

/// Inserts dictated text into the focused application.
///
/// The clipboard is a single shared OS resource, and both the pipeline worker
/// and the paste-last shortcut call [`insert_text`](Self::insert_text) from
/// their own blocking threads.  `paste_lock` serializes the whole
/// save/set/paste/restore sequence so one caller can never restore over
/// another's clipboard contents.
pub struct TextInserter {
    paste_retry: u32,
    keep_dictation_on_failure: bool,
    clipboard: Arc<dyn ClipboardPort>,
    driver: Arc<dyn PasteDriver>,
    paste_lock: Mutex<()>,
}

impl TextInserter {
    pub fn from_config(config: &InsertConfig) -> Self {
        Self::with_ports(
            config.paste_retry,
            config.keep_dictation_on_failure,
            Arc::new(SystemClipboard),
            Arc::new(OsPasteDriver),
        )
    }

    /// Construct with explicit clipboard and paste ports.  Tests inject
    /// in-memory doubles here.
    pub fn with_ports(
        paste_retry: u32,
        keep_dictation_on_failure: bool,
        clipboard: Arc<dyn ClipboardPort>,
        driver: Arc<dyn PasteDriver>,
    ) -> Self {
        Self {
            paste_retry,
            keep_dictation_on_failure,
            clipboard,
            driver,
            paste_lock: Mutex::new(()),
        }
    }

    /// Paste `text` into the focused app.
    ///
    /// * `restore_clipboard` — restore the pre-insert clipboard afterwards.
    /// * `target_pid` — address the keystroke at this process when possible.
    /// * `keep_dictation_on_failure` — per-call override of the configured
    ///   default.
    ///
    /// Empty text is a no-op.
    pub fn insert_text(
        &self,
        text: &str,
        restore_clipboard: bool,
        target_pid: Option<i32>,
        keep_dictation_on_failure: Option<bool>,
    ) -> Result<(), InsertError> {
        if text.is_empty() {
            return Ok(());
        }

        // Hold the clipboard for the entire save/set/paste/restore sequence.
        let _clipboard_owner = self
            .paste_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let keep_on_failure =
            keep_dictation_on_failure.unwrap_or(self.keep_dictation_on_failure);
        // Saving is best-effort; a clipboard holding an image simply means
        // there is nothing to restore.
        let original = self.clipboard.get_text().ok().flatten();

        self.clipboard.set_text(text)?;
        std::thread::sleep(CLIPBOARD_SETTLE);

        match self.paste_with_retry(target_pid) {
            Ok(()) => {
                if restore_clipboard {
                    std::thread::sleep(RESTORE_WAIT);
                    if let Err(err) = self.restore(&original) {
                        log::warn!("insert: failed to restore clipboard: {err}");
                    }
                }
                Ok(())
            }
            Err(err) => {
                if keep_on_failure {
                    return Err(match err {
                        InsertError::PasteFailed { detail, .. } => InsertError::PasteFailed {
                            detail,
                            dictation_kept: true,
                        },
                        other => other,
                    });
                }
                if restore_clipboard {
                    if let Err(restore_err) = self.restore(&original) {
                        log::warn!("insert: failed to restore clipboard: {restore_err}");
                    }
                }
                Err(err)
            }
        }
    }

    fn paste_with_retry(&self, target_pid: Option<i32>) -> Result<(), InsertError> {
        let attempts = self.paste_retry + 1;
        let mut failures: Vec<&'static str> = Vec::new();

        for attempt in 0..attempts {
            if self.driver.primary(target_pid) {
                std::thread::sleep(POST_PASTE_SETTLE);
                return Ok(());
            }
            failures.push("System Events keystroke failed");

            if self.driver.secondary() {
                std::thread::sleep(POST_PASTE_SETTLE);
                return Ok(());
            }
            failures.push("key event fallback failed");

            if attempt + 1 < attempts {
                std::thread::sleep(RETRY_BACKOFF);
            }
        }

        let detail = failures[failures.len().saturating_sub(2)..].join("; ");
        Err(InsertError::PasteFailed {
            detail,
            dictation_kept: false,
        })
    }

    fn restore(&self, original: &Option<String>) -> Result<(), InsertError> {
        match original {
            Some(text) => self.clipboard.set_text(text),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::clipboard::MemClipboard;
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Paste driver that succeeds after holding the paste open for a while,
    /// leaving a wide window for a second inserter to interleave.
    struct SlowDriver {
        delay: Duration,
    }

    impl PasteDriver for SlowDriver {
        fn primary(&self, _target_pid: Option<i32>) -> bool {
            thread::sleep(self.delay);
            true
        }

        fn secondary(&self) -> bool {
            false
        }
    }

    /// Paste driver whose primary path fails the first `fail_primary` calls
    /// and whose secondary path always fails.
    struct ScriptedDriver {
        fail_primary: usize,
        primary_calls: AtomicUsize,
        secondary_calls: AtomicUsize,
    }

    impl ScriptedDriver {
        fn succeeding() -> Arc<Self> {
            Self::failing_first(0)
        }

        fn failing_first(fail_primary: usize) -> Arc<Self> {
            Arc::new(Self {
                fail_primary,
                primary_calls: AtomicUsize::new(0),
                secondary_calls: AtomicUsize::new(0),
            })
        }
    }

    impl PasteDriver for ScriptedDriver {
        fn primary(&self, _target_pid: Option<i32>) -> bool {
            let n = self.primary_calls.fetch_add(1, Ordering::SeqCst);
            n >= self.fail_primary
        }

        fn secondary(&self) -> bool {
            self.secondary_calls.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    fn inserter(
        paste_retry: u32,
        keep: bool,
        clipboard: Arc<MemClipboard>,
        driver: Arc<ScriptedDriver>,
    ) -> TextInserter {
        TextInserter::with_ports(paste_retry, keep, clipboard, driver)
    }

    #[test]
    fn empty_text_is_a_noop() {
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        let driver = ScriptedDriver::succeeding();
        let ins = inserter(1, false, clipboard.clone(), driver.clone());

        ins.insert_text("", true, None, None).unwrap();
        assert_eq!(clipboard.content().as_deref(), Some("before"));
        assert_eq!(driver.primary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn success_restores_original_clipboard() {
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        let ins = inserter(1, false, clipboard.clone(), ScriptedDriver::succeeding());

        ins.insert_text("dictated", true, None, None).unwrap();
        assert_eq!(clipboard.content().as_deref(), Some("before"));
    }

    #[test]
    fn no_restore_leaves_dictation_on_clipboard() {
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        let ins = inserter(1, false, clipboard.clone(), ScriptedDriver::succeeding());

        ins.insert_text("dictated", false, None, None).unwrap();
        assert_eq!(clipboard.content().as_deref(), Some("dictated"));
    }

    #[test]
    fn retry_uses_extra_attempt() {
        let clipboard = Arc::new(MemClipboard::new(None));
        let driver = ScriptedDriver::failing_first(1);
        let ins = inserter(1, false, clipboard, driver.clone());

        ins.insert_text("dictated", false, None, None).unwrap();
        assert_eq!(driver.primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(driver.secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_retry_is_a_single_attempt() {
        let clipboard = Arc::new(MemClipboard::new(None));
        let driver = ScriptedDriver::failing_first(10);
        let ins = inserter(0, false, clipboard, driver.clone());

        let result = ins.insert_text("dictated", false, None, None);
        assert!(result.is_err());
        assert_eq!(driver.primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(driver.secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_without_keep_restores_original() {
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        let ins = inserter(0, false, clipboard.clone(), ScriptedDriver::failing_first(10));

        let err = ins
            .insert_text("dictated", true, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            InsertError::PasteFailed {
                dictation_kept: false,
                ..
            }
        ));
        assert_eq!(clipboard.content().as_deref(), Some("before"));
    }

    #[test]
    fn failure_with_keep_leaves_dictation_and_says_so() {
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        let ins = inserter(0, true, clipboard.clone(), ScriptedDriver::failing_first(10));

        let err = ins
            .insert_text("dictated", true, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            InsertError::PasteFailed {
                dictation_kept: true,
                ..
            }
        ));
        assert!(err.to_string().contains("manual paste"));
        assert_eq!(clipboard.content().as_deref(), Some("dictated"));
    }

    #[test]
    fn concurrent_inserts_serialize_clipboard_access() {
        // A worker insert (restore=true) racing a paste-last insert
        // (restore=false, keep=true).  Without serialization the second
        // caller saves the first caller's in-flight text, and the first
        // caller's restore later overwrites the paste-last text with the
        // pre-dictation clipboard.
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        let inserter = Arc::new(TextInserter::with_ports(
            0,
            false,
            clipboard.clone(),
            Arc::new(SlowDriver {
                delay: Duration::from_millis(300),
            }),
        ));

        let worker = {
            let inserter = Arc::clone(&inserter);
            thread::spawn(move || inserter.insert_text("worker text", true, None, None))
        };
        // Start the second insert while the first paste is still in flight.
        thread::sleep(Duration::from_millis(100));
        let paste_last = {
            let inserter = Arc::clone(&inserter);
            thread::spawn(move || inserter.insert_text("last dictation", false, None, Some(true)))
        };

        worker.join().unwrap().unwrap();
        paste_last.join().unwrap().unwrap();

        // Whichever insert ran second, the paste-last text must survive: it
        // runs after the worker's restore, or the worker saves and restores
        // it.  Interleaving would leave "before" on the clipboard.
        assert_eq!(clipboard.content().as_deref(), Some("last dictation"));
    }

    #[test]
    fn per_call_keep_overrides_config() {
        let clipboard = Arc::new(MemClipboard::new(Some("before")));
        // Configured keep=false, call-site keep=true.
        let ins = inserter(0, false, clipboard.clone(), ScriptedDriver::failing_first(10));

        let err = ins
            .insert_text("dictated", true, None, Some(true))
            .unwrap_err();
        assert!(matches!(
            err,
            InsertError::PasteFailed {
                dictation_kept: true,
                ..
            }
        ));
        assert_eq!(clipboard.content().as_deref(), Some("dictated"));
    }
}
