//! Paste keystroke delivery.
//!
//! Two mechanisms, tried in order per attempt:
//!
//! 1. **Primary** — an AppleScript `System Events` keystroke.  When a target
//!    pid is known the keystroke is addressed to that process (with a global
//!    fallback inside the script if it is no longer frontmost), which makes
//!    the paste land in the app that was focused when recording started.
//! 2. **Secondary** — a synthetic ⌘V / Ctrl+V via the `enigo` crate.
//!
//! Both report success as a plain `bool`; the retry policy lives in the
//! inserter.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

/// Delivers the paste shortcut to the focused window.
pub trait PasteDriver: Send + Sync {
    /// Platform-native paste path, optionally addressed at `target_pid`.
    fn primary(&self, target_pid: Option<i32>) -> bool;

    /// Synthetic key-event fallback.
    fn secondary(&self) -> bool;
}

/// The real OS paste driver.
pub struct OsPasteDriver;

impl PasteDriver for OsPasteDriver {
    #[cfg(target_os = "macos")]
    fn primary(&self, target_pid: Option<i32>) -> bool {
        let script = match target_pid {
            Some(pid) => format!(
                r#"tell application "System Events"
  try
    set targetProc to first process whose unix id is {pid}
    if frontmost of targetProc then
      tell targetProc to keystroke "v" using command down
    else
      keystroke "v" using command down
    end if
  on error
    keystroke "v" using command down
  end try
end tell"#
            ),
            None => r#"tell application "System Events" to keystroke "v" using command down"#
                .to_string(),
        };

        match std::process::Command::new("osascript")
            .args(["-e", &script])
            .output()
        {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                log::debug!(
                    "insert: System Events paste failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(err) => {
                log::debug!("insert: could not run osascript: {err}");
                false
            }
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn primary(&self, _target_pid: Option<i32>) -> bool {
        // No System Events equivalent; the enigo fallback is the only path.
        false
    }

    fn secondary(&self) -> bool {
        match simulate_paste() {
            Ok(()) => true,
            Err(err) => {
                log::debug!("insert: key-event paste fallback failed: {err}");
                false
            }
        }
    }
}

/// Send the OS paste shortcut: ⌘V on macOS, Ctrl+V elsewhere.
///
/// A new [`Enigo`] instance is created per call because `Enigo` is not `Send`
/// and the handle is cheap to construct.
fn simulate_paste() -> Result<(), String> {
    let mut enigo = Enigo::new(&Settings::default()).map_err(|e| e.to_string())?;

    #[cfg(target_os = "macos")]
    let modifier = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    let modifier = Key::Control;

    enigo
        .key(modifier, Direction::Press)
        .map_err(|e| e.to_string())?;
    enigo
        .key(Key::Unicode('v'), Direction::Click)
        .map_err(|e| e.to_string())?;
    enigo
        .key(modifier, Direction::Release)
        .map_err(|e| e.to_string())?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Permission preflight
// ---------------------------------------------------------------------------

/// Check (and, on first run, trigger the system prompt for) the Automation
/// permission needed to drive System Events.
///
/// On macOS any AppleEvent sent to System Events is enough to validate the
/// grant.  Elsewhere the check degrades to "can we construct a keyboard
/// handle at all".
#[cfg(target_os = "macos")]
pub fn preflight_automation_permission() -> bool {
    let script = r#"tell application "System Events" to get name of first process"#;
    match std::process::Command::new("osascript")
        .args(["-e", script])
        .output()
    {
        Ok(output) => output.status.success(),
        Err(err) => {
            log::debug!("insert: automation preflight could not run osascript: {err}");
            false
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn preflight_automation_permission() -> bool {
    Enigo::new(&Settings::default()).is_ok()
}
