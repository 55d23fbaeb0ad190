//! Frontmost-application resolution.
//!
//! Captured at key release, before the work item is queued, so the paste
//! targets the app that had focus when the user was dictating even if focus
//! moves while Whisper runs.

/// Resolves the app that currently owns keyboard focus.
pub trait FrontmostApp: Send + Sync {
    /// `(name, pid)` of the frontmost app.  Either side may be `None`; both
    /// `None` simply means the paste falls back to the global keystroke and
    /// history stores no source app.
    fn resolve(&self) -> (Option<String>, Option<i32>);
}

/// System Events-backed resolver.  On non-macOS platforms it always answers
/// `(None, None)`.
pub struct SystemFrontmost;

impl FrontmostApp for SystemFrontmost {
    #[cfg(target_os = "macos")]
    fn resolve(&self) -> (Option<String>, Option<i32>) {
        let name = query(r#"tell application "System Events" to get name of first application process whose frontmost is true"#);
        let pid = query(r#"tell application "System Events" to get unix id of first application process whose frontmost is true"#)
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|&pid| pid > 0);
        (name, pid)
    }

    #[cfg(not(target_os = "macos"))]
    fn resolve(&self) -> (Option<String>, Option<i32>) {
        (None, None)
    }
}

#[cfg(target_os = "macos")]
fn query(script: &str) -> Option<String> {
    let output = std::process::Command::new("osascript")
        .args(["-e", script])
        .output()
        .ok()?;
    if !output.status.success() {
        log::debug!(
            "frontmost: query failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Fixed-answer resolver for tests.
#[cfg(test)]
pub struct FixedFrontmost {
    pub name: Option<String>,
    pub pid: Option<i32>,
}

#[cfg(test)]
impl FrontmostApp for FixedFrontmost {
    fn resolve(&self) -> (Option<String>, Option<i32>) {
        (self.name.clone(), self.pid)
    }
}
