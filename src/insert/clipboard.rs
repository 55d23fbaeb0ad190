//! Clipboard access behind a small port trait.
//!
//! The system implementation creates a short-lived [`arboard::Clipboard`]
//! handle per call rather than sharing one, because `arboard::Clipboard` is
//! not `Send` on all platforms and the handle is cheap to create.

use arboard::Clipboard;

use super::InsertError;

/// Plain-text clipboard operations used by the inserter.
pub trait ClipboardPort: Send + Sync {
    /// Current clipboard text.  `Ok(None)` when the clipboard is empty or
    /// holds non-text data (e.g. an image).
    fn get_text(&self) -> Result<Option<String>, InsertError>;

    /// Replace the clipboard content with `text`.
    fn set_text(&self, text: &str) -> Result<(), InsertError>;
}

/// The real OS clipboard.
pub struct SystemClipboard;

impl ClipboardPort for SystemClipboard {
    fn get_text(&self) -> Result<Option<String>, InsertError> {
        let mut clipboard = open_clipboard()?;
        // get_text errs on empty or non-text content; both map to None.
        Ok(clipboard.get_text().ok())
    }

    fn set_text(&self, text: &str) -> Result<(), InsertError> {
        let mut clipboard = open_clipboard()?;
        clipboard
            .set_text(text)
            .map_err(|e| InsertError::ClipboardSet(e.to_string()))
    }
}

fn open_clipboard() -> Result<Clipboard, InsertError> {
    Clipboard::new().map_err(|e| InsertError::ClipboardAccess(e.to_string()))
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// In-memory clipboard for tests.
#[cfg(test)]
pub struct MemClipboard {
    content: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl MemClipboard {
    pub fn new(initial: Option<&str>) -> Self {
        Self {
            content: std::sync::Mutex::new(initial.map(str::to_string)),
        }
    }

    pub fn content(&self) -> Option<String> {
        self.content.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ClipboardPort for MemClipboard {
    fn get_text(&self) -> Result<Option<String>, InsertError> {
        Ok(self.content.lock().unwrap().clone())
    }

    fn set_text(&self, text: &str) -> Result<(), InsertError> {
        *self.content.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}
