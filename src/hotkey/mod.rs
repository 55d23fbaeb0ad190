//! Global hotkeys: push-to-talk plus the paste-last-dictation shortcut.
//!
//! `rdev::listen()` blocks forever, so the listener lives on a dedicated OS
//! thread (see [`listener`]) and forwards [`HotkeyEvent`]s into the async
//! orchestrator over a tokio channel.

pub mod listener;

pub use listener::HotkeyListener;

// ---------------------------------------------------------------------------
// HotkeyEvent
// ---------------------------------------------------------------------------

/// Events emitted by the hotkey listener thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The push-to-talk key went down.
    PushToTalkPressed,
    /// The push-to-talk key came back up.
    PushToTalkReleased,
    /// The paste-last-dictation key was pressed.
    PasteLast,
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a config key name into an [`rdev::Key`].
///
/// Accepts `F1`..`F12`, a handful of named keys, and single ASCII letters
/// (case-insensitive).  Unknown names yield `None` so the caller can fall
/// back to a default.
///
/// # Examples
///
/// ```
/// use speakflow::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("d"), Some(rdev::Key::KeyD));
/// assert_eq!(parse_key("Ctrl+V"), None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
        return function_key(n);
    }

    match name {
        "Escape" | "Esc" => return Some(rdev::Key::Escape),
        "Space" => return Some(rdev::Key::Space),
        "Return" | "Enter" => return Some(rdev::Key::Return),
        "Tab" => return Some(rdev::Key::Tab),
        "Backspace" => return Some(rdev::Key::Backspace),
        "Delete" | "Del" => return Some(rdev::Key::Delete),
        "Home" => return Some(rdev::Key::Home),
        "End" => return Some(rdev::Key::End),
        "PageUp" => return Some(rdev::Key::PageUp),
        "PageDown" => return Some(rdev::Key::PageDown),
        "CapsLock" => return Some(rdev::Key::CapsLock),
        _ => {}
    }

    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => letter_key(c.to_ascii_uppercase()),
        _ => None,
    }
}

fn function_key(n: u8) -> Option<rdev::Key> {
    Some(match n {
        1 => rdev::Key::F1,
        2 => rdev::Key::F2,
        3 => rdev::Key::F3,
        4 => rdev::Key::F4,
        5 => rdev::Key::F5,
        6 => rdev::Key::F6,
        7 => rdev::Key::F7,
        8 => rdev::Key::F8,
        9 => rdev::Key::F9,
        10 => rdev::Key::F10,
        11 => rdev::Key::F11,
        12 => rdev::Key::F12,
        _ => return None,
    })
}

fn letter_key(c: char) -> Option<rdev::Key> {
    Some(match c {
        'A' => rdev::Key::KeyA,
        'B' => rdev::Key::KeyB,
        'C' => rdev::Key::KeyC,
        'D' => rdev::Key::KeyD,
        'E' => rdev::Key::KeyE,
        'F' => rdev::Key::KeyF,
        'G' => rdev::Key::KeyG,
        'H' => rdev::Key::KeyH,
        'I' => rdev::Key::KeyI,
        'J' => rdev::Key::KeyJ,
        'K' => rdev::Key::KeyK,
        'L' => rdev::Key::KeyL,
        'M' => rdev::Key::KeyM,
        'N' => rdev::Key::KeyN,
        'O' => rdev::Key::KeyO,
        'P' => rdev::Key::KeyP,
        'Q' => rdev::Key::KeyQ,
        'R' => rdev::Key::KeyR,
        'S' => rdev::Key::KeyS,
        'T' => rdev::Key::KeyT,
        'U' => rdev::Key::KeyU,
        'V' => rdev::Key::KeyV,
        'W' => rdev::Key::KeyW,
        'X' => rdev::Key::KeyX,
        'Y' => rdev::Key::KeyY,
        'Z' => rdev::Key::KeyZ,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
