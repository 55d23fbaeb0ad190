//! System output volume ducking.
//!
//! While the microphone is hot the system output volume is dropped to a low
//! target so speaker audio does not bleed into the recording, then restored
//! on release.  Every OS interaction is best-effort: if the volume cannot be
//! read or written the ducker silently does nothing.

use std::sync::Mutex;

use crate::config::DuckingConfig;

// ---------------------------------------------------------------------------
// VolumeControl
// ---------------------------------------------------------------------------

/// Read/write access to the system output volume in percent.
pub trait VolumeControl: Send + Sync {
    /// Current output volume, or `None` when it cannot be determined.
    fn get(&self) -> Option<u8>;

    /// Set the output volume.  Failures are logged by the implementation.
    fn set(&self, volume_percent: u8);
}

/// The real system mixer, driven through `osascript` on macOS.  On other
/// platforms both operations are no-ops.
pub struct OsVolume;

impl VolumeControl for OsVolume {
    #[cfg(target_os = "macos")]
    fn get(&self) -> Option<u8> {
        let stdout = run_osascript("output volume of (get volume settings)", false)?;
        match stdout.trim().parse::<u8>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("system_audio: unable to parse output volume: {stdout:?}");
                None
            }
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn get(&self) -> Option<u8> {
        None
    }

    #[cfg(target_os = "macos")]
    fn set(&self, volume_percent: u8) {
        let clamped = volume_percent.min(100);
        run_osascript(&format!("set volume output volume {clamped}"), true);
    }

    #[cfg(not(target_os = "macos"))]
    fn set(&self, _volume_percent: u8) {}
}

#[cfg(target_os = "macos")]
fn run_osascript(script: &str, warn_on_error: bool) -> Option<String> {
    let output = match std::process::Command::new("osascript")
        .args(["-e", script])
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            log::debug!("system_audio: osascript unavailable: {err}");
            return None;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if warn_on_error {
            log::warn!("system_audio: volume command failed: {}", stderr.trim());
        } else {
            log::debug!("system_audio: volume query failed: {}", stderr.trim());
        }
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ---------------------------------------------------------------------------
// SystemAudioDucker
// ---------------------------------------------------------------------------

/// Temporarily lowers system output volume while recording.
///
/// `duck` and `restore` are idempotent: a second duck without an intervening
/// restore does nothing, and a restore without a pending duck does nothing.
pub struct SystemAudioDucker {
    enabled: bool,
    target_volume_percent: u8,
    previous_volume: Mutex<Option<u8>>,
    control: Box<dyn VolumeControl>,
}

impl SystemAudioDucker {
    pub fn from_config(config: &DuckingConfig) -> Self {
        Self::with_control(config, Box::new(OsVolume))
    }

    /// Construct with an explicit volume backend.  Tests inject an in-memory
    /// mixer here.
    pub fn with_control(config: &DuckingConfig, control: Box<dyn VolumeControl>) -> Self {
        Self {
            enabled: config.enabled,
            target_volume_percent: config.target_volume_percent.min(100),
            previous_volume: Mutex::new(None),
            control,
        }
    }

    /// Drop the output volume to the configured target, remembering the
    /// current volume for [`restore`](Self::restore).
    pub fn duck(&self) {
        if !self.enabled {
            return;
        }

        {
            let mut previous = match self.previous_volume.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if previous.is_some() {
                return;
            }

            let current = match self.control.get() {
                Some(v) => v,
                None => return,
            };
            *previous = Some(current);

            // Already at or below the target: remember it, touch nothing.
            if current <= self.target_volume_percent {
                return;
            }
        }

        self.control.set(self.target_volume_percent);
    }

    /// Restore the volume saved by the last [`duck`](Self::duck).
    pub fn restore(&self) {
        if !self.enabled {
            return;
        }

        let saved = {
            let mut previous = match self.previous_volume.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            previous.take()
        };

        if let Some(volume) = saved {
            self.control.set(volume);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
