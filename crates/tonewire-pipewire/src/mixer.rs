//! Node volume control through `wpctl`.
//!
//! WirePlumber's mixer API is reached through its command-line client, which
//! speaks the same get/set calls the session manager exposes to scripts.

use std::process::Command;

use tonewire_core::{MixerFacade, VolumeState, VolumeUpdate};
use tracing::{debug, warn};

use crate::error::{PwError, PwResult};

/// Default `wpctl` executable.
pub const DEFAULT_WPCTL: &str = "wpctl";

/// Mixer facade backed by `wpctl`.
#[derive(Debug, Clone)]
pub struct WpctlMixer {
    program: String,
}

impl WpctlMixer {
    /// Create a mixer that runs the given `wpctl` executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn run(&self, args: &[&str]) -> PwResult<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| PwError::VolumeControlFailed(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PwError::VolumeControlFailed(format!("wpctl failed: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn set_value(&self, id: u32, volume: f64) -> PwResult<()> {
        let args = set_volume_args(id, volume);
        self.run(&args.iter().map(String::as_str).collect::<Vec<_>>())?;
        debug!(id, volume, "Volume set via wpctl");
        Ok(())
    }

    fn set_mute(&self, id: u32, mute: bool) -> PwResult<()> {
        self.run(&["set-mute", &id.to_string(), if mute { "1" } else { "0" }])?;
        debug!(id, mute, "Mute set via wpctl");
        Ok(())
    }

    fn apply(&self, id: u32, update: VolumeUpdate) -> PwResult<()> {
        match update {
            VolumeUpdate::Value(volume) => self.set_value(id, volume),
            VolumeUpdate::Fields { volume, mute } => {
                if let Some(volume) = volume {
                    self.set_value(id, volume)?;
                }
                if let Some(mute) = mute {
                    self.set_mute(id, mute)?;
                }
                Ok(())
            }
        }
    }
}

impl Default for WpctlMixer {
    fn default() -> Self {
        Self::new(DEFAULT_WPCTL)
    }
}

impl MixerFacade for WpctlMixer {
    fn get_volume(&self, id: u32) -> Option<VolumeState> {
        match self.run(&["get-volume", &id.to_string()]) {
            Ok(stdout) => {
                let state = parse_volume(&stdout);
                if state.is_none() {
                    warn!(id, output = %stdout.trim(), "Could not parse wpctl volume output");
                }
                state
            }
            Err(e) => {
                debug!(id, error = %e, "No volume for node");
                None
            }
        }
    }

    fn set_volume(&self, id: u32, update: VolumeUpdate) -> bool {
        match self.apply(id, update) {
            Ok(()) => true,
            Err(e) => {
                warn!(id, ?update, error = %e, "Volume update rejected");
                false
            }
        }
    }
}

/// Arguments for `wpctl set-volume`. Values are passed through unchecked,
/// so positionals follow `--` to keep a negative value from reading as a flag.
fn set_volume_args(id: u32, volume: f64) -> [String; 4] {
    ["set-volume".to_string(), "--".to_string(), id.to_string(), volume.to_string()]
}

/// Parse `wpctl get-volume` output such as `Volume: 0.40 [MUTED]`.
///
/// A malformed number leaves `volume` unset; mute is always reported once
/// the line is recognised.
#[must_use]
pub fn parse_volume(output: &str) -> Option<VolumeState> {
    let rest = output.trim().strip_prefix("Volume:")?;
    let mut parts = rest.split_whitespace();
    let volume = parts.next().and_then(|v| v.parse::<f64>().ok());
    let mute = parts.any(|p| p == "[MUTED]");
    Some(VolumeState { volume, mute: Some(mute) })
}
