//! Interfaces to the routing daemon's mixer and defaults plugins.
//!
//! Both facades are synchronous request/response calls made inline while an
//! event is being handled. A `None` answer means "no information yet" and is
//! never treated as an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Volume and mute as reported by the mixer.
///
/// Either field may be missing from a malformed payload; missing fields are
/// skipped rather than applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeState {
    /// Linear volume (0.0 - 1.0)
    pub volume: Option<f64>,
    /// Mute state
    pub mute: Option<bool>,
}

impl VolumeState {
    /// A complete payload.
    #[must_use]
    pub fn new(volume: f64, mute: bool) -> Self {
        Self { volume: Some(volume), mute: Some(mute) }
    }
}

/// A write request for the mixer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeUpdate {
    /// Plain volume value
    Value(f64),
    /// Structured update; absent fields are left alone
    Fields { volume: Option<f64>, mute: Option<bool> },
}

/// Per-node volume control offered by the daemon.
#[cfg_attr(test, mockall::automock)]
pub trait MixerFacade: Send + Sync {
    /// Current volume and mute of a node, or `None` if the node is not
    /// mixer-managed or the daemon did not answer.
    fn get_volume(&self, id: u32) -> Option<VolumeState>;

    /// Forward a volume update. Returns whether the daemon accepted it.
    fn set_volume(&self, id: u32, update: VolumeUpdate) -> bool;
}

/// Default-node selection offered by the daemon.
#[cfg_attr(test, mockall::automock)]
pub trait DefaultsFacade: Send + Sync {
    /// Id of the current default node for a media class string.
    fn get_default_node(&self, media_class: &str) -> Option<u32>;

    /// Ask the daemon to prefer the node with the given name for a media
    /// class. Returns whether the daemon accepted it.
    fn set_default_configured_node_name(&self, media_class: &str, name: &str) -> bool;
}

/// Shared handles to the daemon facades.
///
/// Passed explicitly to the router and every record it creates. Each record
/// keeps its own clone; the facades are released when the last holder drops.
#[derive(Clone)]
pub struct WireContext {
    pub mixer: Arc<dyn MixerFacade>,
    pub defaults: Arc<dyn DefaultsFacade>,
}

impl WireContext {
    /// Bundle the facades into a context.
    #[must_use]
    pub fn new(mixer: Arc<dyn MixerFacade>, defaults: Arc<dyn DefaultsFacade>) -> Self {
        Self { mixer, defaults }
    }
}

impl std::fmt::Debug for WireContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireContext").finish_non_exhaustive()
    }
}
