//! Events delivered by the routing daemon.

use std::sync::Arc;

use crate::node::{DeviceInfo, NodeInfo};

/// A change reported by the daemon's event loop.
///
/// Events are handled one at a time, each to completion.
#[derive(Debug, Clone)]
pub enum WireEvent {
    /// A node appeared
    NodeAdded(Arc<NodeInfo>),
    /// A node disappeared
    NodeRemoved { id: u32 },
    /// A device appeared
    DeviceAdded(DeviceInfo),
    /// A device disappeared
    DeviceRemoved { id: u32 },
    /// The mixer reports a volume or mute change on a node
    MixerChanged { id: u32 },
    /// Something about the default nodes changed
    DefaultsChanged,
}
