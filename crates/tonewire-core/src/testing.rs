//! In-memory daemon and node builders for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::facade::{DefaultsFacade, MixerFacade, VolumeState, VolumeUpdate, WireContext};
use crate::media::MediaClass;
use crate::node::{DeviceInfo, NodeInfo, keys};
use crate::notify::{Notification, Property};

#[derive(Default)]
struct DaemonState {
    volumes: HashMap<u32, VolumeState>,
    defaults: HashMap<String, u32>,
    volume_requests: Vec<(u32, VolumeUpdate)>,
    default_requests: Vec<(String, String)>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<DaemonState>,
}

impl MixerFacade for Inner {
    fn get_volume(&self, id: u32) -> Option<VolumeState> {
        self.state.lock().volumes.get(&id).copied()
    }

    fn set_volume(&self, id: u32, update: VolumeUpdate) -> bool {
        let mut state = self.state.lock();
        state.volume_requests.push((id, update));
        let entry = state.volumes.entry(id).or_default();
        match update {
            VolumeUpdate::Value(volume) => entry.volume = Some(volume),
            VolumeUpdate::Fields { volume, mute } => {
                if volume.is_some() {
                    entry.volume = volume;
                }
                if mute.is_some() {
                    entry.mute = mute;
                }
            }
        }
        true
    }
}

impl DefaultsFacade for Inner {
    fn get_default_node(&self, media_class: &str) -> Option<u32> {
        self.state.lock().defaults.get(media_class).copied()
    }

    fn set_default_configured_node_name(&self, media_class: &str, name: &str) -> bool {
        self.state.lock().default_requests.push((media_class.to_string(), name.to_string()));
        true
    }
}

/// Scriptable stand-in for the routing daemon.
#[derive(Default)]
pub struct FakeDaemon {
    inner: Arc<Inner>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mixer(&self) -> Arc<dyn MixerFacade> {
        self.inner.clone()
    }

    pub fn defaults(&self) -> Arc<dyn DefaultsFacade> {
        self.inner.clone()
    }

    pub fn context(&self) -> WireContext {
        WireContext::new(self.mixer(), self.defaults())
    }

    /// References held to the daemon, this handle included.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn set_volume_state(&self, id: u32, state: VolumeState) {
        self.inner.state.lock().volumes.insert(id, state);
    }

    pub fn clear_volume(&self, id: u32) {
        self.inner.state.lock().volumes.remove(&id);
    }

    pub fn set_default(&self, class: MediaClass, id: Option<u32>) {
        let mut state = self.inner.state.lock();
        match id {
            Some(id) => state.defaults.insert(class.as_str().to_string(), id),
            None => state.defaults.remove(class.as_str()),
        };
    }

    pub fn volume_requests(&self) -> Vec<(u32, VolumeUpdate)> {
        self.inner.state.lock().volume_requests.clone()
    }

    pub fn default_requests(&self) -> Vec<(String, String)> {
        self.inner.state.lock().default_requests.clone()
    }
}

pub fn node(id: u32, media_class: &str, name: &str) -> Arc<NodeInfo> {
    Arc::new(
        NodeInfo::new(id)
            .with_property(keys::NODE_NAME, name)
            .with_property(keys::MEDIA_CLASS, media_class),
    )
}

fn described(id: u32, media_class: &str, name: &str, description: Option<&str>) -> Arc<NodeInfo> {
    let mut info = NodeInfo::new(id)
        .with_property(keys::NODE_NAME, name)
        .with_property(keys::MEDIA_CLASS, media_class);
    if let Some(description) = description {
        info = info.with_property(keys::NODE_DESCRIPTION, description);
    }
    Arc::new(info)
}

pub fn sink(id: u32, name: &str, description: Option<&str>) -> Arc<NodeInfo> {
    described(id, MediaClass::Speaker.as_str(), name, description)
}

pub fn source(id: u32, name: &str, description: Option<&str>) -> Arc<NodeInfo> {
    described(id, MediaClass::Microphone.as_str(), name, description)
}

pub fn audio_device(id: u32, name: &str, description: &str) -> DeviceInfo {
    DeviceInfo::new(id)
        .with_property(keys::DEVICE_NAME, name)
        .with_property(keys::DEVICE_DESCRIPTION, description)
        .with_property(keys::MEDIA_CLASS, "Audio/Device")
}

pub fn changed_count(out: &[Notification]) -> usize {
    out.iter().filter(|n| matches!(n, Notification::Changed(_))).count()
}

pub fn property_changes(out: &[Notification]) -> Vec<Property> {
    out.iter()
        .filter_map(|n| match n {
            Notification::PropertyChanged { property, .. } => Some(*property),
            _ => None,
        })
        .collect()
}
