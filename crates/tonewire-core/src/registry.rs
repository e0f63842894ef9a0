//! Endpoint registry.
//!
//! Owns every endpoint record and device record. Concrete records are keyed
//! by node id; each media class with a default concept additionally owns one
//! aggregate record that follows the daemon's default node.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::device::Device;
use crate::endpoint::{Endpoint, EndpointSnapshot};
use crate::facade::{DefaultsFacade, MixerFacade, WireContext};
use crate::media::MediaClass;
use crate::node::{DeviceInfo, NodeInfo};
use crate::notify::{EndpointKey, Notification};

/// Point-in-time list of endpoints.
///
/// Iterating does not observe registry changes made after the list was
/// produced, and can be restarted any number of times.
#[derive(Debug, Clone)]
pub struct EndpointList {
    items: Arc<[EndpointSnapshot]>,
}

impl EndpointList {
    /// Iterate over the snapshots.
    pub fn iter(&self) -> std::slice::Iter<'_, EndpointSnapshot> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copy the snapshots out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<EndpointSnapshot> {
        self.items.to_vec()
    }
}

impl<'a> IntoIterator for &'a EndpointList {
    type Item = &'a EndpointSnapshot;
    type IntoIter = std::slice::Iter<'a, EndpointSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owner of all endpoint and device records.
#[derive(Debug)]
pub struct EndpointRegistry {
    context: WireContext,
    endpoints: BTreeMap<u32, Endpoint>,
    aggregates: BTreeMap<MediaClass, Endpoint>,
    devices: BTreeMap<u32, Device>,
}

impl EndpointRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(context: WireContext) -> Self {
        Self {
            context,
            endpoints: BTreeMap::new(),
            aggregates: BTreeMap::new(),
            devices: BTreeMap::new(),
        }
    }

    /// The facades records are created with.
    #[must_use]
    pub fn context(&self) -> &WireContext {
        &self.context
    }

    /// Concrete record for a node id.
    #[must_use]
    pub fn get_by_id(&self, id: u32) -> Option<&Endpoint> {
        self.endpoints.get(&id)
    }

    /// Record for a key, concrete or aggregate.
    #[must_use]
    pub fn get(&self, key: EndpointKey) -> Option<&Endpoint> {
        match key {
            EndpointKey::Node(id) => self.endpoints.get(&id),
            EndpointKey::Default(class) => self.aggregates.get(&class),
        }
    }

    fn get_classified(&self, id: u32, class: MediaClass) -> Option<&Endpoint> {
        self.get_by_id(id).filter(|e| e.media_class() == class)
    }

    #[must_use]
    pub fn get_speaker(&self, id: u32) -> Option<&Endpoint> {
        self.get_classified(id, MediaClass::Speaker)
    }

    #[must_use]
    pub fn get_microphone(&self, id: u32) -> Option<&Endpoint> {
        self.get_classified(id, MediaClass::Microphone)
    }

    #[must_use]
    pub fn get_recorder(&self, id: u32) -> Option<&Endpoint> {
        self.get_classified(id, MediaClass::Recorder)
    }

    #[must_use]
    pub fn get_stream(&self, id: u32) -> Option<&Endpoint> {
        self.get_classified(id, MediaClass::Stream)
    }

    /// Snapshot of the concrete records of one class, ordered by id.
    #[must_use]
    pub fn list_by_media_class(&self, class: MediaClass) -> EndpointList {
        let items: Vec<EndpointSnapshot> = self
            .endpoints
            .values()
            .filter(|e| e.media_class() == class)
            .map(Endpoint::snapshot)
            .collect();
        EndpointList { items: items.into() }
    }

    #[must_use]
    pub fn list_speakers(&self) -> EndpointList {
        self.list_by_media_class(MediaClass::Speaker)
    }

    #[must_use]
    pub fn list_microphones(&self) -> EndpointList {
        self.list_by_media_class(MediaClass::Microphone)
    }

    #[must_use]
    pub fn list_recorders(&self) -> EndpointList {
        self.list_by_media_class(MediaClass::Recorder)
    }

    #[must_use]
    pub fn list_streams(&self) -> EndpointList {
        self.list_by_media_class(MediaClass::Stream)
    }

    /// Aggregate record tracking the default node of `class`.
    #[must_use]
    pub fn default_endpoint(&self, class: MediaClass) -> Option<&Endpoint> {
        self.aggregates.get(&class)
    }

    #[must_use]
    pub fn default_speaker(&self) -> Option<&Endpoint> {
        self.default_endpoint(MediaClass::Speaker)
    }

    #[must_use]
    pub fn default_microphone(&self) -> Option<&Endpoint> {
        self.default_endpoint(MediaClass::Microphone)
    }

    /// Number of concrete records of `class` flagged default.
    #[must_use]
    pub fn concrete_default_count(&self, class: MediaClass) -> usize {
        self.endpoints.values().filter(|e| e.media_class() == class && e.is_default()).count()
    }

    /// Create a concrete record for `node`.
    ///
    /// The record is bound and its default flag set before `EndpointAdded`
    /// is emitted. A node id that already has a record re-binds that record
    /// instead, unless the node now reports another class; then the old
    /// record is removed and a new one created. Returns the record's class,
    /// or `None` if the node is not an audio endpoint.
    pub fn create_concrete(
        &mut self,
        node: Arc<NodeInfo>,
        out: &mut Vec<Notification>,
    ) -> Option<MediaClass> {
        let id = node.id;

        let reclassified = self
            .endpoints
            .get(&id)
            .is_some_and(|e| node.classify().is_some_and(|class| class != e.media_class()));
        if reclassified {
            debug!(id, class = ?node.classify(), "Node changed media class, replacing record");
            self.remove(id, out);
        } else if let Some(existing) = self.endpoints.get_mut(&id) {
            debug!(id, "Node already tracked, re-binding");
            existing.bind(node, out);
            return Some(existing.media_class());
        }

        let Some(mut endpoint) = Endpoint::concrete(node, &self.context) else {
            trace!(id, "Ignoring node without an endpoint media class");
            return None;
        };
        let default_id = endpoint.current_default_id();
        endpoint.update_default(default_id, &mut Vec::new());

        let class = endpoint.media_class();
        info!(id, class = %class, description = ?endpoint.description(), "Endpoint added");
        out.push(Notification::EndpointAdded(endpoint.snapshot()));
        self.endpoints.insert(id, endpoint);
        Some(class)
    }

    /// Install the aggregate default record for `class` and point it at the
    /// current default node, if that node is already known.
    ///
    /// Returns false if the class already has one or has no default.
    pub fn create_aggregate_default(
        &mut self,
        class: MediaClass,
        mixer: Arc<dyn MixerFacade>,
        defaults: Arc<dyn DefaultsFacade>,
        out: &mut Vec<Notification>,
    ) -> bool {
        if !class.has_default() || self.aggregates.contains_key(&class) {
            return false;
        }
        debug!(class = %class, "Creating default endpoint");
        self.aggregates.insert(class, Endpoint::aggregate_default(class, mixer, defaults));
        let default_id = self.context.defaults.get_default_node(class.as_str());
        self.sync_aggregate(class, default_id, out);
        true
    }

    /// Drop the concrete record for a node id.
    ///
    /// An aggregate record bound to the node is left unbound. Returns the
    /// final state of the dropped record.
    pub fn remove(&mut self, id: u32, out: &mut Vec<Notification>) -> Option<EndpointSnapshot> {
        let mut endpoint = self.endpoints.remove(&id)?;
        endpoint.retire();
        let snapshot = endpoint.snapshot();
        info!(id, class = %snapshot.media_class, "Endpoint removed");
        out.push(Notification::EndpointRemoved(snapshot.clone()));

        for (class, aggregate) in &mut self.aggregates {
            if aggregate.id() == Some(id) && aggregate.unbind(out) {
                out.push(Notification::DefaultChanged { media_class: *class, id: None });
            }
        }
        Some(snapshot)
    }

    /// Re-read volume for every record bound to `id`.
    ///
    /// Returns false if no record is bound to the node.
    pub fn refresh(&mut self, id: u32, out: &mut Vec<Notification>) -> bool {
        let mut found = false;
        if let Some(endpoint) = self.endpoints.get_mut(&id) {
            endpoint.refresh_volume(out);
            found = true;
        }
        for aggregate in self.aggregates.values_mut().filter(|a| a.id() == Some(id)) {
            aggregate.refresh_volume(out);
            found = true;
        }
        found
    }

    /// Bring default flags of `class` in line with the daemon.
    ///
    /// Concrete records notify only on a flip; the aggregate is re-bound or
    /// unbound if it points at the wrong node.
    pub fn sync_class(&mut self, class: MediaClass, out: &mut Vec<Notification>) {
        let default_id = self.context.defaults.get_default_node(class.as_str());
        trace!(class = %class, ?default_id, "Syncing default");

        for endpoint in self.endpoints.values_mut().filter(|e| e.media_class() == class) {
            endpoint.update_default(default_id, out);
        }
        self.sync_aggregate(class, default_id, out);

        debug_assert!(
            self.concrete_default_count(class) <= 1,
            "more than one default {class} endpoint"
        );
    }

    fn sync_aggregate(&mut self, class: MediaClass, default_id: Option<u32>, out: &mut Vec<Notification>) {
        let Some(aggregate) = self.aggregates.get_mut(&class) else {
            return;
        };

        // A default that is not registered yet leaves the aggregate unbound
        // until the node shows up.
        let target = default_id
            .and_then(|id| self.endpoints.get(&id))
            .filter(|e| e.media_class() == class)
            .and_then(Endpoint::node)
            .cloned();

        match target {
            Some(node) if aggregate.id() != Some(node.id) => {
                let id = node.id;
                info!(class = %class, id, "Default endpoint moved");
                aggregate.bind(node, out);
                out.push(Notification::DefaultChanged { media_class: class, id: Some(id) });
            }
            Some(_) => {}
            None => {
                if aggregate.unbind(out) {
                    info!(class = %class, ?default_id, "Default endpoint unbound");
                    out.push(Notification::DefaultChanged { media_class: class, id: None });
                }
            }
        }
    }

    /// Track a device. Only audio devices are announced.
    pub fn add_device(&mut self, info: &DeviceInfo, out: &mut Vec<Notification>) -> bool {
        let device = Device::from_info(info);
        if device.is_audio() {
            debug!(id = device.id, description = %device.description, "Audio device added");
            out.push(Notification::DeviceAdded(device.clone()));
        }
        let audio = device.is_audio();
        self.devices.insert(device.id, device);
        audio
    }

    /// Forget a device. Returns the record if it was an audio device.
    pub fn remove_device(&mut self, id: u32, out: &mut Vec<Notification>) -> Option<Device> {
        let device = self.devices.remove(&id)?;
        if !device.is_audio() {
            return None;
        }
        debug!(id, description = %device.description, "Audio device removed");
        out.push(Notification::DeviceRemoved(device.clone()));
        Some(device)
    }

    /// Audio device by id.
    #[must_use]
    pub fn get_device(&self, id: u32) -> Option<&Device> {
        self.devices.get(&id).filter(|d| d.is_audio())
    }

    /// All audio devices, ordered by id.
    #[must_use]
    pub fn list_devices(&self) -> Vec<Device> {
        self.devices.values().filter(|d| d.is_audio()).cloned().collect()
    }
}
