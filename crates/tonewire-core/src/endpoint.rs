//! Endpoint records: cached per-node audio state.
//!
//! A record mirrors what the daemon reports for one node (volume, mute,
//! label, default flag). It is never authoritative: mutators forward to the
//! daemon and the cached values are corrected by the next mixer event.
//!
//! Records come in two flavours. A concrete record is bound to one node for
//! its whole life. An aggregate default record floats: it re-binds to
//! whichever node is currently default for its media class, or sits unbound
//! when there is none.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::facade::{DefaultsFacade, MixerFacade, VolumeState, VolumeUpdate, WireContext};
use crate::media::MediaClass;
use crate::node::NodeInfo;
use crate::notify::{EndpointKey, Notification, Property};

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    /// No node reference held
    Unbound,
    /// Concrete record bound to its node
    Bound,
    /// Aggregate record bound to the current default node
    DefaultTracking,
    /// Dropped from the registry after node removal
    Removed,
}

/// Plain-data copy of a record, handed to subscribers and list queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    pub id: Option<u32>,
    pub volume: f64,
    pub mute: bool,
    pub description: Option<String>,
    pub media_class: MediaClass,
    pub is_default: bool,
    pub is_aggregate_default: bool,
    pub state: EndpointState,
}

impl EndpointSnapshot {
    /// Key of the record this snapshot was taken from.
    #[must_use]
    pub fn key(&self) -> EndpointKey {
        if self.is_aggregate_default {
            EndpointKey::Default(self.media_class)
        } else {
            EndpointKey::Node(self.id.unwrap_or_default())
        }
    }
}

/// Cached state of one audio endpoint.
pub struct Endpoint {
    id: Option<u32>,
    volume: f64,
    mute: bool,
    description: Option<String>,
    media_class: MediaClass,
    is_default: bool,
    aggregate: bool,
    removed: bool,
    node: Option<Arc<NodeInfo>>,
    mixer: Arc<dyn MixerFacade>,
    defaults: Arc<dyn DefaultsFacade>,
}

impl Endpoint {
    fn unbound(media_class: MediaClass, aggregate: bool, context: &WireContext) -> Self {
        Self {
            id: None,
            volume: 0.0,
            mute: true,
            description: None,
            media_class,
            is_default: aggregate,
            aggregate,
            removed: false,
            node: None,
            mixer: Arc::clone(&context.mixer),
            defaults: Arc::clone(&context.defaults),
        }
    }

    /// Create a concrete record bound to `node`.
    ///
    /// Returns `None` if the node's media class is not an audio endpoint class.
    #[must_use]
    pub fn concrete(node: Arc<NodeInfo>, context: &WireContext) -> Option<Self> {
        let media_class = node.classify()?;
        let mut endpoint = Self::unbound(media_class, false, context);
        endpoint.bind(node, &mut Vec::new());
        Some(endpoint)
    }

    /// Create an unbound aggregate record tracking the default node of `media_class`.
    #[must_use]
    pub fn aggregate_default(
        media_class: MediaClass,
        mixer: Arc<dyn MixerFacade>,
        defaults: Arc<dyn DefaultsFacade>,
    ) -> Self {
        Self::unbound(media_class, true, &WireContext::new(mixer, defaults))
    }

    /// Node id, unset only for an unbound aggregate record.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Cached linear volume (0.0 - 1.0).
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Cached mute state.
    #[must_use]
    pub fn mute(&self) -> bool {
        self.mute
    }

    /// Display label; always set once the record has been bound.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn media_class(&self) -> MediaClass {
        self.media_class
    }

    /// Whether this record is the default for its class.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    #[must_use]
    pub fn is_aggregate_default(&self) -> bool {
        self.aggregate
    }

    /// The node this record is bound to.
    #[must_use]
    pub fn node(&self) -> Option<&Arc<NodeInfo>> {
        self.node.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> EndpointState {
        match (self.removed, self.node.is_some(), self.aggregate) {
            (true, _, _) => EndpointState::Removed,
            (false, false, _) => EndpointState::Unbound,
            (false, true, false) => EndpointState::Bound,
            (false, true, true) => EndpointState::DefaultTracking,
        }
    }

    #[must_use]
    pub fn key(&self) -> EndpointKey {
        if self.aggregate {
            EndpointKey::Default(self.media_class)
        } else {
            EndpointKey::Node(self.id.unwrap_or_default())
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot {
            id: self.id,
            volume: self.volume,
            mute: self.mute,
            description: self.description.clone(),
            media_class: self.media_class,
            is_default: self.is_default,
            is_aggregate_default: self.aggregate,
            state: self.state(),
        }
    }

    fn notify(&self, property: Property, out: &mut Vec<Notification>) {
        out.push(Notification::PropertyChanged { endpoint: self.key(), property });
    }

    /// Bind to `node`, releasing the previous node reference first.
    ///
    /// Re-reads id, description and media class, refreshes volume, and emits
    /// exactly one `Changed` at the end.
    pub fn bind(&mut self, node: Arc<NodeInfo>, out: &mut Vec<Notification>) {
        self.node = None;

        let id = Some(node.id);
        if self.id != id {
            self.id = id;
            self.notify(Property::Id, out);
        }

        let description = node.description();
        if self.description.as_deref() != Some(description) {
            self.description = Some(description.to_string());
            self.notify(Property::Description, out);
        }

        // A node with a missing or foreign class keeps the record's class.
        if let Some(class) = node.classify()
            && class != self.media_class
        {
            self.media_class = class;
            self.notify(Property::MediaClass, out);
        }

        debug!(id = node.id, description, class = %self.media_class, aggregate = self.aggregate, "Endpoint bound");
        self.node = Some(node);

        if let Some(state) = self.query_volume() {
            self.apply_volume(state, out);
        }
        out.push(Notification::Changed(self.snapshot()));
    }

    /// Release the node reference of an aggregate record.
    ///
    /// Returns false if the record was already unbound.
    pub fn unbind(&mut self, out: &mut Vec<Notification>) -> bool {
        if self.node.is_none() && self.id.is_none() {
            return false;
        }
        debug!(id = ?self.id, class = %self.media_class, "Endpoint unbound");
        self.node = None;
        self.id = None;
        self.notify(Property::Id, out);
        out.push(Notification::Changed(self.snapshot()));
        true
    }

    /// Mark the record removed and release its node.
    pub(crate) fn retire(&mut self) {
        self.removed = true;
        self.node = None;
    }

    fn query_volume(&self) -> Option<VolumeState> {
        let id = self.id?;
        let state = self.mixer.get_volume(id);
        if state.is_none() {
            debug!(id, "Mixer has no volume for node");
        }
        state
    }

    #[allow(clippy::float_cmp)]
    fn apply_volume(&mut self, state: VolumeState, out: &mut Vec<Notification>) {
        if let Some(mute) = state.mute
            && mute != self.mute
        {
            self.mute = mute;
            self.notify(Property::Mute, out);
        }

        // NaN is a malformed payload; anything else is pinned to the range
        // consumers expect.
        if let Some(volume) = state.volume.filter(|v| !v.is_nan()).map(|v| v.clamp(0.0, 1.0))
            && volume != self.volume
        {
            self.volume = volume;
            self.notify(Property::Volume, out);
        }
    }

    /// Re-read volume and mute from the mixer.
    ///
    /// Returns false and leaves the cache untouched if the mixer has nothing
    /// for this node. On success, emits one `Changed` whether or not a value
    /// actually moved.
    pub fn refresh_volume(&mut self, out: &mut Vec<Notification>) -> bool {
        let Some(state) = self.query_volume() else {
            return false;
        };
        self.apply_volume(state, out);
        out.push(Notification::Changed(self.snapshot()));
        true
    }

    /// Recompute the default flag of a concrete record against `default_id`.
    ///
    /// Emits only when the flag flips. Aggregate records are always default
    /// and are left alone.
    pub fn update_default(&mut self, default_id: Option<u32>, out: &mut Vec<Notification>) -> bool {
        if self.aggregate {
            return false;
        }
        let is_default = self.id.is_some() && self.id == default_id;
        if is_default == self.is_default {
            return false;
        }
        self.is_default = is_default;
        debug!(id = ?self.id, class = %self.media_class, is_default, "Default flag flipped");
        self.notify(Property::IsDefault, out);
        out.push(Notification::Changed(self.snapshot()));
        true
    }

    /// Ask the daemon which node is default for this record's class.
    #[must_use]
    pub fn current_default_id(&self) -> Option<u32> {
        self.defaults.get_default_node(self.media_class.as_str())
    }

    /// Forward a volume value to the mixer, unvalidated.
    ///
    /// Returns false if the record is unbound or the daemon refused.
    pub fn set_volume(&self, volume: f64) -> bool {
        let Some(id) = self.id else {
            return false;
        };
        debug!(id, volume, "Setting volume");
        self.mixer.set_volume(id, VolumeUpdate::Value(volume))
    }

    /// Forward a mute change through the structured mixer call.
    ///
    /// The cached mute is not touched here.
    pub fn set_mute(&self, mute: bool) -> bool {
        let Some(id) = self.id else {
            return false;
        };
        debug!(id, mute, "Setting mute");
        self.mixer.set_volume(id, VolumeUpdate::Fields { volume: None, mute: Some(mute) })
    }

    /// Ask the daemon to make this node the configured default.
    ///
    /// Only `true` does anything. The request names the node, not its id.
    pub fn set_as_default(&self, is_default: bool) -> bool {
        if !is_default {
            return false;
        }
        let Some(node) = &self.node else {
            return false;
        };
        let (Some(media_class), Some(name)) = (node.media_class(), node.name()) else {
            debug!(id = node.id, "Node lacks name or media class, cannot set default");
            return false;
        };
        debug!(id = node.id, name, media_class, "Setting configured default");
        self.defaults.set_default_configured_node_name(media_class, name)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("volume", &self.volume)
            .field("mute", &self.mute)
            .field("description", &self.description)
            .field("media_class", &self.media_class)
            .field("is_default", &self.is_default)
            .field("aggregate", &self.aggregate)
            .finish_non_exhaustive()
    }
}
