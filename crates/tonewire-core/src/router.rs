//! Change router.
//!
//! Applies daemon events to the registry and fans the resulting
//! notifications out to subscribers. Every event is handled to completion,
//! then its notifications are delivered in the order they were produced.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::event::WireEvent;
use crate::facade::WireContext;
use crate::media::MediaClass;
use crate::node::{DeviceInfo, NodeInfo};
use crate::notify::{EndpointKey, EventKind, Notification, SubscriptionId, Subscribers};
use crate::registry::EndpointRegistry;

/// Event-driven front end over the endpoint registry.
#[derive(Debug)]
pub struct ChangeRouter {
    registry: EndpointRegistry,
    subscribers: Subscribers,
}

impl ChangeRouter {
    /// Create a router with aggregate default records for every class that
    /// has a default.
    #[must_use]
    pub fn new(context: WireContext) -> Self {
        let mut registry = EndpointRegistry::new(context.clone());
        for class in MediaClass::WITH_DEFAULT {
            registry.create_aggregate_default(
                class,
                Arc::clone(&context.mixer),
                Arc::clone(&context.defaults),
                &mut Vec::new(),
            );
        }
        info!("Change router initialized");
        Self { registry, subscribers: Subscribers::new() }
    }

    /// Read access for queries.
    #[must_use]
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Register a handler for one notification category.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.subscribers.subscribe(kind, handler)
    }

    /// Register a handler for every notification.
    pub fn subscribe_all<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.subscribers.subscribe_all(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Apply one daemon event and deliver its notifications.
    pub fn handle(&mut self, event: WireEvent) {
        let mut out = Vec::new();
        match event {
            WireEvent::NodeAdded(node) => self.node_added(node, &mut out),
            WireEvent::NodeRemoved { id } => self.node_removed(id, &mut out),
            WireEvent::DeviceAdded(info) => self.device_added(&info, &mut out),
            WireEvent::DeviceRemoved { id } => self.device_removed(id, &mut out),
            WireEvent::MixerChanged { id } => self.mixer_changed(id, &mut out),
            WireEvent::DefaultsChanged => self.defaults_changed(&mut out),
        }
        for notification in &out {
            self.subscribers.dispatch(notification);
        }
    }

    fn node_added(&mut self, node: Arc<NodeInfo>, out: &mut Vec<Notification>) {
        let id = node.id;
        if let Some(class) = self.registry.create_concrete(node, out) {
            // The default may have been announced before this node existed
            trace!(id, class = %class, "Re-checking default after node creation");
            self.registry.sync_class(class, out);
        }
    }

    fn node_removed(&mut self, id: u32, out: &mut Vec<Notification>) {
        if self.registry.remove(id, out).is_none() {
            trace!(id, "Removed node was not an endpoint");
        }
    }

    fn device_added(&mut self, info: &DeviceInfo, out: &mut Vec<Notification>) {
        self.registry.add_device(info, out);
    }

    fn device_removed(&mut self, id: u32, out: &mut Vec<Notification>) {
        self.registry.remove_device(id, out);
    }

    fn mixer_changed(&mut self, id: u32, out: &mut Vec<Notification>) {
        if !self.registry.refresh(id, out) {
            trace!(id, "Mixer change for untracked node");
        }
    }

    fn defaults_changed(&mut self, out: &mut Vec<Notification>) {
        debug!("Defaults changed");
        for class in MediaClass::ALL {
            self.registry.sync_class(class, out);
        }
    }

    fn bound(&self, key: EndpointKey) -> Result<&Endpoint> {
        let endpoint = self.registry.get(key).ok_or(Error::EndpointNotFound(key))?;
        if endpoint.id().is_none() {
            return Err(Error::EndpointUnbound(key));
        }
        Ok(endpoint)
    }

    /// Forward a volume change. `Ok(false)` means the daemon refused it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key names no record or an unbound one.
    pub fn set_volume(&self, key: EndpointKey, volume: f64) -> Result<bool> {
        Ok(self.bound(key)?.set_volume(volume))
    }

    /// Forward a mute change. `Ok(false)` means the daemon refused it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key names no record or an unbound one.
    pub fn set_mute(&self, key: EndpointKey, mute: bool) -> Result<bool> {
        Ok(self.bound(key)?.set_mute(mute))
    }

    /// Ask the daemon to make the record's node the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the key names no record or an unbound one.
    pub fn set_default(&self, key: EndpointKey, is_default: bool) -> Result<bool> {
        Ok(self.bound(key)?.set_as_default(is_default))
    }

    /// Drop every handler, record, and facade reference.
    pub fn teardown(mut self) {
        let handlers = self.subscribers.len();
        self.subscribers.clear();
        info!(handlers, "Change router torn down");
    }
}
