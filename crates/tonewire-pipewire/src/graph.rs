//! PipeWire graph cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tonewire_core::NodeInfo;
use tracing::debug;

/// Cached view of the PipeWire graph.
///
/// Written by the PipeWire thread, read by the facades from the daemon's
/// event loop.
pub struct GraphManager {
    /// Cached nodes by ID
    nodes: RwLock<HashMap<u32, Arc<NodeInfo>>>,
    /// Default node names by metadata key
    defaults: RwLock<HashMap<String, String>>,
}

impl GraphManager {
    /// Create an empty graph cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            defaults: RwLock::new(HashMap::new()),
        }
    }

    /// Add a node to the cache.
    pub fn add_node(&self, node: Arc<NodeInfo>) {
        debug!(id = node.id, name = ?node.name(), "Node added to graph");
        self.nodes.write().insert(node.id, node);
    }

    /// Remove a node from the cache.
    pub fn remove_node(&self, id: u32) -> Option<Arc<NodeInfo>> {
        let node = self.nodes.write().remove(&id);
        if let Some(node) = &node {
            debug!(id, name = ?node.name(), "Node removed from graph");
        }
        node
    }

    /// Get a node by ID.
    #[must_use]
    pub fn get_node(&self, id: u32) -> Option<Arc<NodeInfo>> {
        self.nodes.read().get(&id).cloned()
    }

    /// Get a node by `node.name`.
    #[must_use]
    pub fn get_node_by_name(&self, name: &str) -> Option<Arc<NodeInfo>> {
        self.nodes.read().values().find(|n| n.name() == Some(name)).cloned()
    }

    /// Record the node name published under a default metadata key.
    ///
    /// Returns whether the stored name changed.
    pub fn set_default_name(&self, key: &str, name: Option<String>) -> bool {
        let mut defaults = self.defaults.write();
        match name {
            Some(name) => defaults.insert(key.to_string(), name.clone()).as_ref() != Some(&name),
            None => defaults.remove(key).is_some(),
        }
    }

    /// Node name published under a default metadata key.
    #[must_use]
    pub fn default_name(&self, key: &str) -> Option<String> {
        self.defaults.read().get(key).cloned()
    }

    /// Resolve a default metadata key to the id of a cached node.
    #[must_use]
    pub fn default_node_id(&self, key: &str) -> Option<u32> {
        let name = self.default_name(key)?;
        self.get_node_by_name(&name).map(|n| n.id)
    }
}

impl Default for GraphManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(id: u32, name: &str) -> Arc<NodeInfo> {
        Arc::new(
            NodeInfo::new(id)
                .with_property("node.name", name)
                .with_property("media.class", "Audio/Sink"),
        )
    }

    #[test]
    fn test_node_cache() {
        let graph = GraphManager::new();
        graph.add_node(sink(40, "alsa_output.pci"));
        graph.add_node(sink(41, "bluez_output.headset"));

        assert_eq!(graph.get_node_by_name("bluez_output.headset").map(|n| n.id), Some(41));

        assert!(graph.remove_node(40).is_some());
        assert!(graph.get_node(40).is_none());
        assert!(graph.remove_node(40).is_none());
    }

    #[test]
    fn test_default_resolution() {
        let graph = GraphManager::new();
        graph.add_node(sink(40, "alsa_output.pci"));

        assert!(graph.set_default_name("default.audio.sink", Some("alsa_output.pci".into())));
        assert_eq!(graph.default_node_id("default.audio.sink"), Some(40));
        assert_eq!(graph.default_node_id("default.audio.source"), None);

        // Unchanged name
        assert!(!graph.set_default_name("default.audio.sink", Some("alsa_output.pci".into())));

        // Name known before its node
        assert!(graph.set_default_name("default.audio.sink", Some("usb_output".into())));
        assert_eq!(graph.default_node_id("default.audio.sink"), None);
        graph.add_node(sink(42, "usb_output"));
        assert_eq!(graph.default_node_id("default.audio.sink"), Some(42));

        assert!(graph.set_default_name("default.audio.sink", None));
        assert!(!graph.set_default_name("default.audio.sink", None));
        assert_eq!(graph.default_name("default.audio.sink"), None);
    }
}
