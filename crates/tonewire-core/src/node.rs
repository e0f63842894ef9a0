//! Daemon node and device references.
//!
//! These are the property bags the routing daemon hands us for each global
//! object. Endpoint records hold a shared reference to the node they are
//! bound to and re-read these properties on every bind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::media::{DeviceType, MediaClass};

/// Property keys read from daemon objects.
pub mod keys {
    pub const NODE_NAME: &str = "node.name";
    pub const NODE_DESCRIPTION: &str = "node.description";
    pub const NODE_NICK: &str = "node.nick";
    pub const MEDIA_CLASS: &str = "media.class";
    pub const DEVICE_NAME: &str = "device.name";
    pub const DEVICE_DESCRIPTION: &str = "device.description";
    pub const DEVICE_NICK: &str = "device.nick";
}

/// Display string used when no label property is present.
pub const UNKNOWN_DESCRIPTION: &str = "unknown";

/// Information about a daemon node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Daemon object ID
    pub id: u32,
    /// All node properties
    pub properties: HashMap<String, String>,
}

impl NodeInfo {
    /// Create a node with no properties.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self { id, properties: HashMap::new() }
    }

    /// Add a property, builder style.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Look up a raw property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The node's raw name (`node.name`).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.property(keys::NODE_NAME)
    }

    /// The node's raw media class string (`media.class`).
    #[must_use]
    pub fn media_class(&self) -> Option<&str> {
        self.property(keys::MEDIA_CLASS)
    }

    /// The node's media class, if it is one of the audio endpoint classes.
    #[must_use]
    pub fn classify(&self) -> Option<MediaClass> {
        self.media_class().and_then(MediaClass::from_media_class)
    }

    /// Display label: description, then nickname, then raw name.
    #[must_use]
    pub fn description(&self) -> &str {
        self.property(keys::NODE_DESCRIPTION)
            .or_else(|| self.property(keys::NODE_NICK))
            .or_else(|| self.property(keys::NODE_NAME))
            .unwrap_or(UNKNOWN_DESCRIPTION)
    }
}

/// Information about a daemon device object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Daemon object ID
    pub id: u32,
    /// All device properties
    pub properties: HashMap<String, String>,
}

impl DeviceInfo {
    /// Create a device with no properties.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self { id, properties: HashMap::new() }
    }

    /// Add a property, builder style.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Look up a raw property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Device type from `media.class`.
    #[must_use]
    pub fn device_type(&self) -> Option<DeviceType> {
        self.property(keys::MEDIA_CLASS).and_then(DeviceType::from_media_class)
    }

    /// Display label: description, then nickname, then raw name.
    #[must_use]
    pub fn description(&self) -> &str {
        self.property(keys::DEVICE_DESCRIPTION)
            .or_else(|| self.property(keys::DEVICE_NICK))
            .or_else(|| self.property(keys::DEVICE_NAME))
            .unwrap_or(UNKNOWN_DESCRIPTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_prefers_description() {
        let node = NodeInfo::new(1)
            .with_property(keys::NODE_NAME, "alsa_output.pci")
            .with_property(keys::NODE_NICK, "HDA Intel")
            .with_property(keys::NODE_DESCRIPTION, "Built-in Audio");

        assert_eq!(node.description(), "Built-in Audio");
    }

    #[test]
    fn test_description_falls_back_to_nick_then_name() {
        let node = NodeInfo::new(1)
            .with_property(keys::NODE_NAME, "alsa_output.pci")
            .with_property(keys::NODE_NICK, "HDA Intel");
        assert_eq!(node.description(), "HDA Intel");

        let node = NodeInfo::new(1).with_property(keys::NODE_NAME, "alsa_output.pci");
        assert_eq!(node.description(), "alsa_output.pci");
    }

    #[test]
    fn test_description_defaults_to_unknown() {
        assert_eq!(NodeInfo::new(1).description(), "unknown");
        assert_eq!(DeviceInfo::new(1).description(), "unknown");
    }

    #[test]
    fn test_classify_uses_media_class() {
        let sink = NodeInfo::new(3).with_property(keys::MEDIA_CLASS, "Audio/Sink");
        assert_eq!(sink.classify(), Some(MediaClass::Speaker));

        let camera = NodeInfo::new(4).with_property(keys::MEDIA_CLASS, "Video/Source");
        assert_eq!(camera.classify(), None);

        assert_eq!(NodeInfo::new(5).classify(), None);
    }

    #[test]
    fn test_device_type_and_label() {
        let device = DeviceInfo::new(40)
            .with_property(keys::MEDIA_CLASS, "Audio/Device")
            .with_property(keys::DEVICE_NAME, "alsa_card.pci-0000_00_1f.3")
            .with_property(keys::DEVICE_NICK, "HDA Intel PCH");

        assert_eq!(device.device_type(), Some(DeviceType::Audio));
        assert_eq!(device.description(), "HDA Intel PCH");
    }
}
