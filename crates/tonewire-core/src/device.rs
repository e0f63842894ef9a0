//! Device records.

use serde::{Deserialize, Serialize};

use crate::media::DeviceType;
use crate::node::{DeviceInfo, keys};

/// A device-scoped object (a sound card, a camera) as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Daemon object ID
    pub id: u32,
    /// Raw device name
    pub name: Option<String>,
    /// Display label
    pub description: String,
    /// Device type, if the daemon reported a recognised one
    pub device_type: Option<DeviceType>,
}

impl Device {
    /// Build a device record from daemon properties.
    #[must_use]
    pub fn from_info(info: &DeviceInfo) -> Self {
        Self {
            id: info.id,
            name: info.property(keys::DEVICE_NAME).map(String::from),
            description: info.description().to_string(),
            device_type: info.device_type(),
        }
    }

    /// Whether this is an audio device.
    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.device_type == Some(DeviceType::Audio)
    }
}
