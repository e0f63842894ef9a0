//! Media classes and device types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of audio endpoint a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    /// Capture device (`Audio/Source`)
    Microphone,
    /// Playback device (`Audio/Sink`)
    Speaker,
    /// Application capture stream (`Stream/Input/Audio`)
    Recorder,
    /// Application playback stream (`Stream/Output/Audio`)
    Stream,
}

impl MediaClass {
    /// Every media class, in declaration order.
    pub const ALL: [Self; 4] = [Self::Microphone, Self::Speaker, Self::Recorder, Self::Stream];

    /// Classes that carry an always-present default-tracking endpoint.
    pub const WITH_DEFAULT: [Self; 2] = [Self::Speaker, Self::Microphone];

    /// The daemon's media class string for this class.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Microphone => "Audio/Source",
            Self::Speaker => "Audio/Sink",
            Self::Recorder => "Stream/Input/Audio",
            Self::Stream => "Stream/Output/Audio",
        }
    }

    /// Classify a daemon media class string.
    ///
    /// Returns `None` for anything outside the four audio classes
    /// (e.g. `Video/Source`, `Audio/Duplex`).
    #[must_use]
    pub fn from_media_class(media_class: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.as_str() == media_class)
    }

    /// Whether this class has an aggregate default endpoint.
    #[must_use]
    pub fn has_default(self) -> bool {
        Self::WITH_DEFAULT.contains(&self)
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Microphone => "microphone",
            Self::Speaker => "speaker",
            Self::Recorder => "recorder",
            Self::Stream => "stream",
        };
        f.write_str(name)
    }
}

/// Kind of device a device-scoped object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// `Audio/Device`
    Audio,
    /// `Video/Device`
    Video,
}

impl DeviceType {
    /// Classify a device media class string.
    #[must_use]
    pub fn from_media_class(media_class: &str) -> Option<Self> {
        match media_class {
            "Audio/Device" => Some(Self::Audio),
            "Video/Device" => Some(Self::Video),
            _ => None,
        }
    }
}
