//! Keys and values of the session manager's `default` metadata object.
//!
//! WirePlumber publishes the current default sink/source as JSON values of
//! the form `{"name":"<node.name>"}` and reads the user's choice back from
//! the `default.configured.*` keys.

use serde::{Deserialize, Serialize};
use tonewire_core::MediaClass;

/// `metadata.name` of the object holding the defaults.
pub const DEFAULT_METADATA_NAME: &str = "default";

pub const DEFAULT_AUDIO_SINK: &str = "default.audio.sink";
pub const DEFAULT_AUDIO_SOURCE: &str = "default.audio.source";
pub const CONFIGURED_AUDIO_SINK: &str = "default.configured.audio.sink";
pub const CONFIGURED_AUDIO_SOURCE: &str = "default.configured.audio.source";

/// Type tag the session manager expects on JSON values.
pub const JSON_TYPE: &str = "Spa:String:JSON";

#[derive(Debug, Serialize, Deserialize)]
struct NameValue {
    name: String,
}

/// Key holding the current default for a media class string.
#[must_use]
pub fn default_key(media_class: &str) -> Option<&'static str> {
    match MediaClass::from_media_class(media_class)? {
        MediaClass::Speaker => Some(DEFAULT_AUDIO_SINK),
        MediaClass::Microphone => Some(DEFAULT_AUDIO_SOURCE),
        MediaClass::Recorder | MediaClass::Stream => None,
    }
}

/// Key holding the configured default for a media class string.
#[must_use]
pub fn configured_key(media_class: &str) -> Option<&'static str> {
    match MediaClass::from_media_class(media_class)? {
        MediaClass::Speaker => Some(CONFIGURED_AUDIO_SINK),
        MediaClass::Microphone => Some(CONFIGURED_AUDIO_SOURCE),
        MediaClass::Recorder | MediaClass::Stream => None,
    }
}

/// Whether a metadata key is one of the tracked defaults.
#[must_use]
pub fn is_default_key(key: &str) -> bool {
    key == DEFAULT_AUDIO_SINK || key == DEFAULT_AUDIO_SOURCE
}

/// Extract the node name from a metadata value.
#[must_use]
pub fn parse_name(value: &str) -> Option<String> {
    serde_json::from_str::<NameValue>(value).ok().map(|v| v.name)
}

/// Encode a node name as a metadata value.
#[must_use]
pub fn name_value(name: &str) -> String {
    serde_json::json!({ "name": name }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_by_class() {
        assert_eq!(default_key("Audio/Sink"), Some(DEFAULT_AUDIO_SINK));
        assert_eq!(default_key("Audio/Source"), Some(DEFAULT_AUDIO_SOURCE));
        assert_eq!(default_key("Stream/Output/Audio"), None);
        assert_eq!(default_key("Video/Source"), None);
        assert_eq!(configured_key("Audio/Sink"), Some(CONFIGURED_AUDIO_SINK));
        assert_eq!(configured_key("Audio/Source"), Some(CONFIGURED_AUDIO_SOURCE));
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(
            parse_name(r#"{ "name": "alsa_output.pci-0000_00_1f.3.analog-stereo" }"#).as_deref(),
            Some("alsa_output.pci-0000_00_1f.3.analog-stereo")
        );
        assert_eq!(parse_name("not json"), None);
        assert_eq!(parse_name(r#"{"id": 4}"#), None);
    }

    #[test]
    fn test_name_value_is_parseable() {
        let value = name_value("bluez_output.\"quoted\"");
        assert_eq!(parse_name(&value).as_deref(), Some("bluez_output.\"quoted\""));
    }

    #[test]
    fn test_default_keys() {
        assert!(is_default_key("default.audio.sink"));
        assert!(!is_default_key("default.configured.audio.sink"));
        assert!(!is_default_key("default.video.source"));
    }
}
