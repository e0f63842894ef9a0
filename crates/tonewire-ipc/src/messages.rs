//! IPC message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonewire_core::{EndpointKey, EventKind, MediaClass};

/// Request envelope sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request ID for matching responses
    pub id: u64,
    /// The method to invoke
    pub method: Method,
}

/// Response envelope sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this is responding to
    pub id: u64,
    /// Result of the request
    pub result: Result<Value, ErrorInfo>,
}

/// Error information in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
}

impl ErrorInfo {
    /// Unknown endpoint or device
    pub const NOT_FOUND: i32 = 404;
    /// Endpoint exists but is not bound to a node
    pub const UNAVAILABLE: i32 = 409;
    /// The daemon refused the request
    pub const REJECTED: i32 = 502;

    /// Create a new error.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Methods that can be invoked via IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Method {
    // Queries
    /// Get one endpoint, concrete or aggregate default
    GetEndpoint { key: EndpointKey },
    /// Get an audio device by id
    GetDevice { id: u32 },
    /// List the endpoints of one media class
    ListEndpoints { media_class: MediaClass },
    /// List audio devices
    ListDevices,
    /// Get the aggregate default endpoint of a media class
    GetDefault { media_class: MediaClass },

    // Endpoint control
    /// Set linear volume, forwarded verbatim
    SetVolume { key: EndpointKey, volume: f64 },
    /// Set mute state
    SetMute { key: EndpointKey, mute: bool },
    /// Make an endpoint the configured default; only `true` has an effect
    SetDefault { key: EndpointKey, is_default: bool },

    // Subscriptions
    /// Receive only these event kinds; an empty list means all of them
    Subscribe { events: Vec<EventKind> },
    /// Stop receiving these event kinds
    Unsubscribe { events: Vec<EventKind> },

    // System
    /// Request graceful shutdown
    Shutdown,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_method_wire_format() {
        let request = Request {
            id: 3,
            method: Method::SetVolume { key: EndpointKey::Node(51), volume: 0.25 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"]["type"], "SetVolume");
        assert_eq!(json["method"]["params"]["key"]["type"], "node");
        assert_eq!(json["method"]["params"]["key"]["value"], 51);
    }

    #[test]
    fn test_parse_subscribe() {
        let line = r#"{"id":1,"method":{"type":"Subscribe","params":{"events":["speaker-added","default-changed"]}}}"#;
        let request: Request = serde_json::from_str(line).unwrap();
        assert_matches!(
            request.method,
            Method::Subscribe { events } if events == vec![EventKind::SpeakerAdded, EventKind::DefaultChanged]
        );
    }

    #[test]
    fn test_parse_get_default() {
        let line = r#"{"id":9,"method":{"type":"GetDefault","params":{"media_class":"microphone"}}}"#;
        let request: Request = serde_json::from_str(line).unwrap();
        assert_matches!(request.method, Method::GetDefault { media_class: MediaClass::Microphone });
    }
}
