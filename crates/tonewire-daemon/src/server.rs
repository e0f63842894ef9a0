//! Request handling for the IPC server.

use serde_json::{Value, json};
use tracing::{debug, info};

use tonewire_core::{ChangeRouter, EndpointKey, Error};
use tonewire_ipc::messages::{ErrorInfo, Method};

/// Handle an IPC request and return a response value.
///
/// Queries answer `null` for records that do not exist; mutators report
/// unknown or unbound endpoints as errors.
pub fn handle_request(method: &Method, router: &ChangeRouter) -> Result<Value, ErrorInfo> {
    let registry = router.registry();

    match method {
        Method::GetEndpoint { key } => Ok(to_json(registry.get(*key).map(|e| e.snapshot()))),

        Method::GetDevice { id } => Ok(to_json(registry.get_device(*id))),

        Method::ListEndpoints { media_class } => {
            Ok(to_json(registry.list_by_media_class(*media_class).to_vec()))
        }

        Method::ListDevices => Ok(to_json(registry.list_devices())),

        Method::GetDefault { media_class } => {
            Ok(to_json(registry.default_endpoint(*media_class).map(|e| e.snapshot())))
        }

        Method::SetVolume { key, volume } => {
            debug!(%key, volume, "Setting volume");
            confirm(*key, router.set_volume(*key, *volume))
        }

        Method::SetMute { key, mute } => {
            debug!(%key, mute, "Setting mute");
            confirm(*key, router.set_mute(*key, *mute))
        }

        Method::SetDefault { key, is_default } => {
            debug!(%key, is_default, "Setting default");
            match router.set_default(*key, *is_default) {
                // Clearing a default is not something the daemon offers
                Ok(false) if !is_default => Ok(json!({ "success": false })),
                result => confirm(*key, result),
            }
        }

        // The IPC server applies these per connection before forwarding
        Method::Subscribe { .. } | Method::Unsubscribe { .. } => Err(ErrorInfo::new(
            400,
            "Subscriptions are managed by the connection",
        )),

        Method::Shutdown => {
            info!("Shutdown requested via IPC");
            Ok(json!({ "success": true }))
        }
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn confirm(key: EndpointKey, result: tonewire_core::Result<bool>) -> Result<Value, ErrorInfo> {
    match result {
        Ok(true) => Ok(json!({ "success": true })),
        Ok(false) => Err(ErrorInfo::new(
            ErrorInfo::REJECTED,
            format!("Audio daemon rejected the request for {key}"),
        )),
        Err(e @ Error::EndpointNotFound(_)) => Err(ErrorInfo::new(ErrorInfo::NOT_FOUND, e.to_string())),
        Err(e @ Error::EndpointUnbound(_)) => {
            Err(ErrorInfo::new(ErrorInfo::UNAVAILABLE, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use tonewire_core::node::keys;
    use tonewire_core::{
        DefaultsFacade, MediaClass, MixerFacade, NodeInfo, VolumeState, VolumeUpdate, WireContext,
        WireEvent,
    };

    use super::*;

    #[derive(Default)]
    struct StubDaemon {
        volumes: Mutex<HashMap<u32, VolumeState>>,
        default_sink: Mutex<Option<u32>>,
        accept_writes: bool,
    }

    impl MixerFacade for StubDaemon {
        fn get_volume(&self, id: u32) -> Option<VolumeState> {
            self.volumes.lock().get(&id).copied()
        }

        fn set_volume(&self, id: u32, update: VolumeUpdate) -> bool {
            if let VolumeUpdate::Value(volume) = update {
                self.volumes.lock().entry(id).or_default().volume = Some(volume);
            }
            self.accept_writes
        }
    }

    impl DefaultsFacade for StubDaemon {
        fn get_default_node(&self, media_class: &str) -> Option<u32> {
            (media_class == MediaClass::Speaker.as_str()).then(|| *self.default_sink.lock()).flatten()
        }

        fn set_default_configured_node_name(&self, _media_class: &str, _name: &str) -> bool {
            self.accept_writes
        }
    }

    fn make_router(accept_writes: bool) -> ChangeRouter {
        let daemon = Arc::new(StubDaemon { accept_writes, ..StubDaemon::default() });
        daemon.volumes.lock().insert(40, VolumeState::new(0.5, false));
        *daemon.default_sink.lock() = Some(40);

        let mut router = ChangeRouter::new(WireContext::new(daemon.clone(), daemon));
        router.handle(WireEvent::NodeAdded(Arc::new(
            NodeInfo::new(40)
                .with_property(keys::MEDIA_CLASS, "Audio/Sink")
                .with_property(keys::NODE_NAME, "alsa_output.pci")
                .with_property(keys::NODE_DESCRIPTION, "Speakers"),
        )));
        router
    }

    #[test]
    fn test_get_endpoint() {
        let router = make_router(true);

        let value = handle_request(&Method::GetEndpoint { key: EndpointKey::Node(40) }, &router).unwrap();
        assert_eq!(value["id"], 40);
        assert_eq!(value["description"], "Speakers");
        assert_eq!(value["volume"], 0.5);

        let value = handle_request(&Method::GetEndpoint { key: EndpointKey::Node(99) }, &router).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_default_and_listing() {
        let router = make_router(true);

        let value = handle_request(&Method::GetDefault { media_class: MediaClass::Speaker }, &router).unwrap();
        assert_eq!(value["id"], 40);
        assert_eq!(value["is_aggregate_default"], true);

        let value =
            handle_request(&Method::ListEndpoints { media_class: MediaClass::Speaker }, &router).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));

        let value =
            handle_request(&Method::ListEndpoints { media_class: MediaClass::Recorder }, &router).unwrap();
        assert_eq!(value, json!([]));
    }

    #[test]
    fn test_mutator_errors() {
        let router = make_router(true);

        let err = handle_request(&Method::SetVolume { key: EndpointKey::Node(99), volume: 0.2 }, &router)
            .unwrap_err();
        assert_eq!(err.code, ErrorInfo::NOT_FOUND);

        let err = handle_request(
            &Method::SetMute { key: EndpointKey::Default(MediaClass::Microphone), mute: true },
            &router,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorInfo::UNAVAILABLE);
    }

    #[test]
    fn test_mutators_forward_to_daemon() {
        let router = make_router(true);
        let ok = handle_request(&Method::SetVolume { key: EndpointKey::Node(40), volume: 0.2 }, &router);
        assert_eq!(ok, Ok(json!({ "success": true })));

        let ok = handle_request(
            &Method::SetDefault { key: EndpointKey::Node(40), is_default: false },
            &router,
        );
        assert_eq!(ok, Ok(json!({ "success": false })));

        let router = make_router(false);
        let err = handle_request(
            &Method::SetDefault { key: EndpointKey::Node(40), is_default: true },
            &router,
        );
        assert_matches!(err, Err(ErrorInfo { code: ErrorInfo::REJECTED, .. }));
    }

    #[test]
    fn test_subscriptions_are_not_daemon_requests() {
        let router = make_router(true);
        assert!(handle_request(&Method::Subscribe { events: Vec::new() }, &router).is_err());
        assert!(handle_request(&Method::Shutdown, &router).is_ok());
    }
}
