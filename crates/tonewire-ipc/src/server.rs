//! IPC server implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::codec::{FramedRead, LinesCodec};
use tonewire_core::EventKind;
use tracing::{debug, error, info, warn};

use crate::error::IpcResult;
use crate::events::Event;
use crate::messages::{Method, Request, Response};

/// Longest request line accepted from a client.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A request forwarded to the daemon, with the channel to answer on.
pub type IncomingRequest = (u64, Request, mpsc::Sender<Response>);

/// IPC server that listens for client connections.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
    clients: Arc<RwLock<HashMap<u64, ClientHandle>>>,
    next_client_id: AtomicU64,
    event_tx: broadcast::Sender<Event>,
    request_tx: mpsc::Sender<IncomingRequest>,
}

struct ClientHandle {
    /// Event kinds the client wants; `None` means all
    subscriptions: Option<Vec<EventKind>>,
}

impl ClientHandle {
    fn wants(&self, kind: EventKind) -> bool {
        self.subscriptions.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    fn subscribe(&mut self, events: &[EventKind]) {
        // An empty request asks for everything
        if events.is_empty() {
            self.subscriptions = None;
            return;
        }
        if let Some(kinds) = &mut self.subscriptions {
            for kind in events {
                if !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
        } else {
            self.subscriptions = Some(events.to_vec());
        }
    }

    fn unsubscribe(&mut self, events: &[EventKind]) {
        let kinds = self.subscriptions.get_or_insert_with(|| EventKind::ALL.to_vec());
        kinds.retain(|k| !events.contains(k));
    }
}

impl IpcServer {
    /// Create a new IPC server bound to the given socket path.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be created.
    pub async fn bind(socket_path: &Path) -> IpcResult<(Self, mpsc::Receiver<IncomingRequest>)> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove stale socket file if it exists
        if socket_path.exists() {
            tokio::fs::remove_file(socket_path).await?;
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(?socket_path, "IPC server listening");

        let (event_tx, _) = broadcast::channel(256);
        let (request_tx, request_rx) = mpsc::channel(64);

        Ok((
            Self {
                listener,
                path: socket_path.to_path_buf(),
                clients: Arc::new(RwLock::new(HashMap::new())),
                next_client_id: AtomicU64::new(1),
                event_tx,
                request_tx,
            },
            request_rx,
        ))
    }

    /// Path of the listening socket.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
                    info!(client_id, "Client connected");

                    let clients = Arc::clone(&self.clients);
                    let event_rx = self.event_tx.subscribe();
                    let request_tx = self.request_tx.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_client(client_id, stream, clients, event_rx, request_tx)
                                .await
                        {
                            error!(client_id, error = %e, "Client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                }
            }
        }
    }

    /// Broadcast an event to all subscribed clients.
    pub fn broadcast(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Get a clone of the event sender for broadcasting from other tasks.
    #[must_use]
    pub fn event_sender(&self) -> broadcast::Sender<Event> {
        self.event_tx.clone()
    }

    async fn write_line<T: serde::Serialize>(writer: &mut OwnedWriteHalf, value: &T) -> IpcResult<()> {
        let json = serde_json::to_string(value)? + "\n";
        writer.write_all(json.as_bytes()).await?;
        Ok(())
    }

    /// Apply a subscription change locally. Returns the response to send,
    /// or `None` if the request belongs to the daemon.
    async fn handle_subscription(
        client_id: u64,
        request: &Request,
        clients: &RwLock<HashMap<u64, ClientHandle>>,
    ) -> Option<Response> {
        let mut clients = clients.write().await;
        let handle = clients.get_mut(&client_id)?;
        match &request.method {
            Method::Subscribe { events } => handle.subscribe(events),
            Method::Unsubscribe { events } => handle.unsubscribe(events),
            _ => return None,
        }
        debug!(client_id, subscriptions = ?handle.subscriptions, "Subscriptions updated");
        Some(Response { id: request.id, result: Ok(json!({ "subscriptions": handle.subscriptions })) })
    }

    async fn handle_client(
        client_id: u64,
        stream: UnixStream,
        clients: Arc<RwLock<HashMap<u64, ClientHandle>>>,
        mut event_rx: broadcast::Receiver<Event>,
        request_tx: mpsc::Sender<IncomingRequest>,
    ) -> IpcResult<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        let (response_tx, mut response_rx) = mpsc::channel::<Response>(16);

        // Register client
        clients.write().await.insert(client_id, ClientHandle { subscriptions: None });

        loop {
            tokio::select! {
                // Read request from client
                line = lines.next() => {
                    match line {
                        None => {
                            debug!(client_id, "Client disconnected");
                            break;
                        }
                        Some(Ok(line)) => {
                            let Ok(request) = serde_json::from_str::<Request>(&line) else {
                                warn!(client_id, "Invalid request format");
                                continue;
                            };
                            debug!(client_id, request_id = request.id, "Received request");
                            if let Some(response) =
                                Self::handle_subscription(client_id, &request, &clients).await
                            {
                                Self::write_line(&mut writer, &response).await?;
                            } else if request_tx.send((client_id, request, response_tx.clone())).await.is_err() {
                                warn!(client_id, "Daemon stopped accepting requests");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!(client_id, error = %e, "Read error");
                            break;
                        }
                    }
                }

                // Send response to client
                Some(response) = response_rx.recv() => {
                    if let Err(e) = Self::write_line(&mut writer, &response).await {
                        error!(client_id, error = %e, "Write error");
                        break;
                    }
                }

                // Forward events to client
                event = event_rx.recv() => {
                    match event {
                        Ok(event) => {
                            let wanted = clients
                                .read()
                                .await
                                .get(&client_id)
                                .is_some_and(|handle| handle.wants(event.event));
                            if wanted
                                && let Err(e) = Self::write_line(&mut writer, &event).await
                            {
                                error!(client_id, error = %e, "Event write error");
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(client_id, skipped, "Client fell behind, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }

        // Unregister client
        clients.write().await.remove(&client_id);

        info!(client_id, "Client handler exiting");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use tonewire_core::{MediaClass, Notification};

    use super::*;
    use crate::client::IpcClient;
    use crate::messages::ErrorInfo;

    async fn serve(dir: &tempfile::TempDir) -> (Arc<IpcServer>, mpsc::Receiver<IncomingRequest>, PathBuf) {
        let path = dir.path().join("tonewire/daemon.sock");
        let (server, requests) = IpcServer::bind(&path).await.unwrap();
        let server = Arc::new(server);
        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });
        (server, requests, path)
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (_server, mut requests, path) = serve(&dir).await;

        tokio::spawn(async move {
            while let Some((_, request, reply)) = requests.recv().await {
                let result = match request.method {
                    Method::GetDevice { id } => Err(ErrorInfo::new(ErrorInfo::NOT_FOUND, format!("Device not found: {id}"))),
                    _ => Ok(json!({ "ok": true })),
                };
                let _ = reply.send(Response { id: request.id, result }).await;
            }
        });

        let client = IpcClient::connect(&path).await.unwrap();
        let response = client.request(Method::ListDevices).await.unwrap();
        assert_eq!(response.result, Ok(json!({ "ok": true })));

        let response = client.request(Method::GetDevice { id: 7 }).await.unwrap();
        assert_matches!(response.result, Err(ErrorInfo { code: ErrorInfo::NOT_FOUND, .. }));
    }

    #[tokio::test]
    async fn test_subscription_filters_events() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _requests, path) = serve(&dir).await;

        let mut client = IpcClient::connect(&path).await.unwrap();
        let response = client
            .request(Method::Subscribe { events: vec![EventKind::DefaultChanged] })
            .await
            .unwrap();
        assert!(response.result.is_ok());

        server.broadcast(Event::from_notification(&Notification::DeviceRemoved(
            tonewire_core::Device {
                id: 30,
                name: None,
                description: "Card".into(),
                device_type: None,
            },
        )));
        let notification = Notification::DefaultChanged { media_class: MediaClass::Speaker, id: Some(48) };
        server.broadcast(Event::from_notification(&notification));

        let event = tokio::time::timeout(Duration::from_secs(5), client.events().recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event, EventKind::DefaultChanged);
        assert_eq!(event.notification(), Some(notification));
    }

    #[tokio::test]
    async fn test_unsubscribing_every_kind_silences_client() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _requests, path) = serve(&dir).await;

        let mut client = IpcClient::connect(&path).await.unwrap();
        client.request(Method::Subscribe { events: vec![EventKind::DefaultChanged] }).await.unwrap();
        let response = client
            .request(Method::Unsubscribe { events: vec![EventKind::DefaultChanged] })
            .await
            .unwrap();
        assert_eq!(response.result, Ok(json!({ "subscriptions": [] })));

        server.broadcast(Event::from_notification(&Notification::DefaultChanged {
            media_class: MediaClass::Speaker,
            id: Some(48),
        }));

        client.request(Method::Subscribe { events: vec![EventKind::PropertyChanged] }).await.unwrap();
        let marker = Notification::PropertyChanged {
            endpoint: tonewire_core::EndpointKey::Node(48),
            property: tonewire_core::Property::Volume,
        };
        server.broadcast(Event::from_notification(&marker));

        // The first event through is the marker, not the unsubscribed one
        let event = tokio::time::timeout(Duration::from_secs(5), client.events().recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event, EventKind::PropertyChanged);
    }

    #[test]
    fn test_client_handle_subscription_modes() {
        let mut handle = ClientHandle { subscriptions: None };
        assert!(handle.wants(EventKind::Changed));

        handle.unsubscribe(&[EventKind::Changed]);
        assert!(!handle.wants(EventKind::Changed));
        assert!(handle.wants(EventKind::SpeakerAdded));

        handle.subscribe(&[EventKind::Changed]);
        assert!(handle.wants(EventKind::Changed));

        handle.subscribe(&[]);
        assert_eq!(handle.subscriptions, None);
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        std::fs::write(&path, b"stale").unwrap();

        let (server, _requests) = IpcServer::bind(&path).await.unwrap();
        assert_eq!(server.path(), path.as_path());
    }
}
