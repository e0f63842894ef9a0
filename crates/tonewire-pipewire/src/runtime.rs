//! PipeWire runtime thread.
//!
//! Owns the PipeWire main loop, the registry listener, a proxy for every
//! audio endpoint node (to observe volume changes), and the `default`
//! metadata object. Everything PipeWire-side runs on this one thread; the
//! rest of the daemon talks to it through channels.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use libspa::utils::dict::DictRef;
use parking_lot::Mutex;
use pipewire::context::ContextRc;
use pipewire::main_loop::MainLoopRc;
use pipewire::metadata::{Metadata, MetadataListener};
use pipewire::node::{Node, NodeChangeMask, NodeListener};
use pipewire::registry::{GlobalObject, RegistryRc};
use pipewire::types::ObjectType;
use tokio::sync::mpsc;
use tonewire_core::{DeviceInfo, NodeInfo, WireEvent};
use tracing::{debug, error, info, warn};

use crate::defaults::MetadataWriter;
use crate::error::{PwError, PwResult};
use crate::graph::GraphManager;
use crate::metadata;

/// How long a caller waits for the PipeWire thread to answer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Events emitted by the runtime thread.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// PipeWire connection established
    Connected,
    /// PipeWire connection lost
    Disconnected,
    /// A change for the endpoint router
    Wire(WireEvent),
}

/// Requests handled on the PipeWire thread.
#[derive(Debug)]
enum RuntimeRequest {
    /// Write a JSON property on the `default` metadata object
    SetMetadata { seq: u64, key: String, value: String },
    /// Quit the main loop
    Shutdown,
}

/// Answers to [`RuntimeRequest`]s.
#[derive(Debug)]
enum RuntimeResponse {
    Done,
    Error(String),
}

/// Caller side of the request channel.
struct RequestChannel {
    sender: pipewire::channel::Sender<RuntimeRequest>,
    /// Answers tagged with the sequence number of their request
    responses: std_mpsc::Receiver<(u64, RuntimeResponse)>,
    next_seq: u64,
}

/// Kind of global tracked for removal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalKind {
    Node,
    Device,
    Metadata,
}

/// Proxies that must stay alive for their listeners to fire.
#[derive(Default)]
struct Proxies {
    nodes: HashMap<u32, (Node, NodeListener)>,
    metadata: Option<(u32, Metadata, MetadataListener)>,
}

/// PipeWire runtime handle for the async world.
pub struct PipeWireRuntime {
    channel: Mutex<RequestChannel>,
}

impl PipeWireRuntime {
    /// Spawn the PipeWire thread and return a handle plus its event stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(graph: Arc<GraphManager>) -> PwResult<(Self, mpsc::Receiver<GraphEvent>)> {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (request_tx, request_rx) = pipewire::channel::channel();
        let (response_tx, response_rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name("pipewire-runtime".to_string())
            .spawn(move || {
                let disconnect_tx = event_tx.clone();
                if let Err(e) = run_pipewire_thread(graph, event_tx, request_rx, response_tx) {
                    error!(error = %e, "PipeWire runtime failed");
                }
                let _ = disconnect_tx.blocking_send(GraphEvent::Disconnected);
            })
            .map_err(|e| PwError::MainLoopError(format!("Failed to spawn PipeWire thread: {e}")))?;

        let channel = RequestChannel { sender: request_tx, responses: response_rx, next_seq: 1 };
        Ok((Self { channel: Mutex::new(channel) }, event_rx))
    }

    fn set_metadata(&self, key: &str, value: &str) -> PwResult<()> {
        let mut channel = self.channel.lock();
        let seq = channel.next_seq;
        channel.next_seq += 1;

        channel
            .sender
            .send(RuntimeRequest::SetMetadata { seq, key: key.to_string(), value: value.to_string() })
            .map_err(|_| PwError::MainLoopError("Runtime channel closed".to_string()))?;

        await_response(&channel.responses, seq, REQUEST_TIMEOUT)
    }

    /// Request shutdown of the PipeWire thread.
    pub fn shutdown(&self) {
        let _ = self.channel.lock().sender.send(RuntimeRequest::Shutdown);
    }
}

impl MetadataWriter for PipeWireRuntime {
    fn set_property(&self, key: &str, value: &str) -> PwResult<()> {
        self.set_metadata(key, value)
    }
}

/// Wait for the answer to request `seq`.
///
/// Answers to earlier requests that timed out may still be queued; they are
/// skipped.
fn await_response(
    responses: &std_mpsc::Receiver<(u64, RuntimeResponse)>,
    seq: u64,
    timeout: Duration,
) -> PwResult<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match responses.recv_timeout(remaining) {
            Ok((answered, response)) if answered == seq => {
                return match response {
                    RuntimeResponse::Done => Ok(()),
                    RuntimeResponse::Error(e) => Err(PwError::MetadataUnavailable(e)),
                };
            }
            Ok((stale, _)) => debug!(stale, seq, "Dropping late runtime response"),
            Err(_) => {
                return Err(PwError::MainLoopError("Timeout waiting for response".to_string()));
            }
        }
    }
}

/// Run the PipeWire thread until shutdown or a fatal core error.
fn run_pipewire_thread(
    graph: Arc<GraphManager>,
    event_tx: mpsc::Sender<GraphEvent>,
    request_rx: pipewire::channel::Receiver<RuntimeRequest>,
    response_tx: std_mpsc::Sender<(u64, RuntimeResponse)>,
) -> PwResult<()> {
    pipewire::init();

    info!("PipeWire runtime starting...");

    let main_loop = MainLoopRc::new(None)
        .map_err(|e| PwError::MainLoopError(format!("Failed to create main loop: {e}")))?;

    let context = ContextRc::new(&main_loop, None)
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to create context: {e}")))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to connect: {e}")))?;

    let registry = core
        .get_registry_rc()
        .map_err(|e| PwError::RegistryError(format!("Failed to get registry: {e}")))?;

    info!("Connected to PipeWire");
    let _ = event_tx.blocking_send(GraphEvent::Connected);

    // A core error on the core object itself means the connection is gone
    let main_loop_for_error = main_loop.clone();
    let _core_listener = core
        .add_listener_local()
        .error(move |id, seq, res, message| {
            if id == pipewire::core::PW_ID_CORE {
                error!(seq, res, message, "PipeWire core error");
                main_loop_for_error.quit();
            } else {
                warn!(id, seq, res, message, "PipeWire object error");
            }
        })
        .register();

    let kinds: Rc<RefCell<HashMap<u32, GlobalKind>>> = Rc::new(RefCell::new(HashMap::new()));
    let proxies: Rc<RefCell<Proxies>> = Rc::new(RefCell::new(Proxies::default()));

    let kinds_remove = Rc::clone(&kinds);
    let proxies_remove = Rc::clone(&proxies);
    let proxies_request = Rc::clone(&proxies);
    let event_tx_global = event_tx.clone();
    let event_tx_remove = event_tx.clone();
    let graph_global = Arc::clone(&graph);
    let graph_remove = Arc::clone(&graph);
    let registry_global = registry.clone();

    let _listener = registry
        .add_listener_local()
        .global(move |global| {
            let ctx = GlobalContext {
                event_tx: &event_tx_global,
                graph: &graph_global,
                registry: &registry_global,
                kinds: &kinds,
                proxies: &proxies,
            };
            handle_global(&ctx, global);
        })
        .global_remove(move |id| {
            handle_global_remove(&event_tx_remove, &graph_remove, &kinds_remove, &proxies_remove, id);
        })
        .register();

    let main_loop_for_shutdown = main_loop.clone();

    let _request_receiver = request_rx.attach(main_loop.loop_(), move |request| match request {
        RuntimeRequest::SetMetadata { seq, key, value } => {
            let response = match &proxies_request.borrow().metadata {
                Some((_, proxy, _)) => {
                    proxy.set_property(0, &key, Some(metadata::JSON_TYPE), Some(&value));
                    debug!(key = %key, value = %value, "Metadata property set");
                    RuntimeResponse::Done
                }
                None => RuntimeResponse::Error("default metadata not bound".to_string()),
            };
            let _ = response_tx.send((seq, response));
        }
        RuntimeRequest::Shutdown => {
            info!("Runtime received shutdown request");
            main_loop_for_shutdown.quit();
        }
    });

    info!("Starting PipeWire main loop");
    main_loop.run();

    info!("PipeWire runtime exiting");
    Ok(())
}

/// Shared state handed to the registry `global` callback.
struct GlobalContext<'a> {
    event_tx: &'a mpsc::Sender<GraphEvent>,
    graph: &'a Arc<GraphManager>,
    registry: &'a RegistryRc,
    kinds: &'a Rc<RefCell<HashMap<u32, GlobalKind>>>,
    proxies: &'a Rc<RefCell<Proxies>>,
}

fn collect_properties(props: Option<&DictRef>) -> HashMap<String, String> {
    props
        .map(|p| p.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        .unwrap_or_default()
}

fn handle_global(ctx: &GlobalContext<'_>, global: &GlobalObject<&DictRef>) {
    let props = global.props.as_ref().copied();

    match global.type_ {
        ObjectType::Node => {
            let node = Arc::new(NodeInfo { id: global.id, properties: collect_properties(props) });
            debug!(id = global.id, name = ?node.name(), class = ?node.media_class(), "Node added");

            ctx.kinds.borrow_mut().insert(global.id, GlobalKind::Node);
            ctx.graph.add_node(Arc::clone(&node));

            if node.classify().is_some() {
                watch_node(ctx, global);
            }
            let _ = ctx.event_tx.blocking_send(GraphEvent::Wire(WireEvent::NodeAdded(node)));
        }

        ObjectType::Device => {
            let device = DeviceInfo { id: global.id, properties: collect_properties(props) };
            debug!(id = global.id, class = ?device.device_type(), "Device added");

            ctx.kinds.borrow_mut().insert(global.id, GlobalKind::Device);
            let _ = ctx.event_tx.blocking_send(GraphEvent::Wire(WireEvent::DeviceAdded(device)));
        }

        ObjectType::Metadata => {
            let name = props.and_then(|p| p.get("metadata.name"));
            if name == Some(metadata::DEFAULT_METADATA_NAME) {
                watch_default_metadata(ctx, global);
            }
        }

        _ => {}
    }
}

/// Bind a node proxy so parameter changes (volume, mute) are reported.
fn watch_node(ctx: &GlobalContext<'_>, global: &GlobalObject<&DictRef>) {
    let id = global.id;
    let node: Node = match ctx.registry.bind(global) {
        Ok(node) => node,
        Err(e) => {
            warn!(id, error = %e, "Failed to bind node proxy");
            return;
        }
    };

    let event_tx = ctx.event_tx.clone();
    let listener = node
        .add_listener_local()
        .info(move |info| {
            if info.change_mask().contains(NodeChangeMask::PARAMS) {
                let _ = event_tx.blocking_send(GraphEvent::Wire(WireEvent::MixerChanged { id }));
            }
        })
        .register();

    ctx.proxies.borrow_mut().nodes.insert(id, (node, listener));
}

/// Bind the `default` metadata object and mirror its default keys.
fn watch_default_metadata(ctx: &GlobalContext<'_>, global: &GlobalObject<&DictRef>) {
    let id = global.id;
    let proxy: Metadata = match ctx.registry.bind(global) {
        Ok(proxy) => proxy,
        Err(e) => {
            warn!(id, error = %e, "Failed to bind default metadata");
            return;
        }
    };

    let event_tx = ctx.event_tx.clone();
    let graph = Arc::clone(ctx.graph);
    let listener = proxy
        .add_listener_local()
        .property(move |subject, key, _type, value| {
            handle_metadata_property(&event_tx, &graph, subject, key, value);
            0
        })
        .register();

    info!(id, "Watching default metadata");
    ctx.kinds.borrow_mut().insert(id, GlobalKind::Metadata);
    ctx.proxies.borrow_mut().metadata = Some((id, proxy, listener));
}

fn handle_metadata_property(
    event_tx: &mpsc::Sender<GraphEvent>,
    graph: &GraphManager,
    subject: u32,
    key: Option<&str>,
    value: Option<&str>,
) {
    if subject != 0 {
        return;
    }
    let keys: Vec<&str> = match key {
        Some(key) if metadata::is_default_key(key) => vec![key],
        Some(_) => return,
        // A cleared subject drops every key
        None => vec![metadata::DEFAULT_AUDIO_SINK, metadata::DEFAULT_AUDIO_SOURCE],
    };

    let name = value.and_then(metadata::parse_name);
    let mut changed = false;
    for key in keys {
        changed |= graph.set_default_name(key, name.clone());
    }
    if changed {
        debug!(?key, ?name, "Default node changed");
        let _ = event_tx.blocking_send(GraphEvent::Wire(WireEvent::DefaultsChanged));
    }
}

fn handle_global_remove(
    event_tx: &mpsc::Sender<GraphEvent>,
    graph: &GraphManager,
    kinds: &Rc<RefCell<HashMap<u32, GlobalKind>>>,
    proxies: &Rc<RefCell<Proxies>>,
    id: u32,
) {
    let Some(kind) = kinds.borrow_mut().remove(&id) else {
        return;
    };

    match kind {
        GlobalKind::Node => {
            proxies.borrow_mut().nodes.remove(&id);
            graph.remove_node(id);
            debug!(id, "Node removed");
            let _ = event_tx.blocking_send(GraphEvent::Wire(WireEvent::NodeRemoved { id }));
        }
        GlobalKind::Device => {
            debug!(id, "Device removed");
            let _ = event_tx.blocking_send(GraphEvent::Wire(WireEvent::DeviceRemoved { id }));
        }
        GlobalKind::Metadata => {
            warn!(id, "Default metadata removed");
            proxies.borrow_mut().metadata = None;
            let mut changed = false;
            for key in [metadata::DEFAULT_AUDIO_SINK, metadata::DEFAULT_AUDIO_SOURCE] {
                changed |= graph.set_default_name(key, None);
            }
            if changed {
                let _ = event_tx.blocking_send(GraphEvent::Wire(WireEvent::DefaultsChanged));
            }
        }
    }
}
