//! Tonewire Daemon - audio endpoint service.
//!
//! Mirrors the PipeWire graph into endpoint records (speakers, microphones,
//! recorders, streams and the two default-tracking endpoints) and serves
//! them to consumers over the IPC socket.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod server;
mod signals;

use config::ConfigSource;
use tonewire_core::{ChangeRouter, WireContext};
use tonewire_ipc::messages::{Method, Response};
use tonewire_ipc::{Event, IpcServer, socket_path};
use tonewire_pipewire::{GraphEvent, GraphManager, MetadataDefaults, PipeWireRuntime, WpctlMixer};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, source) = config::load_config()?;

    // Initialize logging
    let level = &config.daemon.log_level;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("tonewire_core={level}").parse()?)
                .add_directive(format!("tonewire_pipewire={level}").parse()?)
                .add_directive(format!("tonewire_ipc={level}").parse()?)
                .add_directive(format!("tonewire_daemon={level}").parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Tonewire daemon");
    match &source {
        ConfigSource::File(path) => info!(?path, "Configuration loaded"),
        ConfigSource::Defaults(path) => debug!(?path, "No config file, using defaults"),
    }

    // Initialize PipeWire graph manager
    let graph = Arc::new(GraphManager::new());

    // Spawn PipeWire runtime
    info!("Starting PipeWire runtime...");
    let (pw_runtime, mut graph_event_rx) =
        PipeWireRuntime::spawn(Arc::clone(&graph)).context("Failed to start PipeWire runtime")?;
    let pw_runtime = Arc::new(pw_runtime);

    // Wait for PipeWire connection
    info!("Waiting for PipeWire connection...");
    let mut connected = false;
    while let Some(event) = graph_event_rx.recv().await {
        if matches!(event, GraphEvent::Connected) {
            connected = true;
            info!("PipeWire connected");
            break;
        }
    }

    if !connected {
        error!("Failed to connect to PipeWire");
        return Err(anyhow::anyhow!("PipeWire connection failed"));
    }

    // Wire the router to the mixer and default-node metadata
    let mixer = Arc::new(WpctlMixer::new(config.tools.wpctl.clone()));
    let defaults = Arc::new(MetadataDefaults::new(Arc::clone(&graph), pw_runtime.clone()));
    let mut router = ChangeRouter::new(WireContext::new(mixer, defaults));

    // Start IPC server
    let socket = config.ipc.socket_path.clone().unwrap_or_else(socket_path);
    info!(?socket, "Starting IPC server");
    let (ipc_server, mut request_rx) =
        IpcServer::bind(&socket).await.context("Failed to start IPC server")?;

    // Forward every notification to IPC clients
    let event_tx = ipc_server.event_sender();
    router.subscribe_all(move |notification| {
        let _ = event_tx.send(Event::from_notification(notification));
    });

    // Spawn IPC server task
    let ipc_handle = tokio::spawn(async move {
        ipc_server.run().await;
    });

    // Set up signal handling
    let mut shutdown_rx = signals::setup_signal_handlers()?;

    info!("Daemon running. Press Ctrl+C to exit.");

    let mut connection_lost = false;

    // Main event loop
    loop {
        tokio::select! {
            // Handle PipeWire graph events
            Some(event) = graph_event_rx.recv() => {
                match event {
                    GraphEvent::Wire(event) => router.handle(event),
                    GraphEvent::Connected => debug!("PipeWire connected"),
                    GraphEvent::Disconnected => {
                        warn!("PipeWire disconnected");
                        connection_lost = true;
                        break;
                    }
                }
            }

            // Handle IPC requests
            Some((client_id, request, response_tx)) = request_rx.recv() => {
                debug!(client_id, request_id = request.id, method = ?request.method, "Handling request");
                let shutdown = matches!(request.method, Method::Shutdown);

                let result = server::handle_request(&request.method, &router);
                if response_tx.send(Response { id: request.id, result }).await.is_err() {
                    debug!(client_id, "Client went away before the response");
                }

                if shutdown {
                    break;
                }
            }

            // Handle shutdown signal
            Some(signal) = shutdown_rx.recv() => {
                info!(?signal, "Shutdown signal received");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    router.teardown();
    pw_runtime.shutdown();
    ipc_handle.abort();
    if let Err(e) = std::fs::remove_file(&socket) {
        debug!(error = %e, "Socket file already gone");
    }

    if connection_lost {
        return Err(anyhow::anyhow!("Lost connection to PipeWire"));
    }

    info!("Tonewire daemon stopped");
    Ok(())
}
