//! Signal handling for graceful shutdown.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

/// A signal that asks the daemon to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Terminate,
    Interrupt,
}

/// Set up signal handlers for graceful shutdown.
///
/// The returned receiver yields the first SIGTERM or SIGINT received.
pub fn setup_signal_handlers() -> Result<mpsc::Receiver<ShutdownSignal>> {
    let (tx, rx) = mpsc::channel(1);

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let tx_term = tx.clone();
    tokio::spawn(async move {
        if terminate.recv().await.is_some() {
            let _ = tx_term.send(ShutdownSignal::Terminate).await;
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(ShutdownSignal::Interrupt).await;
        }
    });

    Ok(rx)
}
