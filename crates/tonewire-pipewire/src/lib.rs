//! Tonewire PipeWire - the PipeWire/WirePlumber backend.
//!
//! This crate handles all interactions with PipeWire, including:
//! - Connecting to the PipeWire daemon on a dedicated thread
//! - Turning registry globals into endpoint events
//! - Watching node parameters and the `default` metadata object
//! - Implementing the mixer and defaults facades

pub mod defaults;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod mixer;
pub mod runtime;

pub use defaults::{MetadataDefaults, MetadataWriter};
pub use error::{PwError, PwResult};
pub use graph::GraphManager;
pub use mixer::WpctlMixer;
pub use runtime::{GraphEvent, PipeWireRuntime};
