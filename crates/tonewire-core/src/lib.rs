//! Tonewire Core - Observable audio endpoints over a routing daemon.
//!
//! This crate keeps a cached, observable view of the audio endpoints a
//! routing daemon exposes (sinks, sources, and streams) and tracks which of
//! them is the default per media class. It talks to the daemon only through
//! the [`MixerFacade`] and [`DefaultsFacade`] traits, so the backend crate
//! decides how events are produced and how requests are carried out.

pub mod device;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod facade;
pub mod media;
pub mod node;
pub mod notify;
pub mod registry;
pub mod router;

#[cfg(test)]
mod testing;

pub use device::Device;
pub use endpoint::{Endpoint, EndpointSnapshot, EndpointState};
pub use error::{Error, Result};
pub use event::WireEvent;
pub use facade::{DefaultsFacade, MixerFacade, VolumeState, VolumeUpdate, WireContext};
pub use media::{DeviceType, MediaClass};
pub use node::{DeviceInfo, NodeInfo};
pub use notify::{EndpointKey, EventKind, Notification, Property, SubscriptionId, Subscribers};
pub use registry::{EndpointList, EndpointRegistry};
pub use router::ChangeRouter;
