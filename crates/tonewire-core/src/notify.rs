//! Change notifications and subscriber fan-out.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::device::Device;
use crate::endpoint::EndpointSnapshot;
use crate::media::MediaClass;

/// Identifies an endpoint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum EndpointKey {
    /// Concrete record bound to the node with this id
    Node(u32),
    /// Aggregate record tracking the default node of a class
    Default(MediaClass),
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Default(class) => write!(f, "default {class}"),
        }
    }
}

/// Observable properties of an endpoint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Property {
    Id,
    Volume,
    Mute,
    Description,
    MediaClass,
    IsDefault,
}

/// A notification fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum Notification {
    /// A concrete endpoint was created
    EndpointAdded(EndpointSnapshot),
    /// A concrete endpoint was removed
    EndpointRemoved(EndpointSnapshot),
    /// An audio device appeared
    DeviceAdded(Device),
    /// An audio device disappeared
    DeviceRemoved(Device),
    /// A single property of an endpoint changed value
    PropertyChanged { endpoint: EndpointKey, property: Property },
    /// An endpoint finished an update; carries the state after it
    Changed(EndpointSnapshot),
    /// The aggregate default endpoint of a class now points somewhere else
    DefaultChanged { media_class: MediaClass, id: Option<u32> },
}

impl Notification {
    /// Category used for subscription matching.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::EndpointAdded(endpoint) => EventKind::added(endpoint.media_class),
            Self::EndpointRemoved(endpoint) => EventKind::removed(endpoint.media_class),
            Self::DeviceAdded(_) => EventKind::DeviceAdded,
            Self::DeviceRemoved(_) => EventKind::DeviceRemoved,
            Self::PropertyChanged { .. } => EventKind::PropertyChanged,
            Self::Changed(_) => EventKind::Changed,
            Self::DefaultChanged { .. } => EventKind::DefaultChanged,
        }
    }
}

/// Notification categories a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    MicrophoneAdded,
    MicrophoneRemoved,
    SpeakerAdded,
    SpeakerRemoved,
    RecorderAdded,
    RecorderRemoved,
    StreamAdded,
    StreamRemoved,
    DeviceAdded,
    DeviceRemoved,
    Changed,
    PropertyChanged,
    DefaultChanged,
}

impl EventKind {
    /// Every category, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::MicrophoneAdded,
        Self::MicrophoneRemoved,
        Self::SpeakerAdded,
        Self::SpeakerRemoved,
        Self::RecorderAdded,
        Self::RecorderRemoved,
        Self::StreamAdded,
        Self::StreamRemoved,
        Self::DeviceAdded,
        Self::DeviceRemoved,
        Self::Changed,
        Self::PropertyChanged,
        Self::DefaultChanged,
    ];

    /// The "added" category for a media class.
    #[must_use]
    pub fn added(class: MediaClass) -> Self {
        match class {
            MediaClass::Microphone => Self::MicrophoneAdded,
            MediaClass::Speaker => Self::SpeakerAdded,
            MediaClass::Recorder => Self::RecorderAdded,
            MediaClass::Stream => Self::StreamAdded,
        }
    }

    /// The "removed" category for a media class.
    #[must_use]
    pub fn removed(class: MediaClass) -> Self {
        match class {
            MediaClass::Microphone => Self::MicrophoneRemoved,
            MediaClass::Speaker => Self::SpeakerRemoved,
            MediaClass::Recorder => Self::RecorderRemoved,
            MediaClass::Stream => Self::StreamRemoved,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&Notification) + Send>;

struct Subscription {
    id: SubscriptionId,
    /// `None` matches every notification
    kind: Option<EventKind>,
    handler: Handler,
}

/// Registered notification handlers.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    entries: Vec<Subscription>,
}

impl Subscribers {
    /// Create an empty subscriber list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one category.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.insert(Some(kind), Box::new(handler))
    }

    /// Register a handler for every notification.
    pub fn subscribe_all<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.insert(None, Box::new(handler))
    }

    fn insert(&mut self, kind: Option<EventKind>, handler: Handler) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push(Subscription { id, kind, handler });
        id
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s.id != id);
        self.entries.len() != before
    }

    /// Deliver a notification to every matching handler, in subscription order.
    pub fn dispatch(&mut self, notification: &Notification) {
        let kind = notification.kind();
        trace!(?kind, "Dispatching notification");
        for entry in &mut self.entries {
            if entry.kind.is_none_or(|k| k == kind) {
                (entry.handler)(notification);
            }
        }
    }

    /// Drop every handler.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers").field("count", &self.entries.len()).finish()
    }
}
