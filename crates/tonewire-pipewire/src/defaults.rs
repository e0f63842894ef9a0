//! Default-node selection through the `default` metadata object.

use std::sync::Arc;

use tonewire_core::DefaultsFacade;
use tracing::{debug, warn};

use crate::error::PwResult;
use crate::graph::GraphManager;
use crate::metadata;

/// Write access to the `default` metadata object.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataWriter: Send + Sync {
    /// Set a JSON-typed property on subject 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata object is not bound or the write
    /// could not be delivered.
    fn set_property(&self, key: &str, value: &str) -> PwResult<()>;
}

/// Defaults facade backed by the graph cache and the metadata object.
pub struct MetadataDefaults {
    graph: Arc<GraphManager>,
    writer: Arc<dyn MetadataWriter>,
}

impl MetadataDefaults {
    #[must_use]
    pub fn new(graph: Arc<GraphManager>, writer: Arc<dyn MetadataWriter>) -> Self {
        Self { graph, writer }
    }
}

impl DefaultsFacade for MetadataDefaults {
    fn get_default_node(&self, media_class: &str) -> Option<u32> {
        let key = metadata::default_key(media_class)?;
        self.graph.default_node_id(key)
    }

    fn set_default_configured_node_name(&self, media_class: &str, name: &str) -> bool {
        let Some(key) = metadata::configured_key(media_class) else {
            debug!(media_class, "Media class has no configurable default");
            return false;
        };
        match self.writer.set_property(key, &metadata::name_value(name)) {
            Ok(()) => {
                debug!(key, name, "Configured default written");
                true
            }
            Err(e) => {
                warn!(key, name, error = %e, "Failed to write configured default");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use tonewire_core::NodeInfo;

    use super::*;
    use crate::error::PwError;

    fn graph_with_sink() -> Arc<GraphManager> {
        let graph = Arc::new(GraphManager::new());
        graph.add_node(Arc::new(
            NodeInfo::new(40)
                .with_property("node.name", "alsa_output.pci")
                .with_property("media.class", "Audio/Sink"),
        ));
        graph
    }

    #[test]
    fn test_get_default_resolves_name() {
        let graph = graph_with_sink();
        let defaults = MetadataDefaults::new(Arc::clone(&graph), Arc::new(MockMetadataWriter::new()));

        assert_eq!(defaults.get_default_node("Audio/Sink"), None);
        graph.set_default_name(metadata::DEFAULT_AUDIO_SINK, Some("alsa_output.pci".into()));
        assert_eq!(defaults.get_default_node("Audio/Sink"), Some(40));
        assert_eq!(defaults.get_default_node("Audio/Source"), None);
        assert_eq!(defaults.get_default_node("Stream/Output/Audio"), None);
    }

    #[test]
    fn test_set_default_writes_configured_key() {
        let mut writer = MockMetadataWriter::new();
        writer
            .expect_set_property()
            .with(eq(metadata::CONFIGURED_AUDIO_SOURCE), eq(r#"{"name":"alsa_input.usb"}"#))
            .times(1)
            .returning(|_, _| Ok(()));
        let defaults = MetadataDefaults::new(graph_with_sink(), Arc::new(writer));

        assert!(defaults.set_default_configured_node_name("Audio/Source", "alsa_input.usb"));
    }

    #[test]
    fn test_set_default_failure_is_reported() {
        let mut writer = MockMetadataWriter::new();
        writer
            .expect_set_property()
            .returning(|_, _| Err(PwError::MetadataUnavailable("not bound".into())));
        let defaults = MetadataDefaults::new(graph_with_sink(), Arc::new(writer));

        assert!(!defaults.set_default_configured_node_name("Audio/Sink", "alsa_output.pci"));
        assert!(!defaults.set_default_configured_node_name("Stream/Input/Audio", "rec"));
    }
}
