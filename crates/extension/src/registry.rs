use std::{collections::HashSet, sync::Arc};

use tracing::warn;

use crate::{Extension, broadcast::Broadcaster};

/// Immutable set of loaded extensions plus the shared broadcast channel.
///
/// Built once before the gateway starts; extensions registered afterwards
/// are not discoverable. The registry owns the [`Broadcaster`] the host
/// handed to each broadcasting extension, so subscribers attached here see
/// every extension's broadcasts.
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn Extension>>,
    broadcaster: Broadcaster,
}

impl ExtensionRegistry {
    /// Build the registry from host-supplied extension instances.
    ///
    /// Duplicate ids are rejected: the first registration wins and later
    /// ones are dropped with a warning.
    pub fn new(broadcaster: Broadcaster, extensions: Vec<Arc<dyn Extension>>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(extensions.len());
        for extension in extensions {
            if seen.insert(extension.id().to_string()) {
                kept.push(extension);
            } else {
                warn!(id = extension.id(), "duplicate extension id, dropping");
            }
        }
        Self {
            extensions: kept,
            broadcaster,
        }
    }

    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Extension>> {
        self.extensions.iter().find(|e| e.id() == id)
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Fan a message out to every broadcast subscriber.
    pub fn broadcast(&self, data: &[u8]) {
        self.broadcaster.broadcast(data);
    }
}
