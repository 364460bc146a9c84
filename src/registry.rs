use std::collections::HashMap;
use tracing::debug;

use crate::dom::{Element, NodeId, WeakElement};

/// Viewer containers already handed to a poll task.
///
/// Entries are held weakly; containers removed from the page and dropped
/// are pruned on the next registration.
#[derive(Default)]
pub struct ViewerRegistry {
    viewers: HashMap<NodeId, WeakElement>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, container: &Element) -> bool {
        self.viewers
            .get(&container.id())
            .is_some_and(|weak| weak.upgrade().as_ref() == Some(container))
    }

    /// Record a container. Returns `true` the first time it is seen.
    pub fn register(&mut self, container: &Element) -> bool {
        self.prune();
        if self.contains(container) {
            return false;
        }
        self.viewers.insert(container.id(), container.downgrade());
        debug!(container = %container.id(), tracked = self.viewers.len(), "Registered viewer");
        true
    }

    fn prune(&mut self) {
        self.viewers.retain(|_, weak| weak.is_alive());
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}
