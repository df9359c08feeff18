//! Attachment graph between dynamic components
//!
//! Each attached component records the masters it is attached to. The graph
//! only answers queries; resolving attachment chains into motion is the
//! dynamics system's job.

use crate::body::{CollidableBody, ComponentId};
use crate::contact::types::ContactMaster;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of topology versions, shared by every graph in the process
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Component → attachment masters, with a topology version
///
/// Versions are unique across all graphs, so two graphs only share a version
/// when one is an unmodified clone of the other.
#[derive(Debug, Clone)]
pub struct AttachmentGraph {
    masters: HashMap<ComponentId, Vec<ComponentId>>,
    version: u64,
}

impl Default for AttachmentGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentGraph {
    pub fn new() -> Self {
        Self {
            masters: HashMap::new(),
            version: next_version(),
        }
    }

    /// Attach `component` to `masters`, replacing any previous attachment
    pub fn attach(&mut self, component: ComponentId, masters: Vec<ComponentId>) {
        self.masters.insert(component, masters);
        self.version = next_version();
    }

    /// Remove the attachment of `component`; returns true if one existed
    pub fn detach(&mut self, component: ComponentId) -> bool {
        let removed = self.masters.remove(&component).is_some();
        if removed {
            self.version = next_version();
        }
        removed
    }

    /// Masters of `component`, or None if it is not attached
    pub fn masters_of(&self, component: ComponentId) -> Option<&[ComponentId]> {
        self.masters.get(&component).map(|m| m.as_slice())
    }

    /// Changes on every topology change
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.masters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masters.is_empty()
    }

    /// True if every attachment master of `component` acts on `other`
    ///
    /// Masters belonging to `own` are ignored. A component with no attachment
    /// is never completely attached.
    pub fn is_completely_attached(
        &self,
        component: ComponentId,
        own: &dyn CollidableBody,
        other: &dyn CollidableBody,
    ) -> bool {
        let Some(masters) = self.masters_of(component) else {
            return false;
        };
        masters
            .iter()
            .filter(|&&m| !own.contains_contact_master(m))
            .all(|&m| other.contains_contact_master(m))
    }

    /// True if the motion of `vertex` of `own` is already determined by `other`
    ///
    /// Every master of the vertex must either be completely attached to
    /// `other` or be one of `other`'s own masters.
    pub fn vertex_attached_to(
        &self,
        vertex: usize,
        own: &dyn CollidableBody,
        other: &dyn CollidableBody,
    ) -> bool {
        let mut masters: Vec<ContactMaster> = Vec::new();
        own.vertex_masters(vertex, &mut masters);
        masters.iter().all(|m| {
            self.is_completely_attached(m.component, own, other)
                || other.contains_contact_master(m.component)
        })
    }
}
