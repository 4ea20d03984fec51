//! Membership of initialized dialog roots.
//!
//! Keyed by the platform's generational node handle, so a freed and reused
//! slot can never be mistaken for an already initialized dialog. Entries are
//! reclaimed explicitly once the root is seen detached.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use smallvec::SmallVec;
use ulid::Ulid;

use crate::dom::{Document, ListenerId, NodeId, ObserverId};
use crate::scheduler::TimerToken;
use crate::state::DialogState;

/// Diagnostic identity of a dialog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct DialogId(Ulid);

impl DialogId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for DialogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DialogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dialog-{}", self.0)
    }
}

/// Everything attached to one dialog root.
#[derive(Debug)]
pub struct DialogEntry {
    pub id: DialogId,
    pub state: DialogState,
    pub observers: SmallVec<[ObserverId; 4]>,
    pub listeners: SmallVec<[ListenerId; 2]>,
    pub watched_fields: HashSet<NodeId>,
    pub poll: Option<TimerToken>,
}

impl DialogEntry {
    fn new() -> Self {
        Self {
            id: DialogId::new(),
            state: DialogState::default(),
            observers: SmallVec::new(),
            listeners: SmallVec::new(),
            watched_fields: HashSet::new(),
            poll: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct DialogRegistry {
    entries: HashMap<NodeId, DialogEntry>,
}

impl DialogRegistry {
    pub fn contains(&self, root: NodeId) -> bool {
        self.entries.contains_key(&root)
    }

    /// Register `root`; `None` if it already was.
    pub fn register(&mut self, root: NodeId) -> Option<&mut DialogEntry> {
        match self.entries.entry(root) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(slot.insert(DialogEntry::new())),
        }
    }

    pub fn get(&self, root: NodeId) -> Option<&DialogEntry> {
        self.entries.get(&root)
    }

    pub fn get_mut(&mut self, root: NodeId) -> Option<&mut DialogEntry> {
        self.entries.get_mut(&root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered roots in stable order.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self.entries.keys().copied().collect();
        roots.sort();
        roots
    }

    /// Remove every entry whose root is no longer connected and hand the
    /// entries back so their subscriptions can be released.
    pub fn prune_detached<D: Document>(&mut self, dom: &D) -> Vec<(NodeId, DialogEntry)> {
        let detached: Vec<NodeId> = self
            .roots()
            .into_iter()
            .filter(|&root| !dom.is_connected(root))
            .collect();
        detached
            .into_iter()
            .filter_map(|root| self.entries.remove(&root).map(|entry| (root, entry)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{Markup, MemoryDom};

    #[test]
    fn register_is_once_per_root() {
        let mut registry = DialogRegistry::default();
        let root = NodeId::new(3, 0);
        assert!(registry.register(root).is_some());
        assert!(registry.register(root).is_none());
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(NodeId::new(3, 1)));
    }

    #[test]
    fn prune_releases_only_detached_roots() {
        let mut dom = MemoryDom::new();
        let body = dom.root();
        let kept = dom.insert(body, &Markup::new("div").attr("role", "dialog"));
        let gone = dom.insert(body, &Markup::new("div").attr("role", "dialog"));

        let mut registry = DialogRegistry::default();
        registry.register(kept);
        registry.register(gone);

        dom.remove(gone);
        let pruned = registry.prune_detached(&dom);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].0, gone);
        assert!(registry.contains(kept));
        assert!(!registry.contains(gone));
    }
}
