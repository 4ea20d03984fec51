use std::collections::{BTreeMap, VecDeque};

use crate::accessor::{AccessorTable, InstallOutcome, ValueGuard};
use crate::dom::{
    ControlKind, Document, EventKind, ListenerId, MutationRecord, NodeId, ObserveOptions, ObserverId, Phase,
    Selector,
};
use crate::engine::Message;
use crate::error::{AccessorError, DomError};

/// Declarative description of a subtree to insert.
#[derive(Clone, Debug)]
pub struct Markup {
    tag: String,
    attributes: Vec<(String, String)>,
    value: Option<String>,
    children: Vec<MarkupChild>,
}

#[derive(Clone, Debug)]
enum MarkupChild {
    Element(Markup),
    Text(String),
}

impl Markup {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Initial control value, as rendered by the host.
    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.children.push(MarkupChild::Text(text.to_string()));
        self
    }

    pub fn child(mut self, child: Markup) -> Self {
        self.children.push(MarkupChild::Element(child));
        self
    }
}

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        value: Option<String>,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Clone, Copy, Debug)]
struct ListenerEntry {
    target: NodeId,
    kind: EventKind,
    phase: Phase,
}

#[derive(Clone, Debug)]
struct ObserverEntry {
    target: NodeId,
    options: ObserveOptions,
}

/// Arena-backed document.
pub struct MemoryDom {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    root: NodeId,
    accessors: AccessorTable,
    listeners: BTreeMap<ListenerId, ListenerEntry>,
    next_listener: u32,
    observers: BTreeMap<ObserverId, ObserverEntry>,
    next_observer: u32,
    pending_records: BTreeMap<ObserverId, Vec<MutationRecord>>,
    listener_calls: VecDeque<ListenerId>,
    event_log: Vec<(NodeId, EventKind)>,
    hidden: bool,
}

impl MemoryDom {
    /// An empty document with a root `html` element.
    pub fn new() -> Self {
        let mut dom = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            accessors: AccessorTable::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            observers: BTreeMap::new(),
            next_observer: 0,
            pending_records: BTreeMap::new(),
            listener_calls: VecDeque::new(),
            event_log: Vec::new(),
            hidden: false,
        };
        dom.root = dom.alloc(NodeData::Element {
            tag: "html".to_string(),
            attributes: BTreeMap::new(),
            value: None,
        });
        dom
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            parent: None,
            children: Vec::new(),
            data,
        };
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.node = Some(node);
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId::new(index, 0)
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn build(&mut self, markup: &Markup) -> NodeId {
        let id = self.alloc(NodeData::Element {
            tag: markup.tag.clone(),
            attributes: markup.attributes.iter().cloned().collect(),
            value: markup.value.clone(),
        });
        for child in &markup.children {
            let child_id = match child {
                MarkupChild::Element(markup) => self.build(markup),
                MarkupChild::Text(text) => self.alloc(NodeData::Text(text.clone())),
            };
            self.link(id, child_id);
        }
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    fn unlink(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.node_mut(child)?.parent.take()?;
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&c| c != child);
        }
        Some(parent)
    }

    /// Build `markup` and append it to `parent` as one mutation.
    /// A stale parent leaves the new subtree detached.
    pub fn insert(&mut self, parent: NodeId, markup: &Markup) -> NodeId {
        let id = self.build(markup);
        self.append_child(parent, id);
        id
    }

    /// Append a detached text node.
    pub fn insert_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeData::Text(text.to_string()));
        self.append_child(parent, id);
        id
    }

    /// Move `child` under `parent`; `false` if either handle is stale.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return false;
        }
        if let Some(old_parent) = self.unlink(child) {
            self.record(MutationRecord::child_list(old_parent, [], [child]));
        }
        self.link(parent, child);
        self.record(MutationRecord::child_list(parent, [child], []));
        true
    }

    /// Detach `node` from its parent. The node stays allocated.
    pub fn remove(&mut self, node: NodeId) -> bool {
        match self.unlink(node) {
            Some(parent) => {
                self.record(MutationRecord::child_list(parent, [], [node]));
                true
            }
            None => false,
        }
    }

    /// Detach and free `node` with its subtree; old handles become stale.
    pub fn destroy(&mut self, node: NodeId) {
        self.remove(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.index as usize) else {
                continue;
            };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(freed) = slot.node.take() {
                stack.extend(freed.children);
                self.free_list.push(id.index);
            }
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match self.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { attributes, .. }) => {
                attributes.insert(name.to_string(), value.to_string());
            }
            Some(NodeData::Text(_)) => return Err(DomError::NotAnElement(node)),
            None => return Err(DomError::Stale(node)),
        }
        self.record(MutationRecord::attribute(node, name));
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let removed = match self.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { attributes, .. }) => attributes.remove(name).is_some(),
            Some(NodeData::Text(_)) => return Err(DomError::NotAnElement(node)),
            None => return Err(DomError::Stale(node)),
        };
        if removed {
            self.record(MutationRecord::attribute(node, name));
        }
        Ok(())
    }

    /// Script assignment to `node.value`, routed through the active accessor.
    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        let kind = self.control_kind(node).ok_or(DomError::NotAControl(node))?;
        let stored = self.accessors.write(kind, value);
        self.store_value(node, stored)
    }

    fn store_value(&mut self, node: NodeId, stored: String) -> Result<(), DomError> {
        match self.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { value, .. }) => {
                *value = Some(stored);
                Ok(())
            }
            Some(NodeData::Text(_)) => Err(DomError::NotAnElement(node)),
            None => Err(DomError::Stale(node)),
        }
    }

    /// Current value of a control as scripts would read it.
    pub fn value(&self, node: NodeId) -> Option<String> {
        self.read_value(node)
    }

    /// Replace the data of a text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match self.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Text(data)) => *data = text.to_string(),
            Some(NodeData::Element { .. }) => return Err(DomError::NotAnElement(node)),
            None => return Err(DomError::Stale(node)),
        }
        self.record(MutationRecord::character_data(node));
        Ok(())
    }

    /// Flip visibility and notify listeners on the document.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
        let root = self.root;
        // The root is never freed.
        let _ = self.dispatch(root, EventKind::VisibilityChange);
    }

    pub fn accessors_mut(&mut self) -> &mut AccessorTable {
        &mut self.accessors
    }

    /// Every event dispatched so far, in order.
    pub fn events(&self) -> &[(NodeId, EventKind)] {
        &self.event_log
    }

    pub fn dispatch_count(&self, node: NodeId, kind: EventKind) -> usize {
        self.event_log
            .iter()
            .filter(|&&(target, event)| target == node && event == kind)
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners_on(&self, node: NodeId) -> usize {
        self.listeners.values().filter(|entry| entry.target == node).count()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Listener invocations queued since the last call, as engine messages.
    pub fn take_listener_calls(&mut self) -> Vec<Message> {
        self.listener_calls
            .drain(..)
            .map(|listener| Message::Event { listener })
            .collect()
    }

    /// Pending mutation batches, one message per observer.
    pub fn take_mutation_batches(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.pending_records)
            .into_iter()
            .filter(|(observer, records)| !records.is_empty() && self.observers.contains_key(observer))
            .map(|(observer, records)| Message::Mutations { observer, records })
            .collect()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.listener_calls.is_empty() || self.pending_records.values().any(|records| !records.is_empty())
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.node(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn record(&mut self, record: MutationRecord) {
        let interested: Vec<ObserverId> = self
            .observers
            .iter()
            .filter(|(_, entry)| entry.options.accepts(&record.kind))
            .filter(|(_, entry)| {
                entry.target == record.target
                    || (entry.options.subtree && self.is_inclusive_ancestor(entry.target, record.target))
            })
            .map(|(&id, _)| id)
            .collect();
        for observer in interested {
            self.pending_records.entry(observer).or_default().push(record.clone());
        }
    }

    /// Path from the root down to `node`, inclusive.
    fn event_path(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(parent) = self.node(current).and_then(|n| n.parent) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    fn queue_listeners(&mut self, target: NodeId, kind: EventKind, phase: Option<Phase>) {
        let matching: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, entry)| entry.target == target && entry.kind == kind)
            .filter(|(_, entry)| phase.is_none_or(|phase| entry.phase == phase))
            .map(|(&id, _)| id)
            .collect();
        self.listener_calls.extend(matching);
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { .. } => {
                for &child in &n.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    fn collect_matches(&self, node: NodeId, selector: Selector, out: &mut Vec<NodeId>) {
        let Some(n) = self.node(node) else {
            return;
        };
        for &child in &n.children {
            if self.matches(child, selector) {
                out.push(child);
            }
            self.collect_matches(child, selector, out);
        }
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDom {
    fn root(&self) -> NodeId {
        self.root
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.node(node).is_some() && self.is_inclusive_ancestor(self.root, node)
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.node(node).map(|n| &n.data), Some(NodeData::Element { .. }))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.node(node)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.node(node)?.data {
            NodeData::Element { attributes, .. } => attributes.get(name).cloned(),
            NodeData::Text(_) => None,
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn query_all(&self, scope: NodeId, selector: Selector) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_matches(scope, selector, &mut out);
        out
    }

    fn control_kind(&self, node: NodeId) -> Option<ControlKind> {
        self.tag_name(node).and_then(|tag| ControlKind::from_tag(&tag))
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        self.attribute(node, "contenteditable").as_deref() == Some("true")
    }

    fn read_value(&self, node: NodeId) -> Option<String> {
        let kind = self.control_kind(node)?;
        match &self.node(node)?.data {
            NodeData::Element { value, .. } => {
                Some(self.accessors.read(kind, value.as_deref().unwrap_or_default()))
            }
            NodeData::Text(_) => None,
        }
    }

    fn write_value_native(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        if self.node(node).is_none() {
            return Err(DomError::Stale(node));
        }
        let kind = self.control_kind(node).ok_or(DomError::NotAControl(node))?;
        let stored = self.accessors.write_native(kind, value);
        self.store_value(node, stored)
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        let removed: Vec<NodeId> = match self.node_mut(node) {
            Some(Node {
                data: NodeData::Element { .. },
                children,
                ..
            }) => std::mem::take(children),
            Some(_) => return Err(DomError::NotAnElement(node)),
            None => return Err(DomError::Stale(node)),
        };
        for &child in &removed {
            if let Some(n) = self.node_mut(child) {
                n.parent = None;
            }
        }
        let added = if text.is_empty() {
            None
        } else {
            let text_node = self.alloc(NodeData::Text(text.to_string()));
            self.link(node, text_node);
            Some(text_node)
        };
        self.record(MutationRecord::child_list(node, added, removed));
        Ok(())
    }

    fn click(&mut self, node: NodeId) -> Result<(), DomError> {
        self.dispatch(node, EventKind::Click)?;
        let toggles = self.attribute(node, "role").as_deref() == Some("checkbox")
            && self.attribute(node, "aria-disabled").as_deref() != Some("true");
        if toggles {
            let checked = self.attribute(node, "aria-checked").as_deref() == Some("true");
            self.set_attribute(node, "aria-checked", if checked { "false" } else { "true" })?;
        }
        Ok(())
    }

    fn dispatch(&mut self, node: NodeId, kind: EventKind) -> Result<(), DomError> {
        if self.node(node).is_none() {
            return Err(DomError::Stale(node));
        }
        self.event_log.push((node, kind));

        let path = self.event_path(node);
        let (target, ancestors) = match path.split_last() {
            Some((target, ancestors)) => (*target, ancestors.to_vec()),
            None => return Ok(()),
        };
        for &ancestor in &ancestors {
            self.queue_listeners(ancestor, kind, Some(Phase::Capture));
        }
        self.queue_listeners(target, kind, None);
        if kind.bubbles() {
            for &ancestor in ancestors.iter().rev() {
                self.queue_listeners(ancestor, kind, Some(Phase::Bubble));
            }
        }
        Ok(())
    }

    fn add_listener(&mut self, target: NodeId, kind: EventKind, phase: Phase) -> Result<ListenerId, DomError> {
        if self.node(target).is_none() {
            return Err(DomError::Stale(target));
        }
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.insert(id, ListenerEntry { target, kind, phase });
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
        self.listener_calls.retain(|&queued| queued != id);
    }

    fn observe(&mut self, target: NodeId, options: &ObserveOptions) -> Result<ObserverId, DomError> {
        if self.node(target).is_none() {
            return Err(DomError::Stale(target));
        }
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.insert(
            id,
            ObserverEntry {
                target,
                options: options.clone(),
            },
        );
        Ok(id)
    }

    fn disconnect(&mut self, id: ObserverId) {
        self.observers.remove(&id);
        self.pending_records.remove(&id);
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn intercept_value_writes(
        &mut self,
        kind: ControlKind,
        guard: ValueGuard,
    ) -> Result<InstallOutcome, AccessorError> {
        self.accessors.install(kind, guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CleanerContext;

    #[test]
    fn stale_handles_do_not_alias() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let first = dom.insert(root, &Markup::new("div"));
        dom.destroy(first);
        let second = dom.insert(root, &Markup::new("span"));

        assert_eq!(first.index, second.index);
        assert_ne!(first, second);
        assert!(!dom.is_connected(first));
        assert_eq!(dom.tag_name(first), None);
        assert_eq!(dom.tag_name(second).as_deref(), Some("span"));
    }

    #[test]
    fn observers_get_batched_records_for_their_subtree() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let dialog = dom.insert(root, &Markup::new("div").attr("role", "dialog"));
        let outside = dom.insert(root, &Markup::new("div"));

        let observer = dom.observe(dialog, &ObserveOptions::dialog()).unwrap();
        dom.insert(dialog, &Markup::new("span").text("Squash commit"));
        dom.insert(outside, &Markup::new("span"));
        dom.set_attribute(dialog, "aria-busy", "true").unwrap();

        let batches = dom.take_mutation_batches();
        assert_eq!(batches.len(), 1);
        match &batches[0] {
            Message::Mutations { observer: id, records } => {
                assert_eq!(*id, observer);
                assert_eq!(records.len(), 2);
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert!(dom.take_mutation_batches().is_empty());
    }

    #[test]
    fn events_propagate_capture_target_bubble() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let dialog = dom.insert(root, &Markup::new("div").child(Markup::new("textarea")));
        let field = dom.query_all(dialog, Selector::TextSurface)[0];

        let bubble = dom.add_listener(root, EventKind::Change, Phase::Bubble).unwrap();
        let capture = dom.add_listener(dialog, EventKind::Change, Phase::Capture).unwrap();
        let at_target = dom.add_listener(field, EventKind::Change, Phase::Bubble).unwrap();
        dom.add_listener(dialog, EventKind::Input, Phase::Capture).unwrap();

        dom.dispatch(field, EventKind::Change).unwrap();
        assert_eq!(
            dom.take_listener_calls(),
            vec![
                Message::Event { listener: capture },
                Message::Event { listener: at_target },
                Message::Event { listener: bubble },
            ]
        );
    }

    #[test]
    fn checkbox_click_toggles_unless_disabled() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let enabled = dom.insert(root, &Markup::new("div").attr("role", "checkbox").attr("aria-checked", "false"));
        let disabled = dom.insert(
            root,
            &Markup::new("div")
                .attr("role", "checkbox")
                .attr("aria-checked", "false")
                .attr("aria-disabled", "true"),
        );
        dom.click(enabled).unwrap();
        dom.click(disabled).unwrap();
        assert_eq!(dom.attribute(enabled, "aria-checked").as_deref(), Some("true"));
        assert_eq!(dom.attribute(disabled, "aria-checked").as_deref(), Some("false"));
    }

    #[test]
    fn script_writes_go_through_guard_native_writes_do_not() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let field = dom.insert(root, &Markup::new("textarea"));
        let guard = ValueGuard::new(&CleanerContext::default());
        dom.intercept_value_writes(ControlKind::TextArea, guard).unwrap();

        dom.set_value(field, "Merged PR 5: Guarded").unwrap();
        assert_eq!(dom.value(field).as_deref(), Some("Guarded"));
        dom.write_value_native(field, "Merged PR 5: Raw").unwrap();
        assert_eq!(dom.value(field).as_deref(), Some("Merged PR 5: Raw"));
    }

    #[test]
    fn set_text_content_replaces_children_in_one_record() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let editor = dom.insert(
            root,
            &Markup::new("div")
                .attr("contenteditable", "true")
                .text("Merged PR 1: ")
                .child(Markup::new("b").text("bold")),
        );
        let observer = dom.observe(editor, &ObserveOptions::structure()).unwrap();
        dom.set_text_content(editor, "bold").unwrap();

        assert_eq!(dom.text_content(editor), "bold");
        let batches = dom.take_mutation_batches();
        let Message::Mutations { observer: id, records } = &batches[0] else {
            panic!("expected a mutation batch");
        };
        assert_eq!(*id, observer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].removed().len(), 2);
        assert_eq!(records[0].added().len(), 1);
    }
}
