use std::cell::RefCell;
use std::collections::HashMap;

use js_sys::{Array, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, EventTarget, HtmlElement, HtmlInputElement, HtmlTextAreaElement, Node};

use super::intercept;
use super::{Inbound, enqueue};
use crate::accessor::{InstallOutcome, ValueGuard};
use crate::dom::{
    ControlKind, Document, EventKind, ListenerId, MutationRecord, NodeId, ObserveOptions, ObserverId, Phase,
    Selector,
};
use crate::error::{AccessorError, DomError};

/// Expando holding a node's slot index.
const NODE_KEY: &str = "__commitCleanerNode";

/// Live handles before the first sweep of disconnected nodes.
const INITIAL_SWEEP_AT: usize = 4096;

fn host_error(err: JsValue) -> DomError {
    DomError::Host(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

#[derive(Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Generational table mapping JS nodes to stable handles.
struct NodeTable {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
    sweep_at: usize,
}

impl NodeTable {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            sweep_at: INITIAL_SWEEP_AT,
        }
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn id_of(&mut self, node: &Node) -> NodeId {
        let key = JsValue::from_str(NODE_KEY);
        if let Some(index) = Reflect::get(node, &key).ok().and_then(|value| value.as_f64()) {
            let index = index as u32;
            if let Some(slot) = self.slots.get(index as usize) {
                if slot.node.as_ref().is_some_and(|known| known.is_same_node(Some(node))) {
                    return NodeId::new(index, slot.generation);
                }
            }
        }
        if self.live >= self.sweep_at {
            self.sweep();
        }
        let id = self.alloc(node.clone());
        // Frozen or exotic nodes reject expandos; they just get a fresh slot next time.
        let _ = Reflect::set(node, &key, &JsValue::from_f64(f64::from(id.index)));
        id
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
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

    /// Forget nodes that left the document.
    fn sweep(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.as_ref().is_some_and(|node| !node.is_connected()) {
                slot.node = None;
                self.free_list.push(index as u32);
                self.live -= 1;
            }
        }
        self.sweep_at = (self.live * 2).max(INITIAL_SWEEP_AT);
    }
}

struct ListenerHandle {
    target: EventTarget,
    event: &'static str,
    capture: bool,
    callback: Closure<dyn FnMut()>,
}

struct ObserverHandle {
    observer: web_sys::MutationObserver,
    _callback: Closure<dyn FnMut(Array, web_sys::MutationObserver)>,
}

/// `Document` over the live page.
pub struct WebDocument {
    document: web_sys::Document,
    root: NodeId,
    nodes: RefCell<NodeTable>,
    listeners: HashMap<ListenerId, ListenerHandle>,
    next_listener: u32,
    observers: HashMap<ObserverId, ObserverHandle>,
    next_observer: u32,
}

impl WebDocument {
    /// `None` when the document has no root element yet.
    pub fn new(document: web_sys::Document) -> Option<Self> {
        let root_element = document.document_element()?;
        let mut nodes = NodeTable::new();
        let root = nodes.id_of(root_element.unchecked_ref::<Node>());
        Some(Self {
            document,
            root,
            nodes: RefCell::new(nodes),
            listeners: HashMap::new(),
            next_listener: 0,
            observers: HashMap::new(),
            next_observer: 0,
        })
    }

    fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.borrow().get(id).cloned()
    }

    fn element(&self, id: NodeId) -> Option<Element> {
        self.node(id)?.dyn_into::<Element>().ok()
    }

    fn id_of(&self, node: &Node) -> NodeId {
        self.nodes.borrow_mut().id_of(node)
    }

    fn ids_of(&self, list: &web_sys::NodeList) -> Vec<NodeId> {
        (0..list.length())
            .filter_map(|i| list.item(i))
            .map(|node| self.id_of(&node))
            .collect()
    }

    /// Translate a batch delivered by a `MutationObserver`.
    pub(super) fn convert_records(&self, records: &Array) -> Vec<MutationRecord> {
        records
            .iter()
            .filter_map(|value| value.dyn_into::<web_sys::MutationRecord>().ok())
            .filter_map(|record| {
                let target = self.id_of(&record.target()?);
                match record.type_().as_str() {
                    "childList" => Some(MutationRecord::child_list(
                        target,
                        self.ids_of(&record.added_nodes()),
                        self.ids_of(&record.removed_nodes()),
                    )),
                    "characterData" => Some(MutationRecord::character_data(target)),
                    "attributes" => Some(MutationRecord::attribute(
                        target,
                        record.attribute_name().unwrap_or_default(),
                    )),
                    _ => None,
                }
            })
            .collect()
    }

    fn event_target(&self, target: NodeId, kind: EventKind) -> Result<EventTarget, DomError> {
        // Visibility changes fire on the document, not on its root element.
        if kind == EventKind::VisibilityChange {
            return Ok(self.document.clone().unchecked_into());
        }
        self.node(target)
            .map(|node| node.unchecked_into())
            .ok_or(DomError::Stale(target))
    }
}

impl Document for WebDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|node| node.is_connected())
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|node| node.node_type() == Node::ELEMENT_NODE)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        Some(self.element(node)?.local_name())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn text_content(&self, node: NodeId) -> String {
        self.node(node).and_then(|node| node.text_content()).unwrap_or_default()
    }

    fn query_all(&self, scope: NodeId, selector: Selector) -> Vec<NodeId> {
        let Some(element) = self.element(scope) else {
            return Vec::new();
        };
        match element.query_selector_all(selector.css()) {
            Ok(list) => self.ids_of(&list),
            Err(_) => Vec::new(),
        }
    }

    fn matches(&self, node: NodeId, selector: Selector) -> bool {
        self.element(node)
            .is_some_and(|element| element.matches(selector.css()).unwrap_or(false))
    }

    fn control_kind(&self, node: NodeId) -> Option<ControlKind> {
        ControlKind::from_tag(&self.tag_name(node)?)
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        self.node(node)
            .and_then(|node| node.dyn_into::<HtmlElement>().ok())
            .is_some_and(|element| element.is_content_editable())
    }

    fn read_value(&self, node: NodeId) -> Option<String> {
        let node = self.node(node)?;
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            return Some(input.value());
        }
        node.dyn_ref::<HtmlTextAreaElement>().map(|area| area.value())
    }

    fn write_value_native(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        let element = self.node(node).ok_or(DomError::Stale(node))?;
        let kind = self.control_kind(node).ok_or(DomError::NotAControl(node))?;
        if intercept::native_set(kind, &element, value).map_err(host_error)? {
            return Ok(());
        }
        match kind {
            ControlKind::Input => element.unchecked_ref::<HtmlInputElement>().set_value(value),
            ControlKind::TextArea => element.unchecked_ref::<HtmlTextAreaElement>().set_value(value),
        }
        Ok(())
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        let node = self.node(node).ok_or(DomError::Stale(node))?;
        node.set_text_content(Some(text));
        Ok(())
    }

    fn click(&mut self, node: NodeId) -> Result<(), DomError> {
        let element = self
            .node(node)
            .ok_or(DomError::Stale(node))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| DomError::NotAnElement(node))?;
        element.click();
        Ok(())
    }

    fn dispatch(&mut self, node: NodeId, kind: EventKind) -> Result<(), DomError> {
        let target = self.event_target(node, kind)?;
        let init = web_sys::EventInit::new();
        init.set_bubbles(kind.bubbles());
        let event = web_sys::Event::new_with_event_init_dict(kind.as_str(), &init).map_err(host_error)?;
        target.dispatch_event(&event).map_err(host_error)?;
        Ok(())
    }

    fn add_listener(&mut self, target: NodeId, kind: EventKind, phase: Phase) -> Result<ListenerId, DomError> {
        let event_target = self.event_target(target, kind)?;
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        let callback = Closure::<dyn FnMut()>::new(move || enqueue(Inbound::Event(id)));
        let capture = phase == Phase::Capture;
        event_target
            .add_event_listener_with_callback_and_bool(kind.as_str(), callback.as_ref().unchecked_ref(), capture)
            .map_err(host_error)?;
        self.listeners.insert(
            id,
            ListenerHandle {
                target: event_target,
                event: kind.as_str(),
                capture,
                callback,
            },
        );
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        if let Some(handle) = self.listeners.remove(&id) {
            let _ = handle.target.remove_event_listener_with_callback_and_bool(
                handle.event,
                handle.callback.as_ref().unchecked_ref(),
                handle.capture,
            );
        }
    }

    fn observe(&mut self, target: NodeId, options: &ObserveOptions) -> Result<ObserverId, DomError> {
        let node = self.node(target).ok_or(DomError::Stale(target))?;
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);

        let callback = Closure::<dyn FnMut(Array, web_sys::MutationObserver)>::new(
            move |records: Array, _observer: web_sys::MutationObserver| enqueue(Inbound::Mutations(id, records)),
        );
        let observer = web_sys::MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(host_error)?;

        let init = web_sys::MutationObserverInit::new();
        init.set_child_list(options.child_list);
        init.set_subtree(options.subtree);
        init.set_character_data(options.character_data);
        init.set_attributes(options.attributes);
        if let Some(filter) = &options.attribute_filter {
            let names: Array = filter.iter().map(|name| JsValue::from_str(name)).collect();
            Reflect::set(&init, &JsValue::from_str("attributeFilter"), &names).map_err(host_error)?;
        }
        observer.observe_with_options(&node, &init).map_err(host_error)?;

        self.observers.insert(
            id,
            ObserverHandle {
                observer,
                _callback: callback,
            },
        );
        Ok(id)
    }

    fn disconnect(&mut self, id: ObserverId) {
        if let Some(handle) = self.observers.remove(&id) {
            handle.observer.disconnect();
        }
    }

    fn is_hidden(&self) -> bool {
        self.document.hidden()
    }

    fn intercept_value_writes(
        &mut self,
        kind: ControlKind,
        guard: ValueGuard,
    ) -> Result<InstallOutcome, AccessorError> {
        intercept::patch_prototype(kind, guard)
    }
}
