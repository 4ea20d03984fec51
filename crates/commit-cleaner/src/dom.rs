//! The document capability the engine runs against.
//!
//! The host page is foreign: the engine can only query it, observe it, listen
//! to it and make a handful of best-effort edits. [`Document`] is exactly that
//! surface. Platforms hand out [`NodeId`] handles, deliver mutation batches
//! and listener invocations back to the engine as messages, and keep the
//! per-kind value accessors that the guard decorates.

use smallvec::SmallVec;

use crate::accessor::{InstallOutcome, ValueGuard};
use crate::error::{AccessorError, DomError};

/// Generational handle to a node owned by the platform.
/// A stale handle (node freed and slot reused) never aliases the new node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

impl NodeId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}v{}", self.index, self.generation)
    }
}

/// Text control kinds whose `value` accessor can be guarded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ControlKind {
    Input,
    TextArea,
}

impl ControlKind {
    pub const ALL: [ControlKind; 2] = [ControlKind::Input, ControlKind::TextArea];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "input" => Some(ControlKind::Input),
            "textarea" => Some(ControlKind::TextArea),
            _ => None,
        }
    }

    /// Name of the DOM interface owning the accessor.
    pub fn constructor_name(self) -> &'static str {
        match self {
            ControlKind::Input => "HTMLInputElement",
            ControlKind::TextArea => "HTMLTextAreaElement",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventKind {
    Input,
    Change,
    Click,
    VisibilityChange,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Click => "click",
            EventKind::VisibilityChange => "visibilitychange",
        }
    }

    pub fn bubbles(self) -> bool {
        !matches!(self, EventKind::VisibilityChange)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Phase {
    Capture,
    Bubble,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ListenerId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

/// What a mutation observer subscribes to (mirrors `MutationObserverInit`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    pub character_data: bool,
    pub attributes: bool,
    pub attribute_filter: Option<Vec<String>>,
}

impl ObserveOptions {
    /// Structural changes anywhere below the target.
    pub fn structure() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Self::default()
        }
    }

    /// Everything inside a dialog subtree.
    pub fn dialog() -> Self {
        Self {
            child_list: true,
            subtree: true,
            character_data: true,
            attributes: true,
            attribute_filter: None,
        }
    }

    /// Late population of a single text surface.
    pub fn field() -> Self {
        Self {
            child_list: false,
            subtree: true,
            character_data: true,
            attributes: true,
            attribute_filter: Some(vec!["value".to_string()]),
        }
    }

    pub fn accepts_attribute(&self, name: &str) -> bool {
        self.attributes
            && self
                .attribute_filter
                .as_ref()
                .is_none_or(|filter| filter.iter().any(|allowed| allowed == name))
    }

    pub fn accepts(&self, kind: &MutationKind) -> bool {
        match kind {
            MutationKind::ChildList { .. } => self.child_list,
            MutationKind::CharacterData => self.character_data,
            MutationKind::Attributes { name } => self.accepts_attribute(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationKind {
    ChildList {
        added: SmallVec<[NodeId; 4]>,
        removed: SmallVec<[NodeId; 4]>,
    },
    CharacterData,
    Attributes {
        name: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn child_list(
        target: NodeId,
        added: impl IntoIterator<Item = NodeId>,
        removed: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList {
                added: added.into_iter().collect(),
                removed: removed.into_iter().collect(),
            },
        }
    }

    pub fn character_data(target: NodeId) -> Self {
        Self {
            target,
            kind: MutationKind::CharacterData,
        }
    }

    pub fn attribute(target: NodeId, name: impl Into<String>) -> Self {
        Self {
            target,
            kind: MutationKind::Attributes { name: name.into() },
        }
    }

    pub fn added(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { added, .. } => added.as_slice(),
            _ => &[],
        }
    }

    pub fn removed(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { removed, .. } => removed.as_slice(),
            _ => &[],
        }
    }
}

/// The host markup conventions the engine recognizes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Selector {
    /// `[role="dialog"], div.dialog, div[aria-modal="true"]`
    DialogLike,
    /// `input, textarea, div[contenteditable="true"]`
    TextSurface,
    /// `input[aria-roledescription="Dropdown"]`
    StrategyDropdown,
    /// `[role="combobox"], [aria-haspopup="menu"]`
    MenuControl,
    /// `div[role="checkbox"][aria-checked]`
    CustomizeCheckbox,
    /// `button, div[role="button"]`
    ActionButton,
}

impl Selector {
    pub fn css(self) -> &'static str {
        match self {
            Selector::DialogLike => r#"[role="dialog"], div.dialog, div[aria-modal="true"]"#,
            Selector::TextSurface => r#"input, textarea, div[contenteditable="true"]"#,
            Selector::StrategyDropdown => r#"input[aria-roledescription="Dropdown"]"#,
            Selector::MenuControl => r#"[role="combobox"], [aria-haspopup="menu"]"#,
            Selector::CustomizeCheckbox => r#"div[role="checkbox"][aria-checked]"#,
            Selector::ActionButton => r#"button, div[role="button"]"#,
        }
    }

    /// Evaluate the selector against one element given its lowercase tag and
    /// an attribute lookup.
    pub fn matches_element(self, tag: &str, attr: &dyn Fn(&str) -> Option<String>) -> bool {
        let attr_is = |name: &str, expected: &str| attr(name).is_some_and(|value| value == expected);
        match self {
            Selector::DialogLike => {
                attr_is("role", "dialog")
                    || (tag == "div"
                        && (attr_is("aria-modal", "true")
                            || attr("class").is_some_and(|class| {
                                class.split_ascii_whitespace().any(|c| c == "dialog")
                            })))
            }
            Selector::TextSurface => {
                tag == "input" || tag == "textarea" || (tag == "div" && attr_is("contenteditable", "true"))
            }
            Selector::StrategyDropdown => tag == "input" && attr_is("aria-roledescription", "Dropdown"),
            Selector::MenuControl => attr_is("role", "combobox") || attr_is("aria-haspopup", "menu"),
            Selector::CustomizeCheckbox => {
                tag == "div" && attr_is("role", "checkbox") && attr("aria-checked").is_some()
            }
            Selector::ActionButton => tag == "button" || (tag == "div" && attr_is("role", "button")),
        }
    }
}

/// Everything the engine needs from a live document.
pub trait Document {
    /// The document element; the scope of document-wide queries.
    fn root(&self) -> NodeId;

    fn is_connected(&self, node: NodeId) -> bool;

    fn is_element(&self, node: NodeId) -> bool;

    /// Lowercase tag name, `None` for non-elements and stale handles.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Concatenated descendant text (empty for stale handles).
    fn text_content(&self, node: NodeId) -> String;

    /// Descendants of `scope` (excluding `scope`) matching `selector`, in
    /// document order.
    fn query_all(&self, scope: NodeId, selector: Selector) -> Vec<NodeId>;

    fn matches(&self, node: NodeId, selector: Selector) -> bool {
        match self.tag_name(node) {
            Some(tag) => selector.matches_element(&tag, &|name| self.attribute(node, name)),
            None => false,
        }
    }

    fn contains_match(&self, node: NodeId, selector: Selector) -> bool {
        !self.query_all(node, selector).is_empty()
    }

    fn control_kind(&self, node: NodeId) -> Option<ControlKind>;

    fn is_content_editable(&self, node: NodeId) -> bool;

    /// Current value of a text control, read through the active accessor.
    fn read_value(&self, node: NodeId) -> Option<String>;

    /// Write a control's value through the native accessor, bypassing any
    /// installed guard.
    fn write_value_native(&mut self, node: NodeId, value: &str) -> Result<(), DomError>;

    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError>;

    /// Simulated user activation (click plus default action).
    fn click(&mut self, node: NodeId) -> Result<(), DomError>;

    /// Dispatch a synthetic, bubbling event.
    fn dispatch(&mut self, node: NodeId, kind: EventKind) -> Result<(), DomError>;

    fn add_listener(&mut self, target: NodeId, kind: EventKind, phase: Phase) -> Result<ListenerId, DomError>;

    fn remove_listener(&mut self, id: ListenerId);

    fn observe(&mut self, target: NodeId, options: &ObserveOptions) -> Result<ObserverId, DomError>;

    fn disconnect(&mut self, id: ObserverId);

    fn is_hidden(&self) -> bool;

    /// Decorate the native value accessor of `kind` with `guard`.
    /// Re-installing on an already guarded kind is a no-op.
    fn intercept_value_writes(
        &mut self,
        kind: ControlKind,
        guard: ValueGuard,
    ) -> Result<InstallOutcome, AccessorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn check(selector: Selector, tag: &str, attrs: &[(&str, &str)]) -> bool {
        let attrs: HashMap<String, String> =
            attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        selector.matches_element(tag, &|name| attrs.get(name).cloned())
    }

    #[test]
    fn dialog_like_variants() {
        assert!(check(Selector::DialogLike, "section", &[("role", "dialog")]));
        assert!(check(Selector::DialogLike, "div", &[("class", "bolt dialog modal")]));
        assert!(check(Selector::DialogLike, "div", &[("aria-modal", "true")]));
        assert!(!check(Selector::DialogLike, "span", &[("aria-modal", "true")]));
        assert!(!check(Selector::DialogLike, "div", &[("class", "dialogs")]));
    }

    #[test]
    fn text_surfaces() {
        assert!(check(Selector::TextSurface, "textarea", &[]));
        assert!(check(Selector::TextSurface, "input", &[("type", "text")]));
        assert!(check(Selector::TextSurface, "div", &[("contenteditable", "true")]));
        assert!(!check(Selector::TextSurface, "div", &[("contenteditable", "false")]));
    }

    #[test]
    fn checkbox_needs_checked_state() {
        assert!(check(Selector::CustomizeCheckbox, "div", &[("role", "checkbox"), ("aria-checked", "false")]));
        assert!(!check(Selector::CustomizeCheckbox, "div", &[("role", "checkbox")]));
    }

    #[test]
    fn field_options_filter_attributes() {
        let options = ObserveOptions::field();
        assert!(options.accepts_attribute("value"));
        assert!(!options.accepts_attribute("class"));
        assert!(!options.accepts(&MutationKind::ChildList {
            added: SmallVec::new(),
            removed: SmallVec::new(),
        }));
        assert!(ObserveOptions::dialog().accepts_attribute("aria-expanded"));
    }
}
