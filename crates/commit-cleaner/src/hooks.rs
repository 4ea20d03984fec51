//! Capture-phase listeners and their routing back to dialogs.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{Document, EventKind, ListenerId, NodeId, Phase, Selector};
use crate::error::DomError;

static COMPLETE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcomplete\b").expect("complete pattern is valid"));

/// What a listener invocation means to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    /// A `change` bubbled through a dialog in capture phase.
    StrategyChange { dialog: NodeId },
    /// The dialog's completion button was clicked.
    CompleteClick { dialog: NodeId, button: NodeId },
    /// Page visibility flipped.
    Visibility,
}

#[derive(Debug, Default)]
pub struct EventHooks {
    routes: HashMap<ListenerId, Hook>,
    hooked_buttons: HashSet<NodeId>,
}

impl EventHooks {
    pub fn attach_visibility<D: Document>(&mut self, dom: &mut D) -> Result<ListenerId, DomError> {
        let root = dom.root();
        let id = dom.add_listener(root, EventKind::VisibilityChange, Phase::Bubble)?;
        self.routes.insert(id, Hook::Visibility);
        Ok(id)
    }

    pub fn attach_change<D: Document>(&mut self, dom: &mut D, dialog: NodeId) -> Result<ListenerId, DomError> {
        let id = dom.add_listener(dialog, EventKind::Change, Phase::Capture)?;
        self.routes.insert(id, Hook::StrategyChange { dialog });
        Ok(id)
    }

    /// Hook the completion button of `dialog` if it is rendered and not
    /// already hooked. `Ok(None)` means there was nothing to do.
    pub fn attach_complete_button<D: Document>(
        &mut self,
        dom: &mut D,
        dialog: NodeId,
    ) -> Result<Option<ListenerId>, DomError> {
        let Some(button) = find_complete_button(dom, dialog) else {
            return Ok(None);
        };
        if self.hooked_buttons.contains(&button) {
            return Ok(None);
        }
        let id = dom.add_listener(button, EventKind::Click, Phase::Capture)?;
        self.hooked_buttons.insert(button);
        self.routes.insert(id, Hook::CompleteClick { dialog, button });
        Ok(Some(id))
    }

    pub fn route(&self, id: ListenerId) -> Option<Hook> {
        self.routes.get(&id).copied()
    }

    /// Remove a listener from the page and forget its route.
    pub fn detach<D: Document>(&mut self, dom: &mut D, id: ListenerId) {
        if let Some(Hook::CompleteClick { button, .. }) = self.routes.remove(&id) {
            self.hooked_buttons.remove(&button);
        }
        dom.remove_listener(id);
    }

    pub fn listener_count(&self) -> usize {
        self.routes.len()
    }
}

/// First action button under `dialog` whose text has "complete" as a word.
pub fn find_complete_button<D: Document>(dom: &D, dialog: NodeId) -> Option<NodeId> {
    dom.query_all(dialog, Selector::ActionButton)
        .into_iter()
        .find(|&node| COMPLETE_WORD.is_match(&dom.text_content(node)))
}
