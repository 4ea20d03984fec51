//! Text surfaces: finding them and cleaning them in place.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::{CleanerContext, debug_log};
use crate::dom::{Document, EventKind, NodeId, Selector};
use crate::prefix::{PrefixPattern, clean};

static CUSTOMIZE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)customize.*merge.*commit").expect("customize pattern is valid"));

/// Every control or editable container under `scope` that may hold the message.
pub fn message_nodes<D: Document>(dom: &D, scope: NodeId) -> Vec<NodeId> {
    dom.query_all(scope, Selector::TextSurface)
}

/// Text currently shown by a surface: content for editable containers,
/// value for controls.
pub fn surface_text<D: Document>(dom: &D, node: NodeId) -> Option<String> {
    if dom.is_content_editable(node) {
        Some(dom.text_content(node))
    } else {
        dom.read_value(node)
    }
}

/// Strip the prefix from one surface.
///
/// The cleaned text is written through the native path so the value guard is
/// not re-entered, then `input` and `change` are dispatched so the host's own
/// state sees the edit as user typing. Returns whether anything changed.
pub fn clean_element<D: Document>(dom: &mut D, node: NodeId, ctx: &CleanerContext) -> bool {
    let Some(current) = surface_text(dom, node) else {
        return false;
    };
    if !PrefixPattern::is_match(&current) {
        return false;
    }
    let cleaned = clean(&current).into_owned();
    if cleaned == current {
        return false;
    }

    let written = if dom.is_content_editable(node) {
        dom.set_text_content(node, &cleaned)
    } else {
        dom.write_value_native(node, &cleaned)
    };
    if let Err(err) = written {
        debug_log!(ctx, "could not write cleaned message to {node}: {err}");
        return false;
    }

    for kind in [EventKind::Input, EventKind::Change] {
        if let Err(err) = dom.dispatch(node, kind) {
            debug_log!(ctx, "could not dispatch {} on {node}: {err}", kind.as_str());
        }
    }
    debug_log!(ctx, "Cleaned commit message prefix on {node}");
    true
}

/// Clean every surface under `scope`; true if any changed.
pub fn clean_all<D: Document>(dom: &mut D, scope: NodeId, ctx: &CleanerContext) -> bool {
    let mut cleaned_any = false;
    for node in message_nodes(dom, scope) {
        if clean_element(dom, node, ctx) {
            cleaned_any = true;
        }
    }
    cleaned_any
}

/// Does this text read like the "customize merge commit message" option?
pub fn mentions_customize(text: &str) -> bool {
    CUSTOMIZE_TEXT.is_match(text)
}

/// The "customize merge commit" checkbox under `scope`, if rendered.
pub fn find_customize_checkbox<D: Document>(dom: &D, scope: NodeId) -> Option<NodeId> {
    dom.query_all(scope, Selector::CustomizeCheckbox)
        .into_iter()
        .find(|&node| {
            let text = dom.text_content(node).to_lowercase();
            text.contains("customize") && text.contains("merge") && text.contains("commit")
        })
}

pub fn is_checked<D: Document>(dom: &D, node: NodeId) -> bool {
    dom.attribute(node, "aria-checked").as_deref() == Some("true")
}
