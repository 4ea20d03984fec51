//! Merge strategy inference.
//!
//! The host renders the strategy picker as a value-bearing dropdown input when
//! closed and as a textual combobox/menu while open, so both shapes are
//! checked.

use crate::dom::{Document, NodeId, Selector};

pub const SQUASH_LABEL: &str = "Squash commit";

/// Is "Squash commit" the selected strategy anywhere under `scope`
/// (the whole document when `None`)?
pub fn is_squash_selected<D: Document>(dom: &D, scope: Option<NodeId>) -> bool {
    let scope = scope.unwrap_or_else(|| dom.root());

    let dropdown_says_squash = dom
        .query_all(scope, Selector::StrategyDropdown)
        .into_iter()
        .any(|node| {
            dom.read_value(node)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(SQUASH_LABEL))
        });
    if dropdown_says_squash {
        return true;
    }

    dom.query_all(scope, Selector::MenuControl)
        .into_iter()
        .any(|node| contains_ignore_case(&dom.text_content(node), SQUASH_LABEL))
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{Markup, MemoryDom};

    fn dom_with_dropdown(value: &str) -> (MemoryDom, NodeId) {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let dialog = dom.insert(
            root,
            &Markup::new("div").attr("role", "dialog").child(
                Markup::new("input")
                    .attr("aria-roledescription", "Dropdown")
                    .value(value),
            ),
        );
        (dom, dialog)
    }

    #[test]
    fn dropdown_value_decides() {
        let (dom, dialog) = dom_with_dropdown("Squash commit");
        assert!(is_squash_selected(&dom, Some(dialog)));
        assert!(is_squash_selected(&dom, None));

        let (dom, dialog) = dom_with_dropdown("  sQuAsH CoMmIt ");
        assert!(is_squash_selected(&dom, Some(dialog)));

        let (dom, dialog) = dom_with_dropdown("Merge commit");
        assert!(!is_squash_selected(&dom, Some(dialog)));
    }

    #[test]
    fn dropdown_needs_exact_label() {
        let (dom, dialog) = dom_with_dropdown("Squash commit (fast-forward)");
        assert!(!is_squash_selected(&dom, Some(dialog)));
    }

    #[test]
    fn open_menu_text_counts() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let dialog = dom.insert(
            root,
            &Markup::new("div").attr("role", "dialog").child(
                Markup::new("div")
                    .attr("role", "combobox")
                    .child(Markup::new("span").text("Merge type: squash commit")),
            ),
        );
        assert!(is_squash_selected(&dom, Some(dialog)));
    }

    #[test]
    fn absent_controls_mean_no_squash() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let dialog = dom.insert(root, &Markup::new("div").attr("role", "dialog").text("Squash commit"));
        assert!(!is_squash_selected(&dom, Some(dialog)));
    }
}
