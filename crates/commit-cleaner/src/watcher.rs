//! Classification of mutation batches.
//!
//! The engine owns the observers; these functions only decide what a batch
//! means for the document-wide and dialog-scoped subscriptions.

use crate::dom::{Document, MutationKind, MutationRecord, NodeId, Selector};
use crate::strategy::{SQUASH_LABEL, contains_ignore_case};
use crate::surfaces::mentions_customize;

/// What the document-wide watcher saw.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DocumentScan {
    /// Added elements that are or contain a dialog-like element.
    pub detect: Vec<NodeId>,
    /// Some nodes were removed; dialogs may have been detached.
    pub removals: bool,
}

pub fn scan_document_batch<D: Document>(dom: &D, records: &[MutationRecord]) -> DocumentScan {
    let mut scan = DocumentScan::default();
    for record in records {
        if !record.removed().is_empty() {
            scan.removals = true;
        }
        for &node in record.added() {
            if !dom.is_element(node) || scan.detect.contains(&node) {
                continue;
            }
            if dom.matches(node, Selector::DialogLike) || dom.contains_match(node, Selector::DialogLike) {
                scan.detect.push(node);
            }
        }
    }
    scan
}

/// What a dialog-scoped watcher saw.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DialogScan {
    /// The batch may have changed the message or the strategy.
    pub relevant: bool,
    /// Text surfaces added by this batch.
    pub new_surfaces: Vec<NodeId>,
}

pub fn scan_dialog_batch<D: Document>(dom: &D, records: &[MutationRecord]) -> DialogScan {
    let mut scan = DialogScan::default();
    for record in records {
        match &record.kind {
            MutationKind::ChildList { added, .. } => {
                for &node in added {
                    if dom.is_element(node) {
                        if dom.matches(node, Selector::TextSurface) {
                            scan.new_surfaces.push(node);
                        }
                        scan.new_surfaces.extend(dom.query_all(node, Selector::TextSurface));
                    }
                    if scan.relevant {
                        continue;
                    }
                    let text = dom.text_content(node);
                    scan.relevant = !scan.new_surfaces.is_empty() || text_is_relevant(&text);
                }
            }
            MutationKind::CharacterData => {
                scan.relevant |= text_is_relevant(&dom.text_content(record.target));
            }
            MutationKind::Attributes { .. } => {
                scan.relevant |= is_strategy_control(dom, record.target);
            }
        }
    }
    scan.new_surfaces.dedup();
    scan
}

fn text_is_relevant(text: &str) -> bool {
    contains_ignore_case(text, SQUASH_LABEL) || mentions_customize(text)
}

fn is_strategy_control<D: Document>(dom: &D, node: NodeId) -> bool {
    dom.attribute(node, "aria-roledescription").as_deref() == Some("Dropdown")
        || dom.attribute(node, "role").as_deref() == Some("combobox")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{Markup, MemoryDom};

    #[test]
    fn document_scan_finds_nested_dialogs() {
        let mut dom = MemoryDom::new();
        let body = dom.root();
        let wrapper = dom.insert(
            body,
            &Markup::new("section").child(Markup::new("div").attr("aria-modal", "true")),
        );
        let plain = dom.insert(body, &Markup::new("p").text("hello"));

        let records = vec![MutationRecord::child_list(body, [wrapper, plain], [])];
        let scan = scan_document_batch(&dom, &records);
        assert_eq!(scan.detect, vec![wrapper]);
        assert!(!scan.removals);
    }

    #[test]
    fn dialog_scan_reports_new_surfaces() {
        let mut dom = MemoryDom::new();
        let body = dom.root();
        let panel = dom.insert(body, &Markup::new("div").child(Markup::new("textarea")));
        let textarea = dom.query_all(panel, Selector::TextSurface)[0];

        let scan = scan_dialog_batch(&dom, &[MutationRecord::child_list(body, [panel], [])]);
        assert!(scan.relevant);
        assert_eq!(scan.new_surfaces, vec![textarea]);
    }

    #[test]
    fn dialog_scan_text_and_attributes() {
        let mut dom = MemoryDom::new();
        let body = dom.root();
        let label = dom.insert(body, &Markup::new("span").text("Squash Commit"));
        let noise = dom.insert(body, &Markup::new("span").text("Reviewers"));
        let dropdown = dom.insert(body, &Markup::new("input").attr("aria-roledescription", "Dropdown"));
        let button = dom.insert(body, &Markup::new("button").text("Cancel"));

        assert!(scan_dialog_batch(&dom, &[MutationRecord::character_data(label)]).relevant);
        assert!(!scan_dialog_batch(&dom, &[MutationRecord::character_data(noise)]).relevant);
        assert!(scan_dialog_batch(&dom, &[MutationRecord::attribute(dropdown, "aria-expanded")]).relevant);
        assert!(!scan_dialog_batch(&dom, &[MutationRecord::attribute(button, "class")]).relevant);
    }
}
