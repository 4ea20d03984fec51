#![allow(dead_code)]

use commit_cleaner::CleanerConfig;
use commit_cleaner::dom::{Document, NodeId, Selector};
use commit_cleaner::platform::memory::{Markup, MemoryDom};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config with only the knobs a test cares about switched on.
pub fn quiet_config() -> CleanerConfig {
    CleanerConfig {
        attempt_delays_ms: Vec::new(),
        poll_max_runs: 0,
        debug: true,
        ..CleanerConfig::default()
    }
}

/// Handles into a rendered completion dialog.
pub struct Dialog {
    pub root: NodeId,
    pub dropdown: NodeId,
    pub field: NodeId,
    pub checkbox: NodeId,
    pub complete: NodeId,
}

pub fn completion_markup(strategy: &str, message: &str) -> Markup {
    Markup::new("div")
        .attr("role", "dialog")
        .child(Markup::new("h2").text("Complete pull request"))
        .child(
            Markup::new("input")
                .attr("aria-roledescription", "Dropdown")
                .value(strategy),
        )
        .child(Markup::new("textarea").attr("aria-label", "Commit message").value(message))
        .child(
            Markup::new("div")
                .attr("role", "checkbox")
                .attr("aria-checked", "false")
                .text("Customize merge commit message"),
        )
        .child(Markup::new("button").text("Cancel"))
        .child(Markup::new("button").text("Complete merge"))
}

pub fn completion_dialog(dom: &mut MemoryDom, strategy: &str, message: &str) -> Dialog {
    let body = dom.root();
    let root = dom.insert(body, &completion_markup(strategy, message));
    handles(dom, root)
}

pub fn handles(dom: &MemoryDom, root: NodeId) -> Dialog {
    let surfaces = dom.query_all(root, Selector::TextSurface);
    Dialog {
        root,
        dropdown: surfaces[0],
        field: surfaces[1],
        checkbox: dom.query_all(root, Selector::CustomizeCheckbox)[0],
        complete: dom.query_all(root, Selector::ActionButton)[1],
    }
}
