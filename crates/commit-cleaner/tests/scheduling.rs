//! Timing behaviour: debounce, bounded poll, attempt ladder.

mod common;

use commit_cleaner::CleanerConfig;
use commit_cleaner::dom::{Document, Selector};
use commit_cleaner::platform::memory::{Markup, Page};

use common::{completion_dialog, quiet_config};

fn editor_dialog(page: &mut Page) -> (commit_cleaner::dom::NodeId, commit_cleaner::dom::NodeId) {
    let body = page.dom.root();
    let root = page.dom.insert(
        body,
        &Markup::new("div")
            .attr("role", "dialog")
            .child(Markup::new("h2").text("Complete pull request"))
            .child(Markup::new("div").attr("contenteditable", "true")),
    );
    let editor = page.dom.query_all(root, Selector::TextSurface)[0];
    let text = page.dom.insert_text(editor, "Draft");
    (editor, text)
}

#[test]
fn late_population_is_cleaned_after_quiescence() {
    let mut page = Page::new(quiet_config());
    let (editor, text) = editor_dialog(&mut page);
    page.start();

    page.dom.set_text(text, "Merged PR 77: Late title").unwrap();
    page.settle();
    assert_eq!(page.dom.text_content(editor), "Merged PR 77: Late title");

    page.advance_by(74);
    assert_eq!(page.dom.text_content(editor), "Merged PR 77: Late title");
    page.advance_by(1);
    assert_eq!(page.dom.text_content(editor), "Late title");
}

#[test]
fn debounce_restarts_on_each_batch() {
    let mut page = Page::new(quiet_config());
    let (editor, text) = editor_dialog(&mut page);
    page.start();

    page.dom.set_text(text, "Merged PR 77: A").unwrap();
    page.settle();
    page.advance_by(50);
    page.dom.set_text(text, "Merged PR 77: B").unwrap();
    page.settle();

    page.advance_by(50);
    assert_eq!(page.dom.text_content(editor), "Merged PR 77: B");
    assert!(page.cleaner.snapshot().dialogs[0].debounce_pending);

    page.advance_by(25);
    assert_eq!(page.dom.text_content(editor), "B");
    assert!(!page.cleaner.snapshot().dialogs[0].debounce_pending);
}

#[test]
fn poll_stops_once_cleaned() {
    let config = CleanerConfig {
        attempt_delays_ms: Vec::new(),
        ..CleanerConfig::default()
    };
    let mut page = Page::new(config);
    let dialog = completion_dialog(&mut page.dom, "Squash commit", "Merged PR 9: polled");
    page.start();

    page.advance_by(499);
    assert_eq!(page.dom.value(dialog.field).as_deref(), Some("Merged PR 9: polled"));
    assert!(page.cleaner.snapshot().dialogs[0].polling);

    page.advance_by(1);
    assert_eq!(page.dom.value(dialog.field).as_deref(), Some("polled"));

    // The next tick notices the clean and cancels the interval.
    page.advance_by(500);
    assert!(!page.cleaner.snapshot().dialogs[0].polling);
}

#[test]
fn poll_is_capped() {
    let config = CleanerConfig {
        attempt_delays_ms: Vec::new(),
        poll_period_ms: 100,
        poll_max_runs: 3,
        rescan_period_ms: 0,
        enforce_customize: false,
        ..CleanerConfig::default()
    };
    let mut page = Page::new(config);
    completion_dialog(&mut page.dom, "Merge commit", "Nothing to strip");
    page.start();

    page.advance_by(299);
    assert!(page.cleaner.snapshot().dialogs[0].polling);
    page.advance_by(1);
    assert!(!page.cleaner.snapshot().dialogs[0].polling);
    assert_eq!(page.cleaner.next_deadline(), None);
}

#[test]
fn ladder_keeps_correcting_after_success() {
    let config = CleanerConfig {
        poll_max_runs: 0,
        watch_fields: false,
        ..CleanerConfig::default()
    };
    let mut page = Page::new(config);
    let dialog = completion_dialog(&mut page.dom, "Squash commit", "Merged PR 1: first");
    page.start();
    page.advance_by(0);
    assert_eq!(page.dom.value(dialog.field).as_deref(), Some("first"));

    // A write no watcher can see, between the 3 s and 5 s attempts.
    page.advance_by(3_500);
    page.dom.write_value_native(dialog.field, "Merged PR 1: again").unwrap();
    page.advance_by(1_499);
    assert_eq!(page.dom.value(dialog.field).as_deref(), Some("Merged PR 1: again"));
    page.advance_by(1);
    assert_eq!(page.dom.value(dialog.field).as_deref(), Some("again"));
}

#[test]
fn periodic_rescan_finds_quietly_qualified_dialogs() {
    let config = CleanerConfig {
        rescan_period_ms: 1_000,
        ..quiet_config()
    };
    let mut page = Page::new(config);
    let body = page.dom.root();
    let root = page.dom.insert(body, &Markup::new("div").attr("class", "dialog"));
    let heading = page.dom.insert_text(root, "Loading");
    page.start();

    page.dom.set_text(heading, "Complete").unwrap();
    page.advance_by(999);
    assert!(page.cleaner.registry().is_empty());
    page.advance_by(1);
    assert!(page.cleaner.registry().contains(root));
}
