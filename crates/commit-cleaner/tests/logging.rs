//! Log output follows the debug flag.

mod common;

use std::sync::Mutex;

use commit_cleaner::CleanerConfig;
use commit_cleaner::platform::memory::Page;
use log::{LevelFilter, Log, Metadata, Record};

use common::completion_dialog;

struct Capture {
    lines: Mutex<Vec<String>>,
}

static CAPTURE: Capture = Capture {
    lines: Mutex::new(Vec::new()),
};

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.target().starts_with("pr_commit_cleaner") {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn take_lines() -> Vec<String> {
    std::mem::take(&mut *CAPTURE.lines.lock().unwrap())
}

fn run_squash_dialog(debug: bool) {
    let mut page = Page::new(CleanerConfig {
        debug,
        ..CleanerConfig::default()
    });
    let dialog = completion_dialog(&mut page.dom, "Squash commit", "Merged PR #42: message");
    page.start();
    page.advance_by(0);
    let seen = page.click_and_read(dialog.complete, dialog.field);
    page.advance_by(10_000);
    assert_eq!(seen.as_deref(), Some("message"));
}

// One test so the global logger sees both runs in order.
#[test]
fn output_only_with_debug_flag() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Trace);

    run_squash_dialog(false);
    assert_eq!(take_lines(), Vec::<String>::new());

    run_squash_dialog(true);
    let lines = take_lines();
    assert!(lines.iter().any(|line| line.contains("Squash strategy detected")));
    assert!(lines.iter().any(|line| line.contains("Initialized dialog")));
}
