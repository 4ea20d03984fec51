//! Browser platform checks; run with
//! `wasm-pack test --headless --firefox crates/commit-cleaner --features browser`.

#![cfg(all(target_arch = "wasm32", feature = "browser"))]

use commit_cleaner::dom::{Document, Selector};
use commit_cleaner::platform::browser::{WebDocument, install};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> web_sys::Document {
    web_sys::window().and_then(|window| window.document()).unwrap()
}

#[wasm_bindgen_test]
fn install_is_idempotent() {
    install();
    assert!(!install());
}

#[wasm_bindgen_test]
fn patched_textarea_cleans_script_writes() {
    install();
    let document = document();
    let area = document
        .create_element("textarea")
        .unwrap()
        .dyn_into::<web_sys::HtmlTextAreaElement>()
        .unwrap();
    area.set_value("Merged PR 7: From script");
    assert_eq!(area.value(), "From script");
    area.set_value("Plain");
    assert_eq!(area.value(), "Plain");
}

#[wasm_bindgen_test]
fn web_document_queries_live_dom() {
    let document = document();
    let body = document.body().unwrap();
    let dialog = document.create_element("div").unwrap();
    dialog.set_attribute("role", "dialog").unwrap();
    dialog.set_inner_html("<textarea></textarea><div contenteditable=\"true\">x</div>");
    body.append_child(&dialog).unwrap();

    let dom = WebDocument::new(document.clone()).unwrap();
    let dialogs = dom.query_all(dom.root(), Selector::DialogLike);
    assert!(!dialogs.is_empty());
    let last = *dialogs.last().unwrap();
    assert_eq!(dom.query_all(last, Selector::TextSurface).len(), 2);
    assert!(dom.is_connected(last));

    body.remove_child(&dialog).unwrap();
    assert!(!dom.is_connected(last));
}
