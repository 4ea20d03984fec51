//! `log` backend writing to the browser console.

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;

const PREFIX: &str = "[PRCommitCleaner]";

pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("pr_commit_cleaner")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = JsValue::from_str(PREFIX);
        let message = JsValue::from_str(&record.args().to_string());
        match record.level() {
            Level::Error => web_sys::console::error_2(&prefix, &message),
            Level::Warn => web_sys::console::warn_2(&prefix, &message),
            _ => web_sys::console::log_2(&prefix, &message),
        }
    }

    fn flush(&self) {}
}

/// Install the console logger; a logger installed by the embedder wins.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}
