//! Browser platform.
//!
//! JS callbacks (observers, listeners, timers, microtasks, window entry
//! points) never touch the engine directly: they push an [`Inbound`] onto a
//! thread-local inbox and pump it. The pump drains the inbox into the engine
//! unless the engine is already running further up the stack, in which case
//! the outer pump picks the message up when the current handler returns.

mod console;
mod document;
mod intercept;

use std::cell::RefCell;
use std::collections::VecDeque;

use js_sys::{Array, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::config::{CleanerConfig, ConfigError};
use crate::context::{CleanerContext, debug_log};
use crate::dom::{ListenerId, ObserverId};
use crate::engine::{Cleaner, Message};

pub use console::ConsoleLogger;
pub use document::WebDocument;

const LOADED_KEY: &str = "__commitCleanerLoaded";
const DEBUG_KEY: &str = "__prCommitCleanerDebug";
const CONFIG_KEY: &str = "__prCommitCleanerConfig";
const RESCAN_KEY: &str = "__prCommitClean";
const FORCE_KEY: &str = "__prCommitCleanerForce";
const STATE_KEY: &str = "__prCommitCleanerState";

pub(crate) enum Inbound {
    Mutations(ObserverId, Array),
    Event(ListenerId),
    Timer,
    Microtask,
    Rescan,
    ForceClean,
}

thread_local! {
    static INBOX: RefCell<VecDeque<Inbound>> = RefCell::new(VecDeque::new());
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Queue a message for the engine and try to deliver it right away.
pub(crate) fn enqueue(inbound: Inbound) {
    INBOX.with(|inbox| inbox.borrow_mut().push_back(inbound));
    pump();
}

fn pump() {
    RUNTIME.with(|cell| {
        // Re-entrant call from inside a handler: the outer pump drains.
        let Ok(mut slot) = cell.try_borrow_mut() else {
            return;
        };
        let Some(runtime) = slot.as_mut() else {
            return;
        };
        runtime.refresh_debug();
        while let Some(inbound) = INBOX.with(|inbox| inbox.borrow_mut().pop_front()) {
            runtime.deliver(inbound);
        }
        runtime.arm();
    });
}

struct Runtime {
    dom: WebDocument,
    cleaner: Cleaner,
    epoch_ms: f64,
    timer: Option<(i32, u64)>,
    microtask_queued: bool,
    timer_callback: Closure<dyn FnMut()>,
    microtask_callback: Closure<dyn FnMut()>,
}

impl Runtime {
    fn new(dom: WebDocument, cleaner: Cleaner) -> Self {
        Self {
            dom,
            cleaner,
            epoch_ms: js_sys::Date::now(),
            timer: None,
            microtask_queued: false,
            timer_callback: Closure::new(|| enqueue(Inbound::Timer)),
            microtask_callback: Closure::new(|| enqueue(Inbound::Microtask)),
        }
    }

    fn now_ms(&self) -> u64 {
        (js_sys::Date::now() - self.epoch_ms).max(0.0) as u64
    }

    fn refresh_debug(&self) {
        if let Some(window) = web_sys::window() {
            let debug = Reflect::get(&window, &JsValue::from_str(DEBUG_KEY)).is_ok_and(|value| value.is_truthy());
            self.cleaner.context().set_debug(debug || self.cleaner.context().config().debug);
        }
    }

    fn deliver(&mut self, inbound: Inbound) {
        let now = self.now_ms();
        // Catch the virtual clock up first so new timers are relative to now.
        self.cleaner.advance_to(&mut self.dom, now);
        match inbound {
            Inbound::Mutations(observer, records) => {
                let records = self.dom.convert_records(&records);
                if !records.is_empty() {
                    self.cleaner.handle(&mut self.dom, Message::Mutations { observer, records });
                }
            }
            Inbound::Event(listener) => self.cleaner.handle(&mut self.dom, Message::Event { listener }),
            Inbound::Timer => self.timer = None,
            Inbound::Microtask => {
                self.microtask_queued = false;
                self.cleaner.run_microtasks(&mut self.dom);
            }
            Inbound::Rescan => self.cleaner.handle(&mut self.dom, Message::Rescan),
            Inbound::ForceClean => self.cleaner.handle(&mut self.dom, Message::ForceClean),
        }
    }

    /// Re-arm the single real timer to the engine's next deadline and queue a
    /// JS microtask when engine microtasks are pending.
    fn arm(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if self.cleaner.has_microtasks() && !self.microtask_queued {
            window.queue_microtask(self.microtask_callback.as_ref().unchecked_ref());
            self.microtask_queued = true;
        }

        let deadline = self.cleaner.next_deadline();
        if self.timer.map(|(_, armed_for)| armed_for) == deadline {
            return;
        }
        if let Some((handle, _)) = self.timer.take() {
            window.clear_timeout_with_handle(handle);
        }
        let Some(deadline) = deadline else {
            return;
        };
        let delay = deadline.saturating_sub(self.now_ms()).min(i32::MAX as u64) as i32;
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            self.timer_callback.as_ref().unchecked_ref(),
            delay,
        ) {
            Ok(handle) => self.timer = Some((handle, deadline)),
            Err(err) => debug_log!(self.cleaner.context(), "could not arm timer: {err:?}"),
        }
    }
}

/// The page-provided config. A missing or unreadable value means defaults.
fn read_config(window: &web_sys::Window) -> Result<CleanerConfig, ConfigError> {
    let raw = Reflect::get(window, &JsValue::from_str(CONFIG_KEY)).unwrap_or(JsValue::UNDEFINED);
    if raw.is_undefined() || raw.is_null() {
        return Ok(CleanerConfig::default());
    }
    let json = match raw.as_string() {
        Some(json) => Some(json),
        None => js_sys::JSON::stringify(&raw).ok().and_then(|json| json.as_string()),
    };
    json.map_or_else(|| Ok(CleanerConfig::default()), |json| CleanerConfig::from_json(&json))
}

/// Set the page-level loaded marker. `false` when the target refuses it.
fn mark_loaded(target: &JsValue) -> bool {
    matches!(Reflect::set(target, &JsValue::from_str(LOADED_KEY), &JsValue::TRUE), Ok(true))
}

fn expose(ctx: &CleanerContext, window: &web_sys::Window, key: &str, value: JsValue) {
    if let Err(err) = Reflect::set(window, &JsValue::from_str(key), &value) {
        debug_log!(ctx, "could not expose {key}: {err:?}");
    }
}

fn snapshot_value() -> JsValue {
    let json = RUNTIME.with(|cell| {
        cell.try_borrow()
            .ok()
            .and_then(|slot| slot.as_ref().map(|runtime| runtime.cleaner.snapshot().to_json()))
    });
    json.and_then(|json| js_sys::JSON::parse(&json).ok())
        .unwrap_or(JsValue::NULL)
}

/// Start the cleaner on the current page.
///
/// Idempotent per page: a second call (e.g. the script injected twice)
/// returns `false` without doing anything.
pub fn install() -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };
    let loaded = Reflect::get(&window, &JsValue::from_str(LOADED_KEY)).is_ok_and(|value| value.is_truthy());
    if loaded {
        return false;
    }
    let Some(dom) = window.document().and_then(WebDocument::new) else {
        return false;
    };
    if !mark_loaded(&window) {
        return false;
    }

    console::init();
    let (config, config_error) = match read_config(&window) {
        Ok(config) => (config, None),
        Err(err) => (CleanerConfig::default(), Some(err)),
    };
    let runtime = Runtime::new(dom, Cleaner::new(config));
    runtime.refresh_debug();
    let ctx = runtime.cleaner.context().clone();
    if let Some(err) = config_error {
        debug_log!(ctx, "{err}; using defaults");
    }
    RUNTIME.with(|cell| {
        let mut slot = cell.borrow_mut();
        let runtime = slot.insert(runtime);
        runtime.cleaner.start(&mut runtime.dom);
    });

    expose(
        &ctx,
        &window,
        RESCAN_KEY,
        Closure::<dyn FnMut()>::new(|| enqueue(Inbound::Rescan)).into_js_value(),
    );
    expose(
        &ctx,
        &window,
        FORCE_KEY,
        Closure::<dyn FnMut()>::new(|| enqueue(Inbound::ForceClean)).into_js_value(),
    );
    expose(
        &ctx,
        &window,
        STATE_KEY,
        Closure::<dyn FnMut() -> JsValue>::new(snapshot_value).into_js_value(),
    );

    pump();
    true
}

#[wasm_bindgen(start)]
pub fn start() {
    install();
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use js_sys::Object;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn loaded_marker_reports_refusal() {
        let open = Object::new();
        assert!(mark_loaded(&open));
        assert!(Reflect::get(&open, &JsValue::from_str(LOADED_KEY)).unwrap().is_truthy());

        let frozen = Object::freeze(&Object::new());
        assert!(!mark_loaded(&frozen));
    }
}
