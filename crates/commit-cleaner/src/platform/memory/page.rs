use crate::config::CleanerConfig;
use crate::context::debug_log;
use crate::dom::{Document, NodeId};
use crate::engine::{Cleaner, Message};

use super::dom::MemoryDom;

/// Upper bound on settle rounds; a well-behaved engine quiesces in a few.
const SETTLE_LIMIT: usize = 64;

/// A headless page: one document, one engine, one virtual clock.
pub struct Page {
    pub dom: MemoryDom,
    pub cleaner: Cleaner,
}

impl Page {
    pub fn new(config: CleanerConfig) -> Self {
        Self::with_dom(MemoryDom::new(), config)
    }

    pub fn with_dom(dom: MemoryDom, config: CleanerConfig) -> Self {
        Self {
            dom,
            cleaner: Cleaner::new(config),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.cleaner.now_ms()
    }

    pub fn start(&mut self) -> bool {
        let started = self.cleaner.start(&mut self.dom);
        self.settle();
        started
    }

    fn deliver(&mut self, message: Message) {
        self.cleaner.handle(&mut self.dom, message);
        self.cleaner.run_microtasks(&mut self.dom);
    }

    /// Deliver queued listener calls, microtasks and mutation batches until
    /// nothing is left, without moving the clock.
    pub fn settle(&mut self) {
        for _ in 0..SETTLE_LIMIT {
            let mut progressed = false;
            for message in self.dom.take_listener_calls() {
                self.deliver(message);
                progressed = true;
            }
            if self.cleaner.has_microtasks() {
                self.cleaner.run_microtasks(&mut self.dom);
                progressed = true;
            }
            for message in self.dom.take_mutation_batches() {
                self.deliver(message);
                progressed = true;
            }
            if !progressed {
                return;
            }
        }
        debug_log!(self.cleaner.context(), "page did not settle after {SETTLE_LIMIT} rounds");
    }

    /// Move the clock forward, firing every timer that falls due on the way.
    pub fn advance_by(&mut self, ms: u64) {
        let target = self.now_ms() + ms;
        self.settle();
        while let Some(deadline) = self.cleaner.next_deadline().filter(|&deadline| deadline <= target) {
            self.cleaner.advance_to(&mut self.dom, deadline);
            self.settle();
        }
        self.cleaner.advance_to(&mut self.dom, target);
        self.settle();
    }

    /// User click followed by everything it triggers.
    pub fn click(&mut self, node: NodeId) {
        if self.dom_click(node) {
            self.settle();
        }
    }

    /// Click `button` and read `field` the way a host click handler would:
    /// after capture listeners ran, before microtasks and timers.
    pub fn click_and_read(&mut self, button: NodeId, field: NodeId) -> Option<String> {
        if !self.dom_click(button) {
            return None;
        }
        for message in self.dom.take_listener_calls() {
            self.cleaner.handle(&mut self.dom, message);
        }
        let seen = self.dom.value(field);
        self.settle();
        seen
    }

    fn dom_click(&mut self, node: NodeId) -> bool {
        self.dom.click(node).is_ok()
    }

    /// Manual rescan, as the injector would trigger it.
    pub fn rescan(&mut self) {
        self.deliver(Message::Rescan);
        self.settle();
    }

    pub fn force_clean(&mut self) {
        self.deliver(Message::ForceClean);
        self.settle();
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.dom.set_hidden(hidden);
        self.settle();
    }
}
