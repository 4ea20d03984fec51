//! The cleaning engine.
//!
//! [`Cleaner`] is a single-threaded state machine. Platforms feed it
//! [`Message`]s (mutation batches, listener invocations, manual entry points)
//! and advance its clock; the engine reacts by running cleaning passes,
//! scheduling follow-up [`Task`]s and (un)subscribing observers and listeners.
//! Every handler runs to completion before the next one starts.

use std::collections::HashMap;

use crate::accessor::PropertyInterceptor;
use crate::config::CleanerConfig;
use crate::context::{CleanerContext, debug_log};
use crate::dom::{Document, ListenerId, MutationRecord, NodeId, ObserveOptions, ObserverId, Selector};
use crate::hooks::{EventHooks, Hook};
use crate::registry::{DialogEntry, DialogRegistry};
use crate::scheduler::{PassReason, Scheduler, Task, TimerToken};
use crate::snapshot::{CleanerSnapshot, DialogSnapshot};
use crate::strategy::is_squash_selected;
use crate::surfaces::{clean_all, find_customize_checkbox, is_checked, message_nodes};
use crate::watcher::{scan_dialog_batch, scan_document_batch};

/// Input delivered to the engine by its platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// A batch of records from one observer.
    Mutations {
        observer: ObserverId,
        records: Vec<MutationRecord>,
    },
    /// A listener the engine attached was invoked.
    Event { listener: ListenerId },
    /// Look for new dialogs now.
    Rescan,
    /// Run a pass on every registered dialog now.
    ForceClean,
}

/// What an observer was attached for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WatchScope {
    Document,
    Dialog(NodeId),
    Field { dialog: NodeId },
}

pub struct Cleaner {
    ctx: CleanerContext,
    scheduler: Scheduler,
    registry: DialogRegistry,
    interceptor: PropertyInterceptor,
    hooks: EventHooks,
    watches: HashMap<ObserverId, WatchScope>,
    rescan: Option<TimerToken>,
    started: bool,
}

impl Cleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self::with_context(CleanerContext::new(config))
    }

    /// Build an engine sharing flags with other components.
    pub fn with_context(ctx: CleanerContext) -> Self {
        Self {
            ctx,
            scheduler: Scheduler::new(),
            registry: DialogRegistry::default(),
            interceptor: PropertyInterceptor::default(),
            hooks: EventHooks::default(),
            watches: HashMap::new(),
            rescan: None,
            started: false,
        }
    }

    pub fn context(&self) -> &CleanerContext {
        &self.ctx
    }

    pub fn registry(&self) -> &DialogRegistry {
        &self.registry
    }

    pub fn interceptor(&self) -> &PropertyInterceptor {
        &self.interceptor
    }

    pub fn hooks(&self) -> &EventHooks {
        &self.hooks
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    /// When the platform should next call [`Cleaner::advance_to`].
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    pub fn has_microtasks(&self) -> bool {
        self.scheduler.has_microtasks()
    }

    /// Self-initialization. Returns `false` if the engine was already started.
    pub fn start<D: Document>(&mut self, dom: &mut D) -> bool {
        if self.started {
            return false;
        }
        self.started = true;

        self.interceptor.install(dom, &self.ctx);

        let root = dom.root();
        match dom.observe(root, &ObserveOptions::structure()) {
            Ok(observer) => {
                self.watches.insert(observer, WatchScope::Document);
            }
            Err(err) => debug_log!(self.ctx, "document watcher unavailable: {err}"),
        }
        if let Err(err) = self.hooks.attach_visibility(dom) {
            debug_log!(self.ctx, "visibility hook unavailable: {err}");
        }

        let period = self.ctx.config().rescan_period_ms;
        if period > 0 {
            self.rescan = Some(self.scheduler.schedule_repeating(period, None, Task::Rescan));
        }

        self.detect(dom, None);
        debug_log!(self.ctx, "Cleaner started");
        true
    }

    pub fn handle<D: Document>(&mut self, dom: &mut D, message: Message) {
        match message {
            Message::Mutations { observer, records } => self.on_mutations(dom, observer, &records),
            Message::Event { listener } => self.on_event(dom, listener),
            Message::Rescan => self.rescan(dom),
            Message::ForceClean => self.force_clean(dom),
        }
    }

    /// Run every task due up to `now_ms`, draining microtasks after each.
    pub fn advance_to<D: Document>(&mut self, dom: &mut D, now_ms: u64) {
        self.run_microtasks(dom);
        while let Some(task) = self.scheduler.pop_due(now_ms) {
            self.run_task(dom, task);
            self.run_microtasks(dom);
        }
    }

    pub fn run_microtasks<D: Document>(&mut self, dom: &mut D) {
        while let Some(task) = self.scheduler.take_microtask() {
            self.run_task(dom, task);
        }
    }

    fn run_task<D: Document>(&mut self, dom: &mut D, task: Task) {
        match task {
            Task::Pass { dialog, reason } => self.run_pass(dom, dialog, reason),
            Task::Poll { dialog } => self.poll(dom, dialog),
            Task::Rescan => self.detect(dom, None),
        }
    }

    /// Manual rescan entry point.
    pub fn rescan<D: Document>(&mut self, dom: &mut D) {
        self.prune(dom);
        self.detect(dom, None);
    }

    /// Manual force-clean entry point: one pass per registered dialog.
    pub fn force_clean<D: Document>(&mut self, dom: &mut D) {
        self.prune(dom);
        for root in self.registry.roots() {
            self.run_pass(dom, root, PassReason::Forced);
        }
    }

    /// Initialize every candidate dialog at or under `scope`
    /// (the whole document when `None`).
    fn detect<D: Document>(&mut self, dom: &mut D, scope: Option<NodeId>) {
        let base = scope.unwrap_or_else(|| dom.root());
        let mut candidates = Vec::new();
        if scope.is_some() && dom.matches(base, Selector::DialogLike) {
            candidates.push(base);
        }
        candidates.extend(dom.query_all(base, Selector::DialogLike));

        let keyword = self.ctx.config().dialog_keyword.to_lowercase();
        for root in candidates {
            if self.registry.contains(root) || !dom.is_connected(root) {
                continue;
            }
            if dom.text_content(root).to_lowercase().contains(&keyword) {
                self.init_dialog(dom, root);
            }
        }
    }

    fn init_dialog<D: Document>(&mut self, dom: &mut D, root: NodeId) {
        let Some(entry) = self.registry.register(root) else {
            return;
        };
        let id = entry.id;

        match dom.observe(root, &ObserveOptions::dialog()) {
            Ok(observer) => self.track_observer(root, observer, WatchScope::Dialog(root)),
            Err(err) => debug_log!(self.ctx, "dialog watcher unavailable for {id}: {err}"),
        }

        let config = self.ctx.config();
        for &delay in &config.attempt_delays_ms {
            self.scheduler.schedule_once(
                delay,
                Task::Pass {
                    dialog: root,
                    reason: PassReason::Attempt,
                },
            );
        }
        if config.poll_max_runs > 0 {
            let poll = self.scheduler.schedule_repeating(
                config.poll_period_ms,
                Some(config.poll_max_runs),
                Task::Poll { dialog: root },
            );
            if let Some(entry) = self.registry.get_mut(root) {
                entry.poll = Some(poll);
            }
        }

        let surfaces = message_nodes(dom, root);
        self.watch_fields(dom, root, surfaces);

        match self.hooks.attach_change(dom, root) {
            Ok(listener) => self.track_listener(root, listener),
            Err(err) => debug_log!(self.ctx, "change hook unavailable for {id}: {err}"),
        }
        self.hook_complete_button(dom, root);

        debug_log!(self.ctx, "Initialized dialog {id} at {root}");
    }

    fn track_observer(&mut self, dialog: NodeId, observer: ObserverId, scope: WatchScope) {
        self.watches.insert(observer, scope);
        if let Some(entry) = self.registry.get_mut(dialog) {
            entry.observers.push(observer);
        }
    }

    fn track_listener(&mut self, dialog: NodeId, listener: ListenerId) {
        if let Some(entry) = self.registry.get_mut(dialog) {
            entry.listeners.push(listener);
        }
    }

    fn watch_fields<D: Document>(&mut self, dom: &mut D, dialog: NodeId, surfaces: Vec<NodeId>) {
        if !self.ctx.config().watch_fields {
            return;
        }
        for node in surfaces {
            let fresh = self
                .registry
                .get_mut(dialog)
                .is_some_and(|entry| entry.watched_fields.insert(node));
            if !fresh {
                continue;
            }
            match dom.observe(node, &ObserveOptions::field()) {
                Ok(observer) => self.track_observer(dialog, observer, WatchScope::Field { dialog }),
                Err(err) => debug_log!(self.ctx, "field watcher unavailable for {node}: {err}"),
            }
        }
    }

    fn hook_complete_button<D: Document>(&mut self, dom: &mut D, dialog: NodeId) {
        match self.hooks.attach_complete_button(dom, dialog) {
            Ok(Some(listener)) => {
                self.track_listener(dialog, listener);
                debug_log!(self.ctx, "Attached Complete button listener");
            }
            Ok(None) => {}
            Err(err) => debug_log!(self.ctx, "complete hook unavailable: {err}"),
        }
    }

    fn on_mutations<D: Document>(&mut self, dom: &mut D, observer: ObserverId, records: &[MutationRecord]) {
        let Some(&scope) = self.watches.get(&observer) else {
            return;
        };
        match scope {
            WatchScope::Document => {
                let scan = scan_document_batch(dom, records);
                if scan.removals {
                    self.prune(dom);
                }
                for node in scan.detect {
                    self.detect(dom, Some(node));
                }
            }
            WatchScope::Dialog(root) => {
                if !self.registry.contains(root) {
                    return;
                }
                let scan = scan_dialog_batch(dom, records);
                if !scan.new_surfaces.is_empty() {
                    self.watch_fields(dom, root, scan.new_surfaces);
                }
                if scan.relevant {
                    self.debounce_pass(root);
                    self.hook_complete_button(dom, root);
                }
            }
            WatchScope::Field { dialog } => self.debounce_pass(dialog),
        }
    }

    fn debounce_pass(&mut self, dialog: NodeId) {
        let delay = self.ctx.config().debounce_ms;
        if let Some(entry) = self.registry.get_mut(dialog) {
            self.scheduler.debounce(
                entry.state.debounce_slot(),
                delay,
                Task::Pass {
                    dialog,
                    reason: PassReason::Debounce,
                },
            );
        }
    }

    fn on_event<D: Document>(&mut self, dom: &mut D, listener: ListenerId) {
        let Some(hook) = self.hooks.route(listener) else {
            return;
        };
        match hook {
            Hook::Visibility => {
                if !dom.is_hidden() {
                    self.detect(dom, None);
                }
            }
            Hook::StrategyChange { dialog } => self.run_pass(dom, dialog, PassReason::StrategyChange),
            Hook::CompleteClick { dialog, .. } => {
                self.run_pass(dom, dialog, PassReason::CompleteClick);
                let task = Task::Pass {
                    dialog,
                    reason: PassReason::CompleteClick,
                };
                self.scheduler.queue_microtask(task);
                for &delay in &self.ctx.config().click_followups_ms {
                    self.scheduler.schedule_once(delay, task);
                }
            }
        }
    }

    fn poll<D: Document>(&mut self, dom: &mut D, dialog: NodeId) {
        let Some(entry) = self.registry.get_mut(dialog) else {
            return;
        };
        if entry.state.cleaned_once() {
            if let Some(token) = entry.poll.take() {
                self.scheduler.cancel(token);
            }
            return;
        }
        self.run_pass(dom, dialog, PassReason::Poll);
    }

    /// The idempotent cleaning pass for one dialog.
    fn run_pass<D: Document>(&mut self, dom: &mut D, root: NodeId, reason: PassReason) {
        if !self.registry.contains(root) || !dom.is_connected(root) {
            return;
        }

        let cleaned = clean_all(dom, root, &self.ctx);
        if self.ctx.config().enforce_customize {
            self.ensure_customize(dom, root);
        }

        let squash_now = is_squash_selected(dom, Some(root));
        let first_squash = squash_now
            && self
                .registry
                .get_mut(root)
                .is_some_and(|entry| entry.state.confirm_squash());
        let mut cleaned_again = false;
        if first_squash {
            self.ctx.flags().mark_squash_active();
            debug_log!(self.ctx, "Squash strategy detected");
            cleaned_again = clean_all(dom, root, &self.ctx);
        }

        let Some(entry) = self.registry.get_mut(root) else {
            return;
        };
        entry.state.note_cleaned(cleaned || cleaned_again);
        entry.state.settle_success();
        debug_log!(
            self.ctx,
            "Attempt {reason:?} on {}: cleaned={} squash={} customize={} success={}",
            entry.id,
            cleaned || cleaned_again,
            squash_now,
            entry.state.customize_ensured(),
            entry.state.success()
        );
    }

    fn ensure_customize<D: Document>(&mut self, dom: &mut D, root: NodeId) {
        let Some(checkbox) = find_customize_checkbox(dom, root) else {
            return;
        };
        if is_checked(dom, checkbox) {
            if let Some(entry) = self.registry.get_mut(root) {
                entry.state.mark_customize_ensured();
            }
            return;
        }
        if let Err(err) = dom.click(checkbox) {
            debug_log!(self.ctx, "could not click customize checkbox: {err}");
            return;
        }
        if !is_checked(dom, checkbox) {
            return;
        }
        if let Some(entry) = self.registry.get_mut(root) {
            entry.state.mark_customize_ensured();
        }
        debug_log!(self.ctx, "Checked customize commit checkbox");
        for &delay in &self.ctx.config().customize_followups_ms {
            self.scheduler.schedule_once(
                delay,
                Task::Pass {
                    dialog: root,
                    reason: PassReason::Customize,
                },
            );
        }
    }

    /// Release everything attached to dialogs that left the document.
    fn prune<D: Document>(&mut self, dom: &mut D) {
        for (root, entry) in self.registry.prune_detached(dom) {
            self.release(dom, &entry);
            debug_log!(self.ctx, "Released dialog {} at {root}", entry.id);
        }
    }

    fn release<D: Document>(&mut self, dom: &mut D, entry: &DialogEntry) {
        for &observer in &entry.observers {
            dom.disconnect(observer);
            self.watches.remove(&observer);
        }
        for &listener in &entry.listeners {
            self.hooks.detach(dom, listener);
        }
        if let Some(token) = entry.state.debounce_handle() {
            self.scheduler.cancel(token);
        }
        if let Some(token) = entry.poll {
            self.scheduler.cancel(token);
        }
    }

    pub fn snapshot(&self) -> CleanerSnapshot {
        let dialogs = self
            .registry
            .roots()
            .into_iter()
            .filter_map(|root| {
                let entry = self.registry.get(root)?;
                let polling = entry.poll.is_some_and(|token| self.scheduler.is_pending(token));
                let debounce_pending = entry
                    .state
                    .debounce_handle()
                    .is_some_and(|token| self.scheduler.is_pending(token));
                Some(DialogSnapshot::capture(root.to_string(), entry, polling, debounce_pending))
            })
            .collect();

        let flags = self.ctx.flags();
        CleanerSnapshot {
            version: CleanerSnapshot::VERSION,
            started: self.started,
            squash_active: flags.squash_active(),
            values_intercepted: flags.values_intercepted(),
            guarded_kinds: self
                .interceptor
                .guarded_kinds()
                .map(|kind| kind.constructor_name())
                .collect(),
            now_ms: self.scheduler.now_ms(),
            pending_timers: self.scheduler.pending(),
            dialogs,
        }
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(CleanerConfig::default())
    }
}
