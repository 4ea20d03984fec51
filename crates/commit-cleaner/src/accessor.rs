//! Value-write interception.
//!
//! Host code may assign a prefixed message to a control's `value` directly,
//! without any mutation the watchers could see. Every platform therefore
//! routes value reads and writes through a per-kind [`TextAccessor`]; the
//! engine decorates the native accessor once per kind with a
//! [`GuardedAccessor`], so any writer gets corrected at assignment time.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::config::InterceptPolicy;
use crate::context::{CleanerContext, SharedFlags, debug_log};
use crate::dom::{ControlKind, Document};
use crate::error::AccessorError;
use crate::prefix::{PrefixPattern, clean};

/// Getter/setter pair for a control's text value.
pub trait TextAccessor {
    /// Value observed by readers, given what is stored.
    fn get(&self, stored: &str) -> String;
    /// Value to store, given what a writer assigned.
    fn set(&self, incoming: &str) -> String;
}

/// The platform's own accessor: stores and returns values verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeAccessor;

impl TextAccessor for NativeAccessor {
    fn get(&self, stored: &str) -> String {
        stored.to_owned()
    }

    fn set(&self, incoming: &str) -> String {
        incoming.to_owned()
    }
}

/// Decides whether an incoming value gets rewritten.
#[derive(Clone, Debug)]
pub struct ValueGuard {
    flags: Rc<SharedFlags>,
    policy: InterceptPolicy,
}

impl ValueGuard {
    pub fn new(ctx: &CleanerContext) -> Self {
        Self {
            flags: Rc::clone(ctx.flags()),
            policy: ctx.config().intercept,
        }
    }

    /// Cleaned replacement for `incoming`, or `None` to pass it through.
    pub fn rewrite(&self, incoming: &str) -> Option<String> {
        if !PrefixPattern::is_match(incoming) {
            return None;
        }
        if self.policy == InterceptPolicy::SquashOnly && !self.flags.squash_active() {
            return None;
        }
        Some(clean(incoming).into_owned())
    }
}

/// Decorator around another accessor; reads pass through, prefixed writes are
/// cleaned before reaching `inner`.
pub struct GuardedAccessor {
    inner: Rc<dyn TextAccessor>,
    guard: ValueGuard,
}

impl GuardedAccessor {
    pub fn new(inner: Rc<dyn TextAccessor>, guard: ValueGuard) -> Self {
        Self { inner, guard }
    }
}

impl TextAccessor for GuardedAccessor {
    fn get(&self, stored: &str) -> String {
        self.inner.get(stored)
    }

    fn set(&self, incoming: &str) -> String {
        match self.guard.rewrite(incoming) {
            Some(cleaned) => self.inner.set(&cleaned),
            None => self.inner.set(incoming),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// The kind was already guarded (e.g. a second engine on the same page).
    AlreadyInstalled,
}

/// Per-kind accessor registry for platforms that own their value storage.
pub struct AccessorTable {
    native: HashMap<ControlKind, Rc<dyn TextAccessor>>,
    active: HashMap<ControlKind, Rc<dyn TextAccessor>>,
    guarded: HashSet<ControlKind>,
}

impl AccessorTable {
    /// Native accessors for every control kind.
    pub fn new() -> Self {
        let mut native: HashMap<ControlKind, Rc<dyn TextAccessor>> = HashMap::new();
        for kind in ControlKind::ALL {
            native.insert(kind, Rc::new(NativeAccessor));
        }
        Self {
            native,
            active: HashMap::new(),
            guarded: HashSet::new(),
        }
    }

    /// Drop the native accessor of `kind`, as if the platform never defined one.
    pub fn remove_native(&mut self, kind: ControlKind) {
        self.native.remove(&kind);
        self.active.remove(&kind);
    }

    pub fn is_guarded(&self, kind: ControlKind) -> bool {
        self.guarded.contains(&kind)
    }

    pub fn install(&mut self, kind: ControlKind, guard: ValueGuard) -> Result<InstallOutcome, AccessorError> {
        if self.guarded.contains(&kind) {
            return Ok(InstallOutcome::AlreadyInstalled);
        }
        let native = self
            .native
            .get(&kind)
            .cloned()
            .ok_or(AccessorError::MissingDescriptor(kind))?;
        self.active.insert(kind, Rc::new(GuardedAccessor::new(native, guard)));
        self.guarded.insert(kind);
        Ok(InstallOutcome::Installed)
    }

    /// Read through the active accessor.
    pub fn read(&self, kind: ControlKind, stored: &str) -> String {
        match self.active.get(&kind).or_else(|| self.native.get(&kind)) {
            Some(accessor) => accessor.get(stored),
            None => stored.to_owned(),
        }
    }

    /// Ordinary assignment through the active accessor.
    pub fn write(&self, kind: ControlKind, incoming: &str) -> String {
        match self.active.get(&kind).or_else(|| self.native.get(&kind)) {
            Some(accessor) => accessor.set(incoming),
            None => incoming.to_owned(),
        }
    }

    /// Assignment through the native accessor only.
    pub fn write_native(&self, kind: ControlKind, incoming: &str) -> String {
        match self.native.get(&kind) {
            Some(accessor) => accessor.set(incoming),
            None => incoming.to_owned(),
        }
    }
}

impl Default for AccessorTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the value guard on every control kind, once per engine.
#[derive(Debug, Default)]
pub struct PropertyInterceptor {
    outcomes: Vec<(ControlKind, Result<InstallOutcome, AccessorError>)>,
}

impl PropertyInterceptor {
    /// Returns `false` when the installation step already ran.
    /// Kinds whose accessor cannot be patched are skipped.
    pub fn install<D: Document>(&mut self, dom: &mut D, ctx: &CleanerContext) -> bool {
        if ctx.flags().values_intercepted() {
            return false;
        }
        for kind in ControlKind::ALL {
            let outcome = dom.intercept_value_writes(kind, ValueGuard::new(ctx));
            match &outcome {
                Ok(outcome) => debug_log!(ctx, "value guard for {}: {outcome:?}", kind.constructor_name()),
                Err(err) => debug_log!(ctx, "skipping value guard: {err}"),
            }
            self.outcomes.push((kind, outcome));
        }
        ctx.flags().mark_values_intercepted();
        true
    }

    /// Kinds whose writes are guarded after installation.
    pub fn guarded_kinds(&self) -> impl Iterator<Item = ControlKind> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(kind, _)| *kind)
    }

    pub fn failures(&self) -> impl Iterator<Item = &AccessorError> + '_ {
        self.outcomes.iter().filter_map(|(_, outcome)| outcome.as_ref().err())
    }
}
