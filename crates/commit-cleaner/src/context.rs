//! Process-wide state shared by every component of one engine instance.
//!
//! Flags are set-once booleans; cells are enough because everything runs on a
//! single thread.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::CleanerConfig;

/// Log through the `log` facade, but only when the debug flag is on.
macro_rules! debug_log {
    ($ctx:expr, $($arg:tt)+) => {
        if $ctx.debug() {
            log::debug!(target: "pr_commit_cleaner", $($arg)+);
        }
    };
}

pub(crate) use debug_log;

#[derive(Debug, Default)]
pub struct SharedFlags {
    squash_active: Cell<bool>,
    values_intercepted: Cell<bool>,
    debug: Cell<bool>,
}

impl SharedFlags {
    /// Has any dialog seen squash selected? Never resets.
    pub fn squash_active(&self) -> bool {
        self.squash_active.get()
    }

    pub fn mark_squash_active(&self) {
        self.squash_active.set(true);
    }

    /// Has the value-write guard installation already run?
    pub fn values_intercepted(&self) -> bool {
        self.values_intercepted.get()
    }

    pub fn mark_values_intercepted(&self) {
        self.values_intercepted.set(true);
    }
}

/// Configuration plus shared flags, cheap to clone into guards and platforms.
#[derive(Clone, Debug)]
pub struct CleanerContext {
    config: Rc<CleanerConfig>,
    flags: Rc<SharedFlags>,
}

impl CleanerContext {
    pub fn new(config: CleanerConfig) -> Self {
        let flags = SharedFlags::default();
        flags.debug.set(config.debug);
        Self {
            config: Rc::new(config),
            flags: Rc::new(flags),
        }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    pub fn flags(&self) -> &Rc<SharedFlags> {
        &self.flags
    }

    pub fn debug(&self) -> bool {
        self.flags.debug.get()
    }

    /// The page may flip its debug flag at any time.
    pub fn set_debug(&self, enabled: bool) {
        self.flags.debug.set(enabled);
    }
}

impl Default for CleanerContext {
    fn default() -> Self {
        Self::new(CleanerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_shared_between_clones() {
        let ctx = CleanerContext::default();
        let other = ctx.clone();
        assert!(!other.flags().squash_active());
        ctx.flags().mark_squash_active();
        assert!(other.flags().squash_active());
    }

    #[test]
    fn debug_follows_config_then_runtime_toggle() {
        let ctx = CleanerContext::new(CleanerConfig {
            debug: true,
            ..CleanerConfig::default()
        });
        assert!(ctx.debug());
        ctx.set_debug(false);
        assert!(!ctx.debug());
    }
}
