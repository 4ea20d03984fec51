//! Squash-merge commit message cleaner.
//!
//! Watches a host application's pull request completion dialog and strips the
//! generated `Merged PR 123:` prefix from its commit message surfaces. The
//! engine ([`Cleaner`]) only talks to the page through the [`dom::Document`]
//! capability, so it runs unchanged over the in-memory platform used by tests
//! and over the real browser document (feature `browser`).

pub mod accessor;
pub mod config;
pub mod context;
pub mod dom;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod platform;
pub mod prefix;
pub mod registry;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod strategy;
pub mod surfaces;
pub mod target;
pub mod watcher;

pub use config::{CleanerConfig, InterceptPolicy};
pub use engine::{Cleaner, Message};
pub use prefix::{PrefixPattern, clean};
