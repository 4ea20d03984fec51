//! Platforms the engine can run on.
//!
//! `memory` is a deterministic in-process document used by tests and headless
//! tooling. `browser` drives a real page through web-sys and is only compiled
//! with the `browser` feature.

pub mod memory;

#[cfg(feature = "browser")]
pub mod browser;
