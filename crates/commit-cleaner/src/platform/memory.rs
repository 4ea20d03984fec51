//! In-memory document and a headless page driver.
//!
//! `MemoryDom` keeps just enough of the DOM's behaviour for the engine to be
//! exercised end to end: selector queries, text and values, per-kind value
//! accessors, capture/target/bubble event propagation, batched mutation
//! observers, the default activation of checkbox-role elements and page
//! visibility. `Page` owns a `MemoryDom` and a `Cleaner` and delivers queued
//! work to the engine on a virtual clock.

mod dom;
mod page;

pub use dom::{Markup, MemoryDom};
pub use page::Page;
