//! Serializable view of the engine for diagnostics.

use serde::Serialize;

use crate::registry::{DialogEntry, DialogId};
use crate::state::DialogPhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanerSnapshot {
    /// Format version for consumers of the JSON form.
    pub version: u32,
    pub started: bool,
    pub squash_active: bool,
    pub values_intercepted: bool,
    /// Control kinds whose value writes are guarded.
    pub guarded_kinds: Vec<&'static str>,
    pub now_ms: u64,
    pub pending_timers: usize,
    pub dialogs: Vec<DialogSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogSnapshot {
    pub id: DialogId,
    pub node: String,
    pub phase: DialogPhase,
    pub customize_ensured: bool,
    pub cleaned_once: bool,
    pub squash_detected: bool,
    pub success: bool,
    pub observers: usize,
    pub listeners: usize,
    pub watched_fields: usize,
    pub polling: bool,
    pub debounce_pending: bool,
}

impl CleanerSnapshot {
    pub const VERSION: u32 = 1;

    pub fn to_json(&self) -> String {
        // Every field is a plain value, so serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl DialogSnapshot {
    pub(crate) fn capture(
        node: String,
        entry: &DialogEntry,
        polling: bool,
        debounce_pending: bool,
    ) -> Self {
        let state = &entry.state;
        Self {
            id: entry.id,
            node,
            phase: state.phase(),
            customize_ensured: state.customize_ensured(),
            cleaned_once: state.cleaned_once(),
            squash_detected: state.squash_detected(),
            success: state.success(),
            observers: entry.observers.len(),
            listeners: entry.listeners.len(),
            watched_fields: entry.watched_fields.len(),
            polling,
            debounce_pending,
        }
    }
}
