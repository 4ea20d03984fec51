use crate::dom::{ControlKind, NodeId};

/// A best-effort document operation failed.
///
/// Callers in the engine log these under the debug flag and move on; the next
/// scheduled pass retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node handle no longer refers to a live node.
    Stale(NodeId),
    /// The operation needs an element but got a text node.
    NotAnElement(NodeId),
    /// The operation needs a text control (input/textarea).
    NotAControl(NodeId),
    /// The host environment threw.
    Host(String),
}

impl std::fmt::Display for DomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomError::Stale(node) => write!(f, "stale node handle {node}"),
            DomError::NotAnElement(node) => write!(f, "{node} is not an element"),
            DomError::NotAControl(node) => write!(f, "{node} is not a text control"),
            DomError::Host(message) => write!(f, "host error: {message}"),
        }
    }
}

impl std::error::Error for DomError {}

/// Installing the value-write guard failed for one control kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessorError {
    /// No native `value` accessor exists for this kind.
    MissingDescriptor(ControlKind),
    /// The native accessor lacks a getter or a setter.
    IncompleteDescriptor(ControlKind),
    /// The host environment threw while patching.
    Host(String),
}

impl std::fmt::Display for AccessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessorError::MissingDescriptor(kind) => {
                write!(f, "no native value accessor for {}", kind.constructor_name())
            }
            AccessorError::IncompleteDescriptor(kind) => {
                write!(f, "native value accessor for {} lacks get/set", kind.constructor_name())
            }
            AccessorError::Host(message) => write!(f, "host error: {message}"),
        }
    }
}

impl std::error::Error for AccessorError {}
