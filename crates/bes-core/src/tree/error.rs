//! Attachment grammar errors.

use thiserror::Error;

use crate::event::EventKind;

use super::node::NodeKind;

/// Why a child node could not be attached to a parent node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AttachError {
    /// This parent does not accept this child kind, or does not accept it
    /// in the parent's current outcome.
    #[error("a \"{child}\" node cannot be placed under a \"{parent}\" node")]
    InvalidPlacement {
        /// Kind of the rejecting parent.
        parent: NodeKind,
        /// Kind of the rejected child.
        child: EventKind,
    },

    /// A set-once slot already holds a value.
    #[error("the \"{slot}\" slot of a \"{parent}\" node is already set")]
    AlreadySet {
        /// Kind of the parent owning the slot.
        parent: NodeKind,
        /// Name of the slot.
        slot: &'static str,
    },
}
