//! Stream parser error types.

use thiserror::Error;

use crate::event::{EventId, EventKind, PayloadKind};
use crate::tree::AttachError;

/// Errors that can occur while threading build events into the tree.
///
/// Every one of these is terminal for the current parse: a stream that
/// violates the grammar cannot be trusted to reconstruct a meaningful
/// tree, so nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The record carried no identifier.
    #[error("received build event with no identifier")]
    MissingId,

    /// The payload variant does not match the identifier's kind.
    #[error("\"{kind}\" build event has an incorrect payload type \"{payload}\"")]
    PayloadTypeMismatch {
        /// Kind of the identifier.
        kind: EventKind,
        /// Kind of the offending payload.
        payload: PayloadKind,
    },

    /// An identifier was observed that no live parent had announced.
    #[error("event with id {id:?} was not expected")]
    UnexpectedEvent {
        /// The unannounced identifier.
        id: EventId,
    },

    /// More than one parent was registered for a kind that is not
    /// deferred and so cannot have multiple parents.
    #[error("event with id {id:?} cannot have multiple parents")]
    MultipleParentsNotAllowed {
        /// The identifier with multiple registered parents.
        id: EventId,
    },

    /// The same child was announced twice for a kind that is not
    /// deferred.
    #[error("child with id {id:?} was already announced")]
    DuplicateAnnouncement {
        /// The identifier announced twice.
        id: EventId,
    },

    /// The identifier or payload kind is outside the closed set the
    /// grammar understands.
    #[error("received build event of an unknown kind")]
    UnknownEventKind,

    /// The node was announced and well typed, but the grammar rejects it
    /// at this position in the tree.
    #[error("cannot add node with id {id:?}")]
    Attach {
        /// The identifier of the rejected node.
        id: EventId,
        /// The underlying grammar violation.
        #[source]
        source: AttachError,
    },
}
