//! Stream-to-tree reconstruction for Bazel's Build Event Protocol.
//!
//! A build invocation publishes a flat, append-only sequence of typed
//! event records. Each record announces the identifiers of its children,
//! and this crate reassembles the sequence into a strongly typed tree
//! mirroring the logical structure of the build: start, target
//! configuration, action execution, test results, finish, metrics.
//!
//! # Architecture
//!
//! ```text
//! decoded events ──> StreamParser::add_event (one per record, in order)
//!                              |
//!                              v
//!                    StreamParser::finalize
//!                              |
//!                              v
//!            ParseOutcome { tree, started, outstanding }
//! ```
//!
//! # Key Concepts
//!
//! - **[`event::Event`]**: one decoded record: identifier, payload,
//!   announced children. Decoding the wire framing is the caller's job.
//! - **[`event::EventId`]**: structural key saying which logical thing a
//!   record or announcement refers to.
//! - **[`tree::Tree`]**: the reconstructed tree. Attachment is grammar
//!   checked: only parent/child combinations the build tool emits are
//!   representable.
//! - **Deferred kinds**: `action_completed` and `pattern` events arrive
//!   out of topological order and may have several parents; they are
//!   buffered and resolved during finalize.
//!
//! # Example
//!
//! ```rust
//! use bes_core::event::{BuildStarted, Event, EventId, Payload};
//! use bes_core::parser::StreamParser;
//!
//! let mut parser = StreamParser::new();
//! parser.add_event(Event {
//!     id: Some(EventId::Started),
//!     payload: Payload::Started(BuildStarted {
//!         uuid: "7ac0cf94".to_string(),
//!         start_time_millis: 1_720_000_000_000,
//!         build_tool_version: "8.2.1".to_string(),
//!         command: "build".to_string(),
//!         working_directory: "/home/user/project".to_string(),
//!         workspace_directory: "/home/user/project".to_string(),
//!     }),
//!     children: vec![EventId::BuildFinished],
//! })?;
//! let outcome = parser.finalize()?;
//! assert!(outcome.started.is_some());
//! assert_eq!(outcome.outstanding, 1); // build_finished never arrived
//! # Ok::<(), bes_core::parser::ParseError>(())
//! ```
//!
//! The parser performs no I/O and owns no background resources; a parser
//! instance belongs to the consumer driving a single build's stream.

pub mod event;
pub mod parser;
pub mod tree;

pub use event::{Event, EventId, Payload};
pub use parser::{ParseError, ParseOutcome, StreamParser};
pub use tree::Tree;
