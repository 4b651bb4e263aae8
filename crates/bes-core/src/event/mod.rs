//! The decoded build event input model.
//!
//! One [`Event`] is one record from a build event stream: an identifier
//! saying which logical thing the record describes, a payload whose variant
//! must match the identifier's kind, and the identifiers of the children
//! the record announces. Wire framing and decoding are the caller's
//! responsibility; every type here derives serde so that Bazel's
//! `--build_event_json_file` output can be mapped onto it directly.

mod id;
mod payload;

pub use id::{
    ActionCompletedId, ConfigurationId, EventId, EventKind, FetchId, NamedSetId, PatternId,
    ProgressId, StructuredCommandLineId, TargetCompletedId, TargetConfiguredId, TestResultId,
    TestSummaryId, UnconfiguredLabelId,
};
pub use payload::{
    Aborted, AbortReason, ActionExecuted, BuildFinished, BuildMetrics, BuildStarted,
    BuildToolLogs, Configuration, Fetch, File, NamedSetOfFiles, OptionsParsed, OutputGroup,
    Payload, PayloadKind, PatternExpanded, Progress, StructuredCommandLine, TargetComplete,
    TargetConfigured, TestResult, TestStatus, TestSummary, UnstructuredCommandLine,
    WorkspaceStatus, WorkspaceStatusItem,
};

use serde::{Deserialize, Serialize};

/// One decoded unit of a build event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// What this record describes. Absent identifiers are rejected at
    /// ingestion with [`crate::parser::ParseError::MissingId`].
    pub id: Option<EventId>,
    /// The type-specific data of the record.
    pub payload: Payload,
    /// Identifiers of the children this record announces, in order.
    #[serde(default)]
    pub children: Vec<EventId>,
}
