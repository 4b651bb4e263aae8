//! Build event identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the configuration a target or action was built under.
///
/// Nested inside several other identifiers, mirroring how the Build Event
/// Protocol scopes targets and actions to a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurationId {
    /// Opaque configuration checksum assigned by the build tool.
    pub id: String,
}

/// Identifier of a progress event, numbered in stream order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressId {
    /// Invocation-relative sequence number of this progress event.
    pub opaque_count: i32,
}

/// Identifier of a target pattern expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternId {
    /// The patterns given on the command line, e.g. `//foo/...`.
    pub patterns: Vec<String>,
}

/// Identifier of a named set of files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedSetId {
    /// Opaque identifier, unique within one invocation.
    pub id: String,
}

/// Identifier of a target configuration event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetConfiguredId {
    /// The label of the configured target.
    pub label: String,
    /// The aspect applied to the target, or empty for the target itself.
    #[serde(default)]
    pub aspect: String,
}

/// Identifier of a target completion event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetCompletedId {
    /// The label of the completed target.
    pub label: String,
    /// The configuration the target was built under.
    pub configuration: ConfigurationId,
    /// The aspect applied to the target, or empty for the target itself.
    #[serde(default)]
    pub aspect: String,
}

/// Identifier of a completed build action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionCompletedId {
    /// The label of the target owning the action.
    pub label: String,
    /// The configuration the action ran under.
    pub configuration: ConfigurationId,
    /// Path of the action's primary output, distinguishing actions of
    /// the same target.
    pub primary_output: String,
}

/// Identifier of a single test run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestResultId {
    /// The label of the test target.
    pub label: String,
    /// The configuration the test ran under.
    pub configuration: ConfigurationId,
    /// One-based run number.
    pub run: i32,
    /// One-based shard number.
    pub shard: i32,
    /// One-based attempt number.
    pub attempt: i32,
}

/// Identifier of a test summary covering all runs of a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestSummaryId {
    /// The label of the test target.
    pub label: String,
    /// The configuration the test ran under.
    pub configuration: ConfigurationId,
}

/// Identifier of an external repository fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchId {
    /// The URL being fetched.
    pub url: String,
}

/// Identifier of a structured command line report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredCommandLineId {
    /// Which command line this is, e.g. `canonical` or `original`.
    pub command_line_label: String,
}

/// Identifier of a label that could not be configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnconfiguredLabelId {
    /// The label that failed to configure.
    pub label: String,
}

/// Identifies which logical thing a build event record or announcement
/// refers to.
///
/// This is a closed union: one case per event kind understood by the
/// grammar. Equality and hashing are structural over the discriminating
/// fields, so an `EventId` can be used directly as a registry key without
/// any canonical text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventId {
    /// The build invocation itself. Well known: the root announces it.
    Started,
    /// A progress update.
    Progress(ProgressId),
    /// A command line target pattern expansion.
    Pattern(PatternId),
    /// A reusable named set of files.
    NamedSet(NamedSetId),
    /// A build configuration.
    Configuration(ConfigurationId),
    /// A target that finished the analysis phase.
    TargetConfigured(TargetConfiguredId),
    /// A target that finished the execution phase.
    TargetCompleted(TargetCompletedId),
    /// A completed build action.
    ActionCompleted(ActionCompletedId),
    /// A single test run.
    TestResult(TestResultId),
    /// A summary over all test runs of a target.
    TestSummary(TestSummaryId),
    /// An external repository fetch.
    Fetch(FetchId),
    /// The parsed startup and command options.
    OptionsParsed,
    /// The workspace status key/value pairs.
    WorkspaceStatus,
    /// The end of the build.
    BuildFinished,
    /// Log files produced by the build tool itself.
    BuildToolLogs,
    /// Aggregate metrics for the build.
    BuildMetrics,
    /// A canonicalized command line report.
    StructuredCommandLine(StructuredCommandLineId),
    /// The verbatim command line.
    UnstructuredCommandLine,
    /// A label that could not be configured.
    UnconfiguredLabel(UnconfiguredLabelId),
    /// An event kind outside the closed set. Decoders map unrecognized
    /// identifiers here; the parser rejects them.
    Unknown,
}

impl EventId {
    /// Returns the kind tag of this identifier.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Started => EventKind::Started,
            Self::Progress(_) => EventKind::Progress,
            Self::Pattern(_) => EventKind::Pattern,
            Self::NamedSet(_) => EventKind::NamedSet,
            Self::Configuration(_) => EventKind::Configuration,
            Self::TargetConfigured(_) => EventKind::TargetConfigured,
            Self::TargetCompleted(_) => EventKind::TargetCompleted,
            Self::ActionCompleted(_) => EventKind::ActionCompleted,
            Self::TestResult(_) => EventKind::TestResult,
            Self::TestSummary(_) => EventKind::TestSummary,
            Self::Fetch(_) => EventKind::Fetch,
            Self::OptionsParsed => EventKind::OptionsParsed,
            Self::WorkspaceStatus => EventKind::WorkspaceStatus,
            Self::BuildFinished => EventKind::BuildFinished,
            Self::BuildToolLogs => EventKind::BuildToolLogs,
            Self::BuildMetrics => EventKind::BuildMetrics,
            Self::StructuredCommandLine(_) => EventKind::StructuredCommandLine,
            Self::UnstructuredCommandLine => EventKind::UnstructuredCommandLine,
            Self::UnconfiguredLabel(_) => EventKind::UnconfiguredLabel,
            Self::Unknown => EventKind::Unknown,
        }
    }
}

/// Fieldless kind tag for an [`EventId`], used in diagnostics and for the
/// immediate-attach versus deferred-attach split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`EventId::Started`].
    Started,
    /// See [`EventId::Progress`].
    Progress,
    /// See [`EventId::Pattern`].
    Pattern,
    /// See [`EventId::NamedSet`].
    NamedSet,
    /// See [`EventId::Configuration`].
    Configuration,
    /// See [`EventId::TargetConfigured`].
    TargetConfigured,
    /// See [`EventId::TargetCompleted`].
    TargetCompleted,
    /// See [`EventId::ActionCompleted`].
    ActionCompleted,
    /// See [`EventId::TestResult`].
    TestResult,
    /// See [`EventId::TestSummary`].
    TestSummary,
    /// See [`EventId::Fetch`].
    Fetch,
    /// See [`EventId::OptionsParsed`].
    OptionsParsed,
    /// See [`EventId::WorkspaceStatus`].
    WorkspaceStatus,
    /// See [`EventId::BuildFinished`].
    BuildFinished,
    /// See [`EventId::BuildToolLogs`].
    BuildToolLogs,
    /// See [`EventId::BuildMetrics`].
    BuildMetrics,
    /// See [`EventId::StructuredCommandLine`].
    StructuredCommandLine,
    /// See [`EventId::UnstructuredCommandLine`].
    UnstructuredCommandLine,
    /// See [`EventId::UnconfiguredLabel`].
    UnconfiguredLabel,
    /// See [`EventId::Unknown`].
    Unknown,
}

impl EventKind {
    /// Returns `true` for the kinds whose attachment is postponed to the
    /// finalize pass.
    ///
    /// The build tool emits these two kinds out of topological order, and
    /// they may have more than one legitimate parent.
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::ActionCompleted | Self::Pattern)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Progress => "progress",
            Self::Pattern => "pattern",
            Self::NamedSet => "named_set",
            Self::Configuration => "configuration",
            Self::TargetConfigured => "target_configured",
            Self::TargetCompleted => "target_completed",
            Self::ActionCompleted => "action_completed",
            Self::TestResult => "test_result",
            Self::TestSummary => "test_summary",
            Self::Fetch => "fetch",
            Self::OptionsParsed => "options_parsed",
            Self::WorkspaceStatus => "workspace_status",
            Self::BuildFinished => "build_finished",
            Self::BuildToolLogs => "build_tool_logs",
            Self::BuildMetrics => "build_metrics",
            Self::StructuredCommandLine => "structured_command_line",
            Self::UnstructuredCommandLine => "unstructured_command_line",
            Self::UnconfiguredLabel => "unconfigured_label",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_construction_path() {
        let a = EventId::TargetCompleted(TargetCompletedId {
            label: "//pkg:target".to_string(),
            configuration: ConfigurationId {
                id: "cfg-1".to_string(),
            },
            aspect: String::new(),
        });
        let mut id = TargetCompletedId {
            label: String::new(),
            configuration: ConfigurationId { id: String::new() },
            aspect: String::new(),
        };
        id.configuration.id.push_str("cfg-1");
        id.label.push_str("//pkg:target");
        let b = EventId::TargetCompleted(id);
        assert_eq!(a, b);

        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn distinct_fields_are_distinct_keys() {
        let a = EventId::NamedSet(NamedSetId {
            id: "0".to_string(),
        });
        let b = EventId::NamedSet(NamedSetId {
            id: "1".to_string(),
        });
        assert_ne!(a, b);
    }

    #[test]
    fn only_actions_and_patterns_are_deferred() {
        assert!(EventKind::ActionCompleted.is_deferred());
        assert!(EventKind::Pattern.is_deferred());
        assert!(!EventKind::Started.is_deferred());
        assert!(!EventKind::TargetCompleted.is_deferred());
        assert!(!EventKind::NamedSet.is_deferred());
    }

    #[test]
    fn kind_display_names() {
        assert_eq!(EventKind::Started.to_string(), "started");
        assert_eq!(EventKind::ActionCompleted.to_string(), "action_completed");
        assert_eq!(
            EventKind::UnstructuredCommandLine.to_string(),
            "unstructured_command_line"
        );
    }
}
