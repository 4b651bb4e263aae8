//! Typed nodes of the build event tree.
//!
//! One node type per event kind. Nodes that can still gain children after
//! creation, or that may be shared between parents, live in the tree's
//! arenas and are addressed through the typed refs defined in the parent
//! module; everything else is owned directly by its parent's attachment
//! slot.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::event::{
    Aborted, ActionCompletedId, ActionExecuted, BuildFinished, BuildMetrics, BuildStarted,
    BuildToolLogs, Configuration, ConfigurationId, Fetch, FetchId, File, NamedSetId,
    NamedSetOfFiles, OptionsParsed, PatternExpanded, PatternId, Progress, ProgressId,
    StructuredCommandLine, StructuredCommandLineId, TargetComplete, TargetCompletedId,
    TargetConfigured, TargetConfiguredId, TestResult, TestResultId, TestSummary, TestSummaryId,
    UnconfiguredLabelId, UnstructuredCommandLine, WorkspaceStatus,
};

use super::{
    ActionCompletedRef, BuildFinishedRef, PatternRef, ProgressRef, TargetCompletedRef,
    TargetConfiguredRef,
};

/// Kind tag of a node, including the synthetic root. Used in attachment
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NodeKind {
    Root,
    Started,
    Progress,
    Pattern,
    NamedSet,
    Configuration,
    TargetConfigured,
    TargetCompleted,
    ActionCompleted,
    TestResult,
    TestSummary,
    Fetch,
    OptionsParsed,
    WorkspaceStatus,
    BuildFinished,
    BuildToolLogs,
    BuildMetrics,
    StructuredCommandLine,
    UnstructuredCommandLine,
    UnconfiguredLabel,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "root",
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
        };
        f.write_str(name)
    }
}

/// The aborted outcome shared by every node kind that can be aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedNode {
    /// The abort reason and description.
    pub payload: Aborted,
}

impl AbortedNode {
    /// Whether this abort counts as a failure. Answered from the abort
    /// classification alone; an aborted node has no children to consult.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.payload.reason.is_failure()
    }
}

/// The entry point of the build event tree: the invocation itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedNode {
    /// Payload of the `started` event.
    pub payload: BuildStarted,
    /// The end-of-build event. Set once.
    pub build_finished: Option<BuildFinishedRef>,
    /// The parsed options. Set once.
    pub options_parsed: Option<OptionsParsedNode>,
    /// Command line pattern expansions, in resolution order.
    pub patterns: Vec<PatternRef>,
    /// Head of the progress chain. Set once.
    pub progress: Option<ProgressRef>,
    /// Canonicalized command line reports.
    pub structured_command_lines: Vec<StructuredCommandLineNode>,
    /// Verbatim command line reports.
    pub unstructured_command_lines: Vec<UnstructuredCommandLineNode>,
    /// Workspace status. Set once.
    pub workspace_status: Option<WorkspaceStatusNode>,

    // Auxiliary index of every named set seen so far, keyed structurally.
    // Appended to monotonically; never shrinks.
    named_sets: HashMap<NamedSetId, NamedSetOfFiles>,
}

impl StartedNode {
    pub(crate) fn new(payload: BuildStarted) -> Self {
        Self {
            payload,
            build_finished: None,
            options_parsed: None,
            patterns: Vec::new(),
            progress: None,
            structured_command_lines: Vec::new(),
            unstructured_command_lines: Vec::new(),
            workspace_status: None,
            named_sets: HashMap::new(),
        }
    }

    pub(crate) fn register_named_set(&mut self, id: NamedSetId, payload: NamedSetOfFiles) {
        self.named_sets.insert(id, payload);
    }

    /// Looks up a single named set by identifier.
    #[must_use]
    pub fn named_set(&self, id: &NamedSetId) -> Option<&NamedSetOfFiles> {
        self.named_sets.get(id)
    }

    /// Expands the transitive closure of the given named sets into a flat
    /// file list, e.g. to list the files of an output group.
    ///
    /// Sets referenced but never observed in the stream are skipped
    /// silently; output-group listings are optional and an absent set is
    /// not an error. Termination is guaranteed even when the reference
    /// graph is cyclic. The result is sorted by file name. A file reachable
    /// through more than one distinct set appears once per set, matching
    /// how consumers of the protocol treat these lists.
    #[must_use]
    pub fn files_for_named_sets(&self, ids: &[NamedSetId]) -> Vec<File> {
        let mut todo: Vec<&[NamedSetId]> = vec![ids];
        let mut done: HashSet<&NamedSetId> = HashSet::new();
        let mut files: Vec<File> = Vec::new();
        while let Some(batch) = todo.pop() {
            for set_id in batch {
                if done.contains(set_id) {
                    continue;
                }
                if let Some(set) = self.named_sets.get(set_id) {
                    files.extend(set.files.iter().cloned());
                    todo.push(&set.file_sets);
                    done.insert(set_id);
                }
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        files
    }
}

/// A progress update. Progress nodes form a chain, and most other events
/// are announced by one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNode {
    /// Identifier of this progress event.
    pub id: ProgressId,
    /// Payload of the `progress` event.
    pub payload: Progress,
    /// Completed actions announced here. Attached during finalize.
    pub actions_completed: Vec<ActionCompletedRef>,
    /// Build metrics. Set once.
    pub build_metrics: Option<BuildMetricsNode>,
    /// Build tool logs. Set once.
    pub build_tool_logs: Option<BuildToolLogsNode>,
    /// The build configuration. Set once.
    pub configuration: Option<ConfigurationNode>,
    /// Pattern expansions announced here. Attached during finalize.
    pub patterns: Vec<PatternRef>,
    /// External repository fetches.
    pub fetches: Vec<FetchNode>,
    /// Named sets of files.
    pub named_sets: Vec<NamedSetNode>,
    /// The next progress event in the chain. Set once.
    pub progress: Option<ProgressRef>,
}

impl ProgressNode {
    pub(crate) fn new(id: ProgressId, payload: Progress) -> Self {
        Self {
            id,
            payload,
            actions_completed: Vec::new(),
            build_metrics: None,
            build_tool_logs: None,
            configuration: None,
            patterns: Vec::new(),
            fetches: Vec::new(),
            named_sets: Vec::new(),
            progress: None,
        }
    }
}

/// The end of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFinishedNode {
    /// Payload of the `build_finished` event.
    pub payload: BuildFinished,
    /// Build metrics. Set once.
    pub build_metrics: Option<BuildMetricsNode>,
    /// Build tool logs. Set once.
    pub build_tool_logs: Option<BuildToolLogsNode>,
}

impl BuildFinishedNode {
    pub(crate) const fn new(payload: BuildFinished) -> Self {
        Self {
            payload,
            build_metrics: None,
            build_tool_logs: None,
        }
    }
}

/// A command line target pattern expansion. Deferred kind: attached to its
/// parents during finalize, and may be claimed by more than one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternNode {
    /// Identifier of this pattern.
    pub id: PatternId,
    /// Success or aborted outcome.
    pub outcome: PatternOutcome,
}

/// Outcome of a pattern expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternOutcome {
    /// The pattern expanded into targets.
    Success(PatternSuccess),
    /// The expansion was aborted. Terminal: no further attachments.
    Aborted(AbortedNode),
}

/// The happy path of a pattern expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSuccess {
    /// Payload of the `expanded` event.
    pub payload: PatternExpanded,
    /// The configuration the expansion ran under. Set once.
    pub configuration: Option<ConfigurationNode>,
    /// The targets the pattern expanded into. Sorted for display during
    /// finalize: failures first, then successes, then pending, each group
    /// ordered by label.
    pub targets_configured: Vec<TargetConfiguredRef>,
    /// Nested pattern expansions. Only aborted-outcome patterns may attach
    /// here, which keeps the deferred pattern graph acyclic.
    pub patterns: Vec<PatternRef>,
}

/// A target that finished the analysis phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfiguredNode {
    /// Identifier of this configured target.
    pub id: TargetConfiguredId,
    /// Success or aborted outcome.
    pub outcome: TargetConfiguredOutcome,
}

/// Outcome of configuring a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConfiguredOutcome {
    /// The target was configured.
    Success(TargetConfiguredSuccess),
    /// Configuration was aborted. Terminal: no further attachments.
    Aborted(AbortedNode),
}

/// The happy path of a configured target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfiguredSuccess {
    /// Payload of the `configured` event.
    pub payload: TargetConfigured,
    /// The completion of this target. Set once.
    pub target_completed: Option<TargetCompletedRef>,
}

/// A target that finished the execution phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCompletedNode {
    /// Identifier of this completed target.
    pub id: TargetCompletedId,
    /// Success or aborted outcome.
    pub outcome: TargetCompletedOutcome,
}

/// Outcome of completing a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCompletedOutcome {
    /// The target completed.
    Success(TargetCompletedSuccess),
    /// Completion was aborted. Accepts only unconfigured labels.
    Aborted(TargetCompletedAborted),
}

/// The happy path of a completed target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCompletedSuccess {
    /// Payload of the `completed` event.
    pub payload: TargetComplete,
    /// The actions that built this target. Attached during finalize; the
    /// same action may also hang off a progress node.
    pub actions_completed: Vec<ActionCompletedRef>,
    /// Individual test runs of this target.
    pub test_results: Vec<TestResultNode>,
    /// Summary over all test runs. Set once.
    pub test_summary: Option<TestSummaryNode>,
}

/// The aborted outcome of a completed target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCompletedAborted {
    /// The abort itself.
    pub aborted: AbortedNode,
    /// Labels that could not be configured, explaining the abort.
    pub unconfigured_labels: Vec<UnconfiguredLabelNode>,
}

/// A completed build action. Deferred kind: attached to its parents during
/// finalize, and may be claimed by both a progress node and a completed
/// target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCompletedNode {
    /// Identifier of this action.
    pub id: ActionCompletedId,
    /// Payload of the `action` event.
    pub payload: ActionExecuted,
}

/// A single test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResultNode {
    /// Identifier of this test run.
    pub id: TestResultId,
    /// Success or aborted outcome.
    pub outcome: TestResultOutcome,
}

/// Outcome of a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResultOutcome {
    /// The run produced a result.
    Success(TestResult),
    /// The run was aborted.
    Aborted(AbortedNode),
}

/// A summary over all test runs of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSummaryNode {
    /// Identifier of this summary.
    pub id: TestSummaryId,
    /// Success or aborted outcome.
    pub outcome: TestSummaryOutcome,
}

/// Outcome of a test summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSummaryOutcome {
    /// The summary was reported.
    Success(TestSummary),
    /// The summary was aborted.
    Aborted(AbortedNode),
}

impl TestSummaryNode {
    /// Whether the summarized test target failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        match &self.outcome {
            TestSummaryOutcome::Success(payload) => payload.overall_status.is_failure(),
            TestSummaryOutcome::Aborted(aborted) => aborted.is_failure(),
        }
    }

    /// Whether the summarized test target passed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        match &self.outcome {
            TestSummaryOutcome::Success(payload) => {
                matches!(payload.overall_status, crate::event::TestStatus::Passed)
            },
            TestSummaryOutcome::Aborted(_) => false,
        }
    }
}

/// A label that could not be configured. Always carries an abort payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconfiguredLabelNode {
    /// Identifier of the label.
    pub id: UnconfiguredLabelId,
    /// The abort payload explaining why configuration failed.
    pub payload: Aborted,
}

/// A build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationNode {
    /// Identifier of the configuration.
    pub id: ConfigurationId,
    /// Payload of the `configuration` event.
    pub payload: Configuration,
}

/// An external repository fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchNode {
    /// Identifier of the fetch.
    pub id: FetchId,
    /// Payload of the `fetch` event.
    pub payload: Fetch,
}

/// A named set of files. The set is also recorded in the started node's
/// index, which is what the closure expansion reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSetNode {
    /// Identifier of the set.
    pub id: NamedSetId,
    /// Payload of the `named_set_of_files` event.
    pub payload: NamedSetOfFiles,
}

/// The parsed startup and command options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsParsedNode {
    /// Payload of the `options_parsed` event.
    pub payload: OptionsParsed,
}

/// A canonicalized command line report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredCommandLineNode {
    /// Identifier of the report.
    pub id: StructuredCommandLineId,
    /// Payload of the `structured_command_line` event.
    pub payload: StructuredCommandLine,
}

/// The verbatim command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstructuredCommandLineNode {
    /// Payload of the `unstructured_command_line` event.
    pub payload: UnstructuredCommandLine,
}

/// The workspace status key/value pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceStatusNode {
    /// Payload of the `workspace_status` event.
    pub payload: WorkspaceStatus,
}

/// Aggregate metrics for the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMetricsNode {
    /// Payload of the `build_metrics` event.
    pub payload: BuildMetrics,
}

/// Log files produced by the build tool itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildToolLogsNode {
    /// Payload of the `build_tool_logs` event.
    pub payload: BuildToolLogs,
}
