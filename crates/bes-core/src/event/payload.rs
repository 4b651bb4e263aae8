//! Build event payloads.
//!
//! Payload contents are opaque to the parser except for the variant tag,
//! which must match the event's identifier kind, and the abort/test status
//! tables used for failure classification. The field sets mirror the Build
//! Event Protocol messages that downstream renderers consume.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::NamedSetId;

/// A file produced by the build.
///
/// `digest` and `length` form a content reference: resolving them to bytes
/// is an external capability (a content-addressed blob store), never
/// performed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Path of the file, relative to its output group root.
    pub name: String,
    /// Location of the file, e.g. a `bytestream://` URI.
    #[serde(default)]
    pub uri: String,
    /// Cryptographic digest of the file contents, if known.
    #[serde(default)]
    pub digest: Option<String>,
    /// Size of the file in bytes, if known.
    #[serde(default)]
    pub length: Option<i64>,
}

/// Payload of a `started` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStarted {
    /// Unique identifier of the invocation.
    pub uuid: String,
    /// Wall time at which the build started, in milliseconds since epoch.
    pub start_time_millis: i64,
    /// Version of the build tool.
    pub build_tool_version: String,
    /// The command verb, e.g. `build` or `test`.
    pub command: String,
    /// Directory the build tool was invoked from.
    pub working_directory: String,
    /// Root of the workspace being built.
    pub workspace_directory: String,
}

/// Payload of a `progress` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Standard output produced since the previous progress event.
    #[serde(default)]
    pub stdout: String,
    /// Standard error produced since the previous progress event.
    #[serde(default)]
    pub stderr: String,
}

/// Why a part of the build was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortReason {
    /// No reason was given.
    Unknown,
    /// The user interrupted the build.
    UserInterrupted,
    /// The `--noanalyze` flag suppressed analysis.
    NoAnalyze,
    /// The `--nobuild` flag suppressed execution.
    NoBuild,
    /// The build timed out.
    TimeOut,
    /// The remote execution environment failed.
    RemoteEnvironmentFailure,
    /// An internal error in the build tool.
    Internal,
    /// Loading the target failed.
    LoadingFailure,
    /// Analysing the target failed.
    AnalysisFailure,
    /// The target was skipped.
    Skipped,
    /// The build finished before this part completed.
    Incomplete,
    /// The build tool ran out of memory.
    OutOfMemory,
}

impl AbortReason {
    /// Whether this abort represents a failure of the build.
    ///
    /// User-initiated or deliberately skipped work is not a failure;
    /// everything else is.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(
            self,
            Self::Unknown | Self::UserInterrupted | Self::NoAnalyze | Self::NoBuild | Self::Skipped
        )
    }
}

/// Payload of an aborted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aborted {
    /// Classification of the abort.
    pub reason: AbortReason,
    /// Human readable details.
    #[serde(default)]
    pub description: String,
}

/// Payload of a successfully expanded `pattern` event.
///
/// The message carries no data of its own; the interesting structure is in
/// the children the event announces.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternExpanded {}

/// Payload of a successful `target_configured` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfigured {
    /// The rule class of the target, e.g. `cc_library rule`.
    pub target_kind: String,
    /// Tags declared on the target.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A named group of output files within a completed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputGroup {
    /// Name of the output group, e.g. `default`.
    pub name: String,
    /// Named sets holding the group's files. Expanded on demand through
    /// the named-set index on the started node.
    #[serde(default)]
    pub file_sets: Vec<NamedSetId>,
}

/// Payload of a successful `target_completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetComplete {
    /// Whether the target built successfully.
    pub success: bool,
    /// Output files, grouped by output group.
    #[serde(default)]
    pub output_groups: Vec<OutputGroup>,
    /// Tags declared on the target.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Payload of an `action_completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionExecuted {
    /// Whether the action succeeded.
    pub success: bool,
    /// Exit code of the action's command.
    #[serde(default)]
    pub exit_code: i32,
    /// Captured standard output, if any.
    #[serde(default)]
    pub stdout: Option<File>,
    /// Captured standard error, if any.
    #[serde(default)]
    pub stderr: Option<File>,
}

/// Outcome of a test run or of a whole test target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    /// No status was reported.
    NoStatus,
    /// The test passed.
    Passed,
    /// The test passed on retry.
    Flaky,
    /// The test timed out.
    Timeout,
    /// The test failed.
    Failed,
    /// The test did not run to completion.
    Incomplete,
    /// The remote execution environment failed.
    RemoteFailure,
    /// The test executable failed to build.
    FailedToBuild,
    /// The build tool stopped before testing started.
    ToolHaltedBeforeTesting,
}

impl TestStatus {
    /// Whether this status counts as a failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(
            self,
            Self::NoStatus | Self::Passed | Self::ToolHaltedBeforeTesting
        )
    }
}

/// Payload of a successful `test_result` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Outcome of this run.
    pub status: TestStatus,
    /// Whether the result was served from the local cache.
    #[serde(default)]
    pub cached_locally: bool,
    /// Duration of the attempt in milliseconds.
    #[serde(default)]
    pub attempt_duration_millis: i64,
    /// Output files of the run, e.g. `test.log` and `test.xml`.
    #[serde(default)]
    pub test_action_output: Vec<File>,
}

/// Payload of a successful `test_summary` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    /// Outcome over all runs of the target.
    pub overall_status: TestStatus,
    /// Total number of runs.
    #[serde(default)]
    pub total_run_count: i32,
    /// Logs of passed runs.
    #[serde(default)]
    pub passed: Vec<File>,
    /// Logs of failed runs.
    #[serde(default)]
    pub failed: Vec<File>,
}

/// Payload of a `build_finished` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFinished {
    /// Whether the build as a whole succeeded.
    pub overall_success: bool,
    /// Numeric exit code of the invocation.
    pub exit_code: i32,
    /// Symbolic name of the exit code, e.g. `SUCCESS`.
    #[serde(default)]
    pub exit_code_name: String,
    /// Wall time at which the build finished, in milliseconds since epoch.
    pub finish_time_millis: i64,
}

/// Payload of a `build_metrics` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildMetrics {
    /// Number of actions constructed during analysis.
    #[serde(default)]
    pub actions_created: u64,
    /// Number of actions actually executed.
    #[serde(default)]
    pub actions_executed: u64,
    /// Heap size after the build, in bytes.
    #[serde(default)]
    pub used_heap_size_post_build: u64,
    /// Wall time spent in the analysis phase, in milliseconds.
    #[serde(default)]
    pub analysis_phase_time_millis: i64,
}

/// Payload of a `build_tool_logs` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildToolLogs {
    /// Log files produced by the build tool, referenced by digest.
    #[serde(default)]
    pub logs: Vec<File>,
}

/// Payload of a `configuration` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Short name of the configuration, e.g. `k8-fastbuild`.
    pub mnemonic: String,
    /// Name of the target platform.
    #[serde(default)]
    pub platform_name: String,
    /// Target CPU.
    #[serde(default)]
    pub cpu: String,
}

/// Payload of a `fetch` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fetch {
    /// Whether the fetch succeeded.
    pub success: bool,
}

/// Payload of a `named_set` event: a reusable, possibly self-referential
/// collection of files.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamedSetOfFiles {
    /// Files directly contained in this set.
    #[serde(default)]
    pub files: Vec<File>,
    /// Other named sets transitively contained in this set. The reference
    /// graph may contain cycles.
    #[serde(default)]
    pub file_sets: Vec<NamedSetId>,
}

/// Payload of an `options_parsed` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptionsParsed {
    /// Startup options in effect.
    #[serde(default)]
    pub startup_options: Vec<String>,
    /// Startup options given explicitly.
    #[serde(default)]
    pub explicit_startup_options: Vec<String>,
    /// Command options in effect.
    #[serde(default)]
    pub cmd_line: Vec<String>,
    /// Command options given explicitly.
    #[serde(default)]
    pub explicit_cmd_line: Vec<String>,
}

/// Payload of a `structured_command_line` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredCommandLine {
    /// Which command line this is, e.g. `canonical` or `original`.
    pub command_line_label: String,
    /// The command line, one argument per entry.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Payload of an `unstructured_command_line` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnstructuredCommandLine {
    /// The verbatim command line.
    #[serde(default)]
    pub args: Vec<String>,
}

/// One key/value pair of workspace status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceStatusItem {
    /// Status key, e.g. `BUILD_SCM_REVISION`.
    pub key: String,
    /// Status value.
    pub value: String,
}

/// Payload of a `workspace_status` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    /// Reported key/value pairs.
    #[serde(default)]
    pub items: Vec<WorkspaceStatusItem>,
}

/// The type-specific data of one build event.
///
/// The variant must match the event identifier's kind: several identifier
/// kinds additionally accept [`Payload::Aborted`], which selects the
/// aborted outcome of the resulting node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Goes with [`super::EventId::Started`].
    Started(BuildStarted),
    /// Goes with [`super::EventId::Progress`].
    Progress(Progress),
    /// Aborted outcome for pattern, target, test and label events.
    Aborted(Aborted),
    /// Success outcome for [`super::EventId::Pattern`].
    Expanded(PatternExpanded),
    /// Success outcome for [`super::EventId::TargetConfigured`].
    Configured(TargetConfigured),
    /// Success outcome for [`super::EventId::TargetCompleted`].
    Completed(TargetComplete),
    /// Goes with [`super::EventId::ActionCompleted`].
    Action(ActionExecuted),
    /// Success outcome for [`super::EventId::TestResult`].
    TestResult(TestResult),
    /// Success outcome for [`super::EventId::TestSummary`].
    TestSummary(TestSummary),
    /// Goes with [`super::EventId::BuildFinished`].
    Finished(BuildFinished),
    /// Goes with [`super::EventId::BuildMetrics`].
    BuildMetrics(BuildMetrics),
    /// Goes with [`super::EventId::BuildToolLogs`].
    BuildToolLogs(BuildToolLogs),
    /// Goes with [`super::EventId::Configuration`].
    Configuration(Configuration),
    /// Goes with [`super::EventId::Fetch`].
    Fetch(Fetch),
    /// Goes with [`super::EventId::NamedSet`].
    NamedSetOfFiles(NamedSetOfFiles),
    /// Goes with [`super::EventId::OptionsParsed`].
    OptionsParsed(OptionsParsed),
    /// Goes with [`super::EventId::StructuredCommandLine`].
    StructuredCommandLine(StructuredCommandLine),
    /// Goes with [`super::EventId::UnstructuredCommandLine`].
    UnstructuredCommandLine(UnstructuredCommandLine),
    /// Goes with [`super::EventId::WorkspaceStatus`].
    WorkspaceStatus(WorkspaceStatus),
    /// A payload kind outside the closed set.
    Unknown,
}

impl Payload {
    /// Returns the kind tag of this payload.
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Started(_) => PayloadKind::Started,
            Self::Progress(_) => PayloadKind::Progress,
            Self::Aborted(_) => PayloadKind::Aborted,
            Self::Expanded(_) => PayloadKind::Expanded,
            Self::Configured(_) => PayloadKind::Configured,
            Self::Completed(_) => PayloadKind::Completed,
            Self::Action(_) => PayloadKind::Action,
            Self::TestResult(_) => PayloadKind::TestResult,
            Self::TestSummary(_) => PayloadKind::TestSummary,
            Self::Finished(_) => PayloadKind::Finished,
            Self::BuildMetrics(_) => PayloadKind::BuildMetrics,
            Self::BuildToolLogs(_) => PayloadKind::BuildToolLogs,
            Self::Configuration(_) => PayloadKind::Configuration,
            Self::Fetch(_) => PayloadKind::Fetch,
            Self::NamedSetOfFiles(_) => PayloadKind::NamedSetOfFiles,
            Self::OptionsParsed(_) => PayloadKind::OptionsParsed,
            Self::StructuredCommandLine(_) => PayloadKind::StructuredCommandLine,
            Self::UnstructuredCommandLine(_) => PayloadKind::UnstructuredCommandLine,
            Self::WorkspaceStatus(_) => PayloadKind::WorkspaceStatus,
            Self::Unknown => PayloadKind::Unknown,
        }
    }
}

/// Fieldless kind tag for a [`Payload`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PayloadKind {
    Started,
    Progress,
    Aborted,
    Expanded,
    Configured,
    Completed,
    Action,
    TestResult,
    TestSummary,
    Finished,
    BuildMetrics,
    BuildToolLogs,
    Configuration,
    Fetch,
    NamedSetOfFiles,
    OptionsParsed,
    StructuredCommandLine,
    UnstructuredCommandLine,
    WorkspaceStatus,
    Unknown,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Progress => "progress",
            Self::Aborted => "aborted",
            Self::Expanded => "expanded",
            Self::Configured => "configured",
            Self::Completed => "completed",
            Self::Action => "action",
            Self::TestResult => "test_result",
            Self::TestSummary => "test_summary",
            Self::Finished => "finished",
            Self::BuildMetrics => "build_metrics",
            Self::BuildToolLogs => "build_tool_logs",
            Self::Configuration => "configuration",
            Self::Fetch => "fetch",
            Self::NamedSetOfFiles => "named_set_of_files",
            Self::OptionsParsed => "options_parsed",
            Self::StructuredCommandLine => "structured_command_line",
            Self::UnstructuredCommandLine => "unstructured_command_line",
            Self::WorkspaceStatus => "workspace_status",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_reason_failure_classification() {
        // Not failures: user-initiated or deliberately skipped work.
        assert!(!AbortReason::Unknown.is_failure());
        assert!(!AbortReason::UserInterrupted.is_failure());
        assert!(!AbortReason::NoAnalyze.is_failure());
        assert!(!AbortReason::NoBuild.is_failure());
        assert!(!AbortReason::Skipped.is_failure());

        assert!(AbortReason::TimeOut.is_failure());
        assert!(AbortReason::Internal.is_failure());
        assert!(AbortReason::LoadingFailure.is_failure());
        assert!(AbortReason::AnalysisFailure.is_failure());
        assert!(AbortReason::Incomplete.is_failure());
        assert!(AbortReason::OutOfMemory.is_failure());
    }

    #[test]
    fn test_status_failure_classification() {
        assert!(!TestStatus::NoStatus.is_failure());
        assert!(!TestStatus::Passed.is_failure());
        assert!(!TestStatus::ToolHaltedBeforeTesting.is_failure());

        assert!(TestStatus::Flaky.is_failure());
        assert!(TestStatus::Timeout.is_failure());
        assert!(TestStatus::Failed.is_failure());
        assert!(TestStatus::Incomplete.is_failure());
        assert!(TestStatus::RemoteFailure.is_failure());
        assert!(TestStatus::FailedToBuild.is_failure());
    }

    #[test]
    fn payload_kind_matches_variant() {
        let payload = Payload::Fetch(Fetch { success: true });
        assert_eq!(payload.kind(), PayloadKind::Fetch);
        assert_eq!(payload.kind().to_string(), "fetch");
    }
}
