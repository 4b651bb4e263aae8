//! The strongly typed build event tree.
//!
//! # Architecture
//!
//! ```text
//! root ── started ─┬─ progress ── progress ── ...
//!                  ├─ pattern ─┬─ target_configured ── target_completed
//!                  │           └─ pattern (aborted)
//!                  ├─ build_finished ── build_metrics / build_tool_logs
//!                  └─ options_parsed / workspace_status / command lines
//! ```
//!
//! The tree can only encode parent/child relationships the build tool
//! actually emits. [`Tree::attach`] is the single enforcement point: one
//! exhaustive match over (parent kind, child kind) in which every arm not
//! spelled out rejects with [`AttachError::InvalidPlacement`].
//!
//! # Storage
//!
//! Seven node kinds either receive children after they are created or can
//! be claimed by more than one parent. Those live in per-kind arenas on
//! the [`Tree`] and are addressed by cheap `Copy` refs; a deferred node
//! claimed by two parents is the same arena entry reachable through two
//! refs. Every other kind is owned inline by its parent's attachment slot.
//!
//! Refs are only minted by the tree they index into. Accessor methods
//! panic when handed a ref from a different tree; within one parse this
//! cannot happen.

mod error;
mod node;

#[cfg(test)]
mod tests;

pub use error::AttachError;
pub use node::{
    AbortedNode, ActionCompletedNode, BuildFinishedNode, BuildMetricsNode, BuildToolLogsNode,
    ConfigurationNode, FetchNode, NamedSetNode, NodeKind, OptionsParsedNode, PatternNode,
    PatternOutcome, PatternSuccess, ProgressNode, StartedNode, StructuredCommandLineNode,
    TargetCompletedAborted, TargetCompletedNode, TargetCompletedOutcome, TargetCompletedSuccess,
    TargetConfiguredNode, TargetConfiguredOutcome, TargetConfiguredSuccess, TestResultNode,
    TestResultOutcome, TestSummaryNode, TestSummaryOutcome, UnconfiguredLabelNode,
    UnstructuredCommandLineNode, WorkspaceStatusNode,
};

use crate::event::EventKind;

/// Ref to a [`StartedNode`] in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StartedRef(usize);

/// Ref to a [`ProgressNode`] in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressRef(usize);

/// Ref to a [`PatternNode`] in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternRef(usize);

/// Ref to a [`TargetConfiguredNode`] in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetConfiguredRef(usize);

/// Ref to a [`TargetCompletedNode`] in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetCompletedRef(usize);

/// Ref to a [`BuildFinishedNode`] in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildFinishedRef(usize);

/// Ref to an [`ActionCompletedNode`] in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionCompletedRef(usize);

/// A handle to a node in its role as parent: the value stored in the
/// parser's pending registry for every child the node announces.
///
/// `Leaf` covers the kinds without attachment slots. A slot-less node
/// still registers as announcer for the children it claims, so that
/// attaching to it reports [`AttachError::InvalidPlacement`] rather than
/// the child appearing unannounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    /// The synthetic root. Accepts exactly one `started` child.
    Root,
    /// A started node.
    Started(StartedRef),
    /// A progress node.
    Progress(ProgressRef),
    /// A pattern node.
    Pattern(PatternRef),
    /// A configured target.
    TargetConfigured(TargetConfiguredRef),
    /// A completed target.
    TargetCompleted(TargetCompletedRef),
    /// A build finished node.
    BuildFinished(BuildFinishedRef),
    /// A node of a kind with no attachment slots.
    Leaf(NodeKind),
}

/// A newly created node, ready to be attached to its parent. Arena
/// resident kinds attach by ref; leaf kinds attach by value.
#[derive(Debug)]
pub enum Attachment {
    /// A started node, the root's only valid child.
    Started(StartedRef),
    /// A progress node.
    Progress(ProgressRef),
    /// A pattern node.
    Pattern(PatternRef),
    /// A configured target.
    TargetConfigured(TargetConfiguredRef),
    /// A completed target.
    TargetCompleted(TargetCompletedRef),
    /// A build finished node.
    BuildFinished(BuildFinishedRef),
    /// A completed action.
    ActionCompleted(ActionCompletedRef),
    /// Build metrics.
    BuildMetrics(BuildMetricsNode),
    /// Build tool logs.
    BuildToolLogs(BuildToolLogsNode),
    /// A build configuration.
    Configuration(ConfigurationNode),
    /// An external repository fetch.
    Fetch(FetchNode),
    /// A named set of files.
    NamedSet(NamedSetNode),
    /// The parsed options.
    OptionsParsed(OptionsParsedNode),
    /// A canonicalized command line report.
    StructuredCommandLine(StructuredCommandLineNode),
    /// The verbatim command line.
    UnstructuredCommandLine(UnstructuredCommandLineNode),
    /// The workspace status.
    WorkspaceStatus(WorkspaceStatusNode),
    /// A single test run.
    TestResult(TestResultNode),
    /// A test summary.
    TestSummary(TestSummaryNode),
    /// A label that could not be configured.
    UnconfiguredLabel(UnconfiguredLabelNode),
}

impl Attachment {
    /// The event kind of the node being attached.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Started(_) => EventKind::Started,
            Self::Progress(_) => EventKind::Progress,
            Self::Pattern(_) => EventKind::Pattern,
            Self::TargetConfigured(_) => EventKind::TargetConfigured,
            Self::TargetCompleted(_) => EventKind::TargetCompleted,
            Self::BuildFinished(_) => EventKind::BuildFinished,
            Self::ActionCompleted(_) => EventKind::ActionCompleted,
            Self::BuildMetrics(_) => EventKind::BuildMetrics,
            Self::BuildToolLogs(_) => EventKind::BuildToolLogs,
            Self::Configuration(_) => EventKind::Configuration,
            Self::Fetch(_) => EventKind::Fetch,
            Self::NamedSet(_) => EventKind::NamedSet,
            Self::OptionsParsed(_) => EventKind::OptionsParsed,
            Self::StructuredCommandLine(_) => EventKind::StructuredCommandLine,
            Self::UnstructuredCommandLine(_) => EventKind::UnstructuredCommandLine,
            Self::WorkspaceStatus(_) => EventKind::WorkspaceStatus,
            Self::TestResult(_) => EventKind::TestResult,
            Self::TestSummary(_) => EventKind::TestSummary,
            Self::UnconfiguredLabel(_) => EventKind::UnconfiguredLabel,
        }
    }
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    parent: NodeKind,
    name: &'static str,
) -> Result<(), AttachError> {
    if slot.is_some() {
        return Err(AttachError::AlreadySet { parent, slot: name });
    }
    *slot = Some(value);
    Ok(())
}

/// The build event tree under construction, and the finished result.
#[derive(Debug, Default)]
pub struct Tree {
    root_started: Option<StartedRef>,
    started: Vec<StartedNode>,
    progress: Vec<ProgressNode>,
    patterns: Vec<PatternNode>,
    targets_configured: Vec<TargetConfiguredNode>,
    targets_completed: Vec<TargetCompletedNode>,
    finished: Vec<BuildFinishedNode>,
    actions_completed: Vec<ActionCompletedNode>,
}

impl Tree {
    /// The started node attached to the root, if one was ingested.
    #[must_use]
    pub const fn root_started(&self) -> Option<StartedRef> {
        self.root_started
    }

    /// Resolves a started ref.
    #[must_use]
    pub fn started(&self, r: StartedRef) -> &StartedNode {
        &self.started[r.0]
    }

    /// Resolves a progress ref.
    #[must_use]
    pub fn progress(&self, r: ProgressRef) -> &ProgressNode {
        &self.progress[r.0]
    }

    /// Resolves a pattern ref.
    #[must_use]
    pub fn pattern(&self, r: PatternRef) -> &PatternNode {
        &self.patterns[r.0]
    }

    /// Resolves a configured-target ref.
    #[must_use]
    pub fn target_configured(&self, r: TargetConfiguredRef) -> &TargetConfiguredNode {
        &self.targets_configured[r.0]
    }

    /// Resolves a completed-target ref.
    #[must_use]
    pub fn target_completed(&self, r: TargetCompletedRef) -> &TargetCompletedNode {
        &self.targets_completed[r.0]
    }

    /// Resolves a build-finished ref.
    #[must_use]
    pub fn build_finished(&self, r: BuildFinishedRef) -> &BuildFinishedNode {
        &self.finished[r.0]
    }

    /// Resolves a completed-action ref.
    #[must_use]
    pub fn action_completed(&self, r: ActionCompletedRef) -> &ActionCompletedNode {
        &self.actions_completed[r.0]
    }

    pub(crate) fn started_mut(&mut self, r: StartedRef) -> &mut StartedNode {
        &mut self.started[r.0]
    }

    pub(crate) fn insert_started(&mut self, node: StartedNode) -> StartedRef {
        self.started.push(node);
        StartedRef(self.started.len() - 1)
    }

    pub(crate) fn insert_progress(&mut self, node: ProgressNode) -> ProgressRef {
        self.progress.push(node);
        ProgressRef(self.progress.len() - 1)
    }

    pub(crate) fn insert_pattern(&mut self, node: PatternNode) -> PatternRef {
        self.patterns.push(node);
        PatternRef(self.patterns.len() - 1)
    }

    pub(crate) fn insert_target_configured(
        &mut self,
        node: TargetConfiguredNode,
    ) -> TargetConfiguredRef {
        self.targets_configured.push(node);
        TargetConfiguredRef(self.targets_configured.len() - 1)
    }

    pub(crate) fn insert_target_completed(
        &mut self,
        node: TargetCompletedNode,
    ) -> TargetCompletedRef {
        self.targets_completed.push(node);
        TargetCompletedRef(self.targets_completed.len() - 1)
    }

    pub(crate) fn insert_build_finished(&mut self, node: BuildFinishedNode) -> BuildFinishedRef {
        self.finished.push(node);
        BuildFinishedRef(self.finished.len() - 1)
    }

    pub(crate) fn insert_action_completed(
        &mut self,
        node: ActionCompletedNode,
    ) -> ActionCompletedRef {
        self.actions_completed.push(node);
        ActionCompletedRef(self.actions_completed.len() - 1)
    }

    /// Attaches a child to a parent, enforcing the attachment grammar.
    ///
    /// Every (parent, child) combination the build tool emits has an
    /// explicit arm below; anything else is an [`AttachError`].
    #[allow(clippy::too_many_lines)]
    pub fn attach(&mut self, parent: ParentRef, child: Attachment) -> Result<(), AttachError> {
        let child_kind = child.kind();
        match parent {
            ParentRef::Root => match child {
                Attachment::Started(r) => {
                    set_once(&mut self.root_started, r, NodeKind::Root, "started")
                },
                _ => Err(AttachError::InvalidPlacement {
                    parent: NodeKind::Root,
                    child: child_kind,
                }),
            },

            ParentRef::Started(s) => {
                let node = &mut self.started[s.0];
                match child {
                    Attachment::BuildFinished(r) => set_once(
                        &mut node.build_finished,
                        r,
                        NodeKind::Started,
                        "build_finished",
                    ),
                    Attachment::OptionsParsed(n) => set_once(
                        &mut node.options_parsed,
                        n,
                        NodeKind::Started,
                        "options_parsed",
                    ),
                    Attachment::Pattern(r) => {
                        node.patterns.push(r);
                        Ok(())
                    },
                    Attachment::Progress(r) => {
                        set_once(&mut node.progress, r, NodeKind::Started, "progress")
                    },
                    Attachment::StructuredCommandLine(n) => {
                        node.structured_command_lines.push(n);
                        Ok(())
                    },
                    Attachment::UnstructuredCommandLine(n) => {
                        node.unstructured_command_lines.push(n);
                        Ok(())
                    },
                    Attachment::WorkspaceStatus(n) => set_once(
                        &mut node.workspace_status,
                        n,
                        NodeKind::Started,
                        "workspace_status",
                    ),
                    _ => Err(AttachError::InvalidPlacement {
                        parent: NodeKind::Started,
                        child: child_kind,
                    }),
                }
            },

            ParentRef::Progress(p) => {
                let node = &mut self.progress[p.0];
                match child {
                    Attachment::ActionCompleted(r) => {
                        node.actions_completed.push(r);
                        Ok(())
                    },
                    Attachment::BuildMetrics(n) => set_once(
                        &mut node.build_metrics,
                        n,
                        NodeKind::Progress,
                        "build_metrics",
                    ),
                    Attachment::BuildToolLogs(n) => set_once(
                        &mut node.build_tool_logs,
                        n,
                        NodeKind::Progress,
                        "build_tool_logs",
                    ),
                    Attachment::Configuration(n) => set_once(
                        &mut node.configuration,
                        n,
                        NodeKind::Progress,
                        "configuration",
                    ),
                    Attachment::Pattern(r) => {
                        node.patterns.push(r);
                        Ok(())
                    },
                    Attachment::Fetch(n) => {
                        node.fetches.push(n);
                        Ok(())
                    },
                    Attachment::NamedSet(n) => {
                        node.named_sets.push(n);
                        Ok(())
                    },
                    Attachment::Progress(r) => {
                        set_once(&mut node.progress, r, NodeKind::Progress, "progress")
                    },
                    _ => Err(AttachError::InvalidPlacement {
                        parent: NodeKind::Progress,
                        child: child_kind,
                    }),
                }
            },

            ParentRef::BuildFinished(b) => {
                let node = &mut self.finished[b.0];
                match child {
                    Attachment::BuildMetrics(n) => set_once(
                        &mut node.build_metrics,
                        n,
                        NodeKind::BuildFinished,
                        "build_metrics",
                    ),
                    Attachment::BuildToolLogs(n) => set_once(
                        &mut node.build_tool_logs,
                        n,
                        NodeKind::BuildFinished,
                        "build_tool_logs",
                    ),
                    _ => Err(AttachError::InvalidPlacement {
                        parent: NodeKind::BuildFinished,
                        child: child_kind,
                    }),
                }
            },

            ParentRef::Pattern(p) => {
                // Only aborted patterns may nest under a successful one.
                // This keeps the deferred pattern graph acyclic.
                let child_pattern_is_aborted = match &child {
                    Attachment::Pattern(c) => {
                        matches!(self.patterns[c.0].outcome, PatternOutcome::Aborted(_))
                    },
                    _ => false,
                };
                let node = &mut self.patterns[p.0];
                match &mut node.outcome {
                    PatternOutcome::Success(success) => match child {
                        Attachment::Configuration(n) => set_once(
                            &mut success.configuration,
                            n,
                            NodeKind::Pattern,
                            "configuration",
                        ),
                        Attachment::TargetConfigured(r) => {
                            success.targets_configured.push(r);
                            Ok(())
                        },
                        Attachment::Pattern(r) if child_pattern_is_aborted => {
                            success.patterns.push(r);
                            Ok(())
                        },
                        _ => Err(AttachError::InvalidPlacement {
                            parent: NodeKind::Pattern,
                            child: child_kind,
                        }),
                    },
                    PatternOutcome::Aborted(_) => Err(AttachError::InvalidPlacement {
                        parent: NodeKind::Pattern,
                        child: child_kind,
                    }),
                }
            },

            ParentRef::TargetConfigured(t) => {
                let node = &mut self.targets_configured[t.0];
                match &mut node.outcome {
                    TargetConfiguredOutcome::Success(success) => match child {
                        Attachment::TargetCompleted(r) => set_once(
                            &mut success.target_completed,
                            r,
                            NodeKind::TargetConfigured,
                            "target_completed",
                        ),
                        _ => Err(AttachError::InvalidPlacement {
                            parent: NodeKind::TargetConfigured,
                            child: child_kind,
                        }),
                    },
                    TargetConfiguredOutcome::Aborted(_) => Err(AttachError::InvalidPlacement {
                        parent: NodeKind::TargetConfigured,
                        child: child_kind,
                    }),
                }
            },

            ParentRef::TargetCompleted(t) => {
                let node = &mut self.targets_completed[t.0];
                match &mut node.outcome {
                    TargetCompletedOutcome::Success(success) => match child {
                        Attachment::ActionCompleted(r) => {
                            success.actions_completed.push(r);
                            Ok(())
                        },
                        Attachment::TestResult(n) => {
                            success.test_results.push(n);
                            Ok(())
                        },
                        Attachment::TestSummary(n) => set_once(
                            &mut success.test_summary,
                            n,
                            NodeKind::TargetCompleted,
                            "test_summary",
                        ),
                        _ => Err(AttachError::InvalidPlacement {
                            parent: NodeKind::TargetCompleted,
                            child: child_kind,
                        }),
                    },
                    TargetCompletedOutcome::Aborted(aborted) => match child {
                        Attachment::UnconfiguredLabel(n) => {
                            aborted.unconfigured_labels.push(n);
                            Ok(())
                        },
                        _ => Err(AttachError::InvalidPlacement {
                            parent: NodeKind::TargetCompleted,
                            child: child_kind,
                        }),
                    },
                }
            },

            ParentRef::Leaf(kind) => Err(AttachError::InvalidPlacement {
                parent: kind,
                child: child_kind,
            }),
        }
    }

    /// Whether a pattern expansion counts as failed: an aborted expansion
    /// whose abort reason is a failure, or a successful expansion with at
    /// least one failed target.
    #[must_use]
    pub fn pattern_is_failure(&self, r: PatternRef) -> bool {
        match &self.pattern(r).outcome {
            PatternOutcome::Success(success) => success
                .targets_configured
                .iter()
                .any(|&t| self.target_configured_is_failure(t)),
            PatternOutcome::Aborted(aborted) => aborted.is_failure(),
        }
    }

    /// Whether a pattern expansion counts as succeeded: a successful
    /// expansion with at least one succeeded target.
    #[must_use]
    pub fn pattern_is_success(&self, r: PatternRef) -> bool {
        match &self.pattern(r).outcome {
            PatternOutcome::Success(success) => success
                .targets_configured
                .iter()
                .any(|&t| self.target_configured_is_success(t)),
            PatternOutcome::Aborted(_) => false,
        }
    }

    /// Whether a configured target failed, following the completion chain.
    #[must_use]
    pub fn target_configured_is_failure(&self, r: TargetConfiguredRef) -> bool {
        match &self.target_configured(r).outcome {
            TargetConfiguredOutcome::Success(success) => success
                .target_completed
                .is_some_and(|c| self.target_completed_is_failure(c)),
            TargetConfiguredOutcome::Aborted(aborted) => aborted.is_failure(),
        }
    }

    /// Whether a configured target succeeded. A target that never
    /// completed is neither failed nor succeeded.
    #[must_use]
    pub fn target_configured_is_success(&self, r: TargetConfiguredRef) -> bool {
        match &self.target_configured(r).outcome {
            TargetConfiguredOutcome::Success(success) => success
                .target_completed
                .is_some_and(|c| self.target_completed_is_success(c)),
            TargetConfiguredOutcome::Aborted(_) => false,
        }
    }

    /// Whether a completed target failed: the build failed, or the tests
    /// summarized as failed.
    #[must_use]
    pub fn target_completed_is_failure(&self, r: TargetCompletedRef) -> bool {
        match &self.target_completed(r).outcome {
            TargetCompletedOutcome::Success(success) => {
                !success.payload.success
                    || success.test_summary.as_ref().is_some_and(|s| s.is_failure())
            },
            TargetCompletedOutcome::Aborted(aborted) => aborted.aborted.is_failure(),
        }
    }

    /// Whether a completed target succeeded: the build succeeded and the
    /// tests, if any, passed.
    #[must_use]
    pub fn target_completed_is_success(&self, r: TargetCompletedRef) -> bool {
        match &self.target_completed(r).outcome {
            TargetCompletedOutcome::Success(success) => {
                success.payload.success
                    && success.test_summary.as_ref().is_none_or(|s| s.is_success())
            },
            TargetCompletedOutcome::Aborted(_) => false,
        }
    }

    fn target_display_order(&self, r: TargetConfiguredRef) -> u8 {
        if self.target_configured_is_failure(r) {
            0
        } else if self.target_configured_is_success(r) {
            1
        } else {
            2
        }
    }

    /// Sorts the configured targets under each successful pattern for
    /// display: failures first, then successes, then targets still
    /// pending, each group ordered by label.
    ///
    /// Pure post-processing over the already built tree. The sort is
    /// stable and idempotent; running it again yields the same order.
    pub fn sort_targets_for_display(&mut self) {
        for index in 0..self.patterns.len() {
            let mut refs = match &self.patterns[index].outcome {
                PatternOutcome::Success(success) => success.targets_configured.clone(),
                PatternOutcome::Aborted(_) => continue,
            };
            refs.sort_by(|&a, &b| {
                self.target_display_order(a)
                    .cmp(&self.target_display_order(b))
                    .then_with(|| {
                        self.target_configured(a)
                            .id
                            .label
                            .cmp(&self.target_configured(b).id.label)
                    })
            });
            if let PatternOutcome::Success(success) = &mut self.patterns[index].outcome {
                success.targets_configured = refs;
            }
        }
    }
}
