//! The build event stream parser.
//!
//! [`StreamParser`] recombines the flat sequence of build events into a
//! tree, based on the parent/child announcements carried by the events
//! themselves. The resulting tree is strongly typed: it can only encode
//! the relationships the build tool actually emits, which makes it
//! suitable for analysis and display.
//!
//! # Architecture
//!
//! ```text
//! Event ──> add_event ──┬─ immediate kinds: pop announcer, attach
//!                       └─ action_completed / pattern: buffer
//!                 ...
//!           finalize ───┬─ attach buffered nodes to all announcers
//!                       ├─ sort configured targets for display
//!                       └─ (started node, outstanding count)
//! ```
//!
//! # Deferral
//!
//! The build tool emits `action_completed` and `pattern` events out of
//! topological order, and both kinds can be claimed by more than one
//! parent (an action by a progress node and a completed target; a pattern
//! by a progress node and another pattern). Buffering those two kinds and
//! resolving them once the full registry is known sidesteps re-entrant
//! attachment during streaming. All other kinds attach the moment they
//! arrive.
//!
//! # Completeness
//!
//! Streams are read incrementally, so `finalize` can be called on a
//! prefix: announcements without a matching event are reported as an
//! outstanding count, not an error.
//!
//! A parser instance is exclusively owned by the consumer driving one
//! build's stream; nothing here is safe to share between threads without
//! external synchronization, and nothing blocks or performs I/O.

mod error;


pub use error::ParseError;

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::debug;

use crate::event::{Event, EventId, EventKind, Payload};
use crate::tree::{
    AbortedNode, ActionCompletedNode, ActionCompletedRef, Attachment, BuildFinishedNode,
    BuildMetricsNode, BuildToolLogsNode, ConfigurationNode, FetchNode, NamedSetNode, NodeKind,
    OptionsParsedNode, ParentRef, PatternNode, PatternOutcome, PatternRef, PatternSuccess,
    ProgressNode, StartedNode, StartedRef, StructuredCommandLineNode, TargetCompletedAborted,
    TargetCompletedNode,
    TargetCompletedOutcome, TargetCompletedSuccess, TargetConfiguredNode,
    TargetConfiguredOutcome, TargetConfiguredSuccess, TestResultNode, TestResultOutcome,
    TestSummaryNode, TestSummaryOutcome, Tree, UnconfiguredLabelNode,
    UnstructuredCommandLineNode, WorkspaceStatusNode,
};

/// Result of draining a stream: the finished tree and its completeness.
#[derive(Debug)]
pub struct ParseOutcome {
    /// The reconstructed tree.
    pub tree: Tree,
    /// The started node at the root, or `None` if no `started` event was
    /// ever ingested.
    pub started: Option<StartedRef>,
    /// Number of announced children that never arrived. Zero means the
    /// tree is structurally complete.
    pub outstanding: usize,
}

/// Reassembles a build event stream into a [`Tree`], one event at a time.
#[derive(Debug)]
pub struct StreamParser {
    tree: Tree,
    /// Announced-but-not-yet-seen identifiers, mapped to every node that
    /// announced them. All kinds but the two deferred ones must have
    /// exactly one announcer here.
    pending: HashMap<EventId, Vec<ParentRef>>,
    deferred_actions_completed: Vec<ActionCompletedRef>,
    deferred_patterns: Vec<PatternRef>,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    /// Creates a parser holding an empty tree. The well-known `started`
    /// identifier is pre-announced by the synthetic root, so the first
    /// event of a well-formed stream is the `started` event.
    #[must_use]
    pub fn new() -> Self {
        let mut pending = HashMap::new();
        pending.insert(EventId::Started, vec![ParentRef::Root]);
        Self {
            tree: Tree::default(),
            pending,
            deferred_actions_completed: Vec::new(),
            deferred_patterns: Vec::new(),
        }
    }

    fn take_single_parent(&mut self, id: &EventId) -> Result<ParentRef, ParseError> {
        let parents = self
            .pending
            .get(id)
            .ok_or_else(|| ParseError::UnexpectedEvent { id: id.clone() })?;
        if parents.len() != 1 {
            return Err(ParseError::MultipleParentsNotAllowed { id: id.clone() });
        }
        let parents = self.pending.remove(id).unwrap_or_default();
        Ok(parents[0])
    }

    fn take_all_parents(&mut self, id: &EventId) -> Result<Vec<ParentRef>, ParseError> {
        self.pending
            .remove(id)
            .ok_or_else(|| ParseError::UnexpectedEvent { id: id.clone() })
    }

    /// Ingests a single build event, attaching it as a leaf to the node
    /// that previously announced it (or buffering it, for the two
    /// deferred kinds).
    ///
    /// # Errors
    ///
    /// Any [`ParseError`]; all of them are fatal to the parse. Ingestion
    /// of an unexpected event leaves the tree untouched.
    #[allow(clippy::too_many_lines)]
    pub fn add_event(&mut self, event: Event) -> Result<(), ParseError> {
        let Event {
            id,
            payload,
            children,
        } = event;
        let id = id.ok_or(ParseError::MissingId)?;
        let payload_kind = payload.kind();
        let key = id.clone();

        // Construct the typed node and attach it (or buffer it), then
        // remember it as the announcer of its children.
        let announcer = match id {
            EventId::Started => {
                let Payload::Started(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::Started,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let r = self.tree.insert_started(StartedNode::new(payload));
                self.attach(parent, Attachment::Started(r), &key)?;
                ParentRef::Started(r)
            },

            EventId::Progress(sub) => {
                let Payload::Progress(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::Progress,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let r = self.tree.insert_progress(ProgressNode::new(sub, payload));
                self.attach(parent, Attachment::Progress(r), &key)?;
                ParentRef::Progress(r)
            },

            EventId::Pattern(sub) => {
                let outcome = match payload {
                    Payload::Expanded(payload) => PatternOutcome::Success(PatternSuccess {
                        payload,
                        configuration: None,
                        targets_configured: Vec::new(),
                        patterns: Vec::new(),
                    }),
                    Payload::Aborted(payload) => PatternOutcome::Aborted(AbortedNode { payload }),
                    _ => {
                        return Err(ParseError::PayloadTypeMismatch {
                            kind: EventKind::Pattern,
                            payload: payload_kind,
                        });
                    },
                };
                let r = self.tree.insert_pattern(PatternNode { id: sub, outcome });
                self.deferred_patterns.push(r);
                debug!(id = ?key, "deferring pattern node to finalize");
                ParentRef::Pattern(r)
            },

            EventId::NamedSet(sub) => {
                let Payload::NamedSetOfFiles(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::NamedSet,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = NamedSetNode {
                    id: sub.clone(),
                    payload: payload.clone(),
                };
                self.attach(parent, Attachment::NamedSet(node), &key)?;
                if let Some(started) = self.tree.root_started() {
                    self.tree.started_mut(started).register_named_set(sub, payload);
                }
                ParentRef::Leaf(NodeKind::NamedSet)
            },

            EventId::Configuration(sub) => {
                let Payload::Configuration(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::Configuration,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = ConfigurationNode { id: sub, payload };
                self.attach(parent, Attachment::Configuration(node), &key)?;
                ParentRef::Leaf(NodeKind::Configuration)
            },

            EventId::TargetConfigured(sub) => {
                let outcome = match payload {
                    Payload::Configured(payload) => {
                        TargetConfiguredOutcome::Success(TargetConfiguredSuccess {
                            payload,
                            target_completed: None,
                        })
                    },
                    Payload::Aborted(payload) => {
                        TargetConfiguredOutcome::Aborted(AbortedNode { payload })
                    },
                    _ => {
                        return Err(ParseError::PayloadTypeMismatch {
                            kind: EventKind::TargetConfigured,
                            payload: payload_kind,
                        });
                    },
                };
                let parent = self.take_single_parent(&key)?;
                let r = self
                    .tree
                    .insert_target_configured(TargetConfiguredNode { id: sub, outcome });
                self.attach(parent, Attachment::TargetConfigured(r), &key)?;
                ParentRef::TargetConfigured(r)
            },

            EventId::TargetCompleted(sub) => {
                let outcome = match payload {
                    Payload::Completed(payload) => {
                        TargetCompletedOutcome::Success(TargetCompletedSuccess {
                            payload,
                            actions_completed: Vec::new(),
                            test_results: Vec::new(),
                            test_summary: None,
                        })
                    },
                    Payload::Aborted(payload) => {
                        TargetCompletedOutcome::Aborted(TargetCompletedAborted {
                            aborted: AbortedNode { payload },
                            unconfigured_labels: Vec::new(),
                        })
                    },
                    _ => {
                        return Err(ParseError::PayloadTypeMismatch {
                            kind: EventKind::TargetCompleted,
                            payload: payload_kind,
                        });
                    },
                };
                let parent = self.take_single_parent(&key)?;
                let r = self
                    .tree
                    .insert_target_completed(TargetCompletedNode { id: sub, outcome });
                self.attach(parent, Attachment::TargetCompleted(r), &key)?;
                ParentRef::TargetCompleted(r)
            },

            EventId::ActionCompleted(sub) => {
                let Payload::Action(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::ActionCompleted,
                        payload: payload_kind,
                    });
                };
                let r = self
                    .tree
                    .insert_action_completed(ActionCompletedNode { id: sub, payload });
                self.deferred_actions_completed.push(r);
                debug!(id = ?key, "deferring action completed node to finalize");
                ParentRef::Leaf(NodeKind::ActionCompleted)
            },

            EventId::TestResult(sub) => {
                let outcome = match payload {
                    Payload::TestResult(payload) => TestResultOutcome::Success(payload),
                    Payload::Aborted(payload) => TestResultOutcome::Aborted(AbortedNode { payload }),
                    _ => {
                        return Err(ParseError::PayloadTypeMismatch {
                            kind: EventKind::TestResult,
                            payload: payload_kind,
                        });
                    },
                };
                let parent = self.take_single_parent(&key)?;
                let node = TestResultNode { id: sub, outcome };
                self.attach(parent, Attachment::TestResult(node), &key)?;
                ParentRef::Leaf(NodeKind::TestResult)
            },

            EventId::TestSummary(sub) => {
                let outcome = match payload {
                    Payload::TestSummary(payload) => TestSummaryOutcome::Success(payload),
                    Payload::Aborted(payload) => {
                        TestSummaryOutcome::Aborted(AbortedNode { payload })
                    },
                    _ => {
                        return Err(ParseError::PayloadTypeMismatch {
                            kind: EventKind::TestSummary,
                            payload: payload_kind,
                        });
                    },
                };
                let parent = self.take_single_parent(&key)?;
                let node = TestSummaryNode { id: sub, outcome };
                self.attach(parent, Attachment::TestSummary(node), &key)?;
                ParentRef::Leaf(NodeKind::TestSummary)
            },

            EventId::Fetch(sub) => {
                let Payload::Fetch(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::Fetch,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = FetchNode { id: sub, payload };
                self.attach(parent, Attachment::Fetch(node), &key)?;
                ParentRef::Leaf(NodeKind::Fetch)
            },

            EventId::OptionsParsed => {
                let Payload::OptionsParsed(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::OptionsParsed,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = OptionsParsedNode { payload };
                self.attach(parent, Attachment::OptionsParsed(node), &key)?;
                ParentRef::Leaf(NodeKind::OptionsParsed)
            },

            EventId::WorkspaceStatus => {
                let Payload::WorkspaceStatus(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::WorkspaceStatus,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = WorkspaceStatusNode { payload };
                self.attach(parent, Attachment::WorkspaceStatus(node), &key)?;
                ParentRef::Leaf(NodeKind::WorkspaceStatus)
            },

            EventId::BuildFinished => {
                let Payload::Finished(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::BuildFinished,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let r = self.tree.insert_build_finished(BuildFinishedNode::new(payload));
                self.attach(parent, Attachment::BuildFinished(r), &key)?;
                ParentRef::BuildFinished(r)
            },

            EventId::BuildToolLogs => {
                let Payload::BuildToolLogs(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::BuildToolLogs,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = BuildToolLogsNode { payload };
                self.attach(parent, Attachment::BuildToolLogs(node), &key)?;
                ParentRef::Leaf(NodeKind::BuildToolLogs)
            },

            EventId::BuildMetrics => {
                let Payload::BuildMetrics(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::BuildMetrics,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = BuildMetricsNode { payload };
                self.attach(parent, Attachment::BuildMetrics(node), &key)?;
                ParentRef::Leaf(NodeKind::BuildMetrics)
            },

            EventId::StructuredCommandLine(sub) => {
                let Payload::StructuredCommandLine(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::StructuredCommandLine,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = StructuredCommandLineNode { id: sub, payload };
                self.attach(parent, Attachment::StructuredCommandLine(node), &key)?;
                ParentRef::Leaf(NodeKind::StructuredCommandLine)
            },

            EventId::UnstructuredCommandLine => {
                let Payload::UnstructuredCommandLine(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::UnstructuredCommandLine,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = UnstructuredCommandLineNode { payload };
                self.attach(parent, Attachment::UnstructuredCommandLine(node), &key)?;
                ParentRef::Leaf(NodeKind::UnstructuredCommandLine)
            },

            EventId::UnconfiguredLabel(sub) => {
                let Payload::Aborted(payload) = payload else {
                    return Err(ParseError::PayloadTypeMismatch {
                        kind: EventKind::UnconfiguredLabel,
                        payload: payload_kind,
                    });
                };
                let parent = self.take_single_parent(&key)?;
                let node = UnconfiguredLabelNode { id: sub, payload };
                self.attach(parent, Attachment::UnconfiguredLabel(node), &key)?;
                ParentRef::Leaf(NodeKind::UnconfiguredLabel)
            },

            EventId::Unknown => return Err(ParseError::UnknownEventKind),
        };

        for child_id in children {
            let deferred = child_id.kind().is_deferred();
            match self.pending.entry(child_id) {
                Entry::Occupied(mut entry) => {
                    if deferred {
                        entry.get_mut().push(announcer);
                    } else {
                        return Err(ParseError::DuplicateAnnouncement {
                            id: entry.key().clone(),
                        });
                    }
                },
                Entry::Vacant(entry) => {
                    entry.insert(vec![announcer]);
                },
            }
        }

        Ok(())
    }

    fn attach(
        &mut self,
        parent: ParentRef,
        child: Attachment,
        id: &EventId,
    ) -> Result<(), ParseError> {
        self.tree
            .attach(parent, child)
            .map_err(|source| ParseError::Attach {
                id: id.clone(),
                source,
            })
    }

    /// Finishes the parse: resolves the deferred nodes against every
    /// parent that announced them, sorts configured targets for display
    /// and reports completeness.
    ///
    /// May be called on a partial stream; announced children that never
    /// arrived are counted in [`ParseOutcome::outstanding`], which is a
    /// signal, not an error.
    ///
    /// # Errors
    ///
    /// Fails when a deferred node was never announced by any parent, or
    /// when attaching it violates the grammar.
    pub fn finalize(mut self) -> Result<ParseOutcome, ParseError> {
        for r in std::mem::take(&mut self.deferred_actions_completed) {
            let key = EventId::ActionCompleted(self.tree.action_completed(r).id.clone());
            let parents = self.take_all_parents(&key)?;
            for parent in parents {
                self.attach(parent, Attachment::ActionCompleted(r), &key)?;
            }
        }
        for r in std::mem::take(&mut self.deferred_patterns) {
            let key = EventId::Pattern(self.tree.pattern(r).id.clone());
            let parents = self.take_all_parents(&key)?;
            for parent in parents {
                self.attach(parent, Attachment::Pattern(r), &key)?;
            }
        }

        self.tree.sort_targets_for_display();

        let outstanding = self.pending.len();
        debug!(outstanding, "finalized build event tree");
        Ok(ParseOutcome {
            started: self.tree.root_started(),
            tree: self.tree,
            outstanding,
        })
    }
}
