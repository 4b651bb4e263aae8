//! Tests for the node model: attachment grammar, outcome classification,
//! display sorting and the named-set closure.

use proptest::prelude::*;

use crate::event::{
    AbortReason, Aborted, BuildFinished, BuildStarted, Configuration, ConfigurationId, Fetch,
    FetchId, File, NamedSetId, NamedSetOfFiles, PatternExpanded, PatternId, Progress, ProgressId,
    TargetComplete, TargetCompletedId, TargetConfigured, TargetConfiguredId, TestStatus,
    TestSummary, TestSummaryId,
};

use super::*;

fn build_started() -> BuildStarted {
    BuildStarted {
        uuid: "2b5f3a88-7b0e-4d2f-9c3a-0d5c3a6b1e2f".to_string(),
        start_time_millis: 1_720_000_000_000,
        build_tool_version: "8.2.1".to_string(),
        command: "test".to_string(),
        working_directory: "/workspace".to_string(),
        workspace_directory: "/workspace".to_string(),
    }
}

fn aborted(reason: AbortReason) -> Aborted {
    Aborted {
        reason,
        description: String::new(),
    }
}

fn file(name: &str) -> File {
    File {
        name: name.to_string(),
        uri: format!("bytestream://cas/{name}"),
        digest: None,
        length: None,
    }
}

fn set_id(id: &str) -> NamedSetId {
    NamedSetId { id: id.to_string() }
}

fn configured_id(label: &str) -> TargetConfiguredId {
    TargetConfiguredId {
        label: label.to_string(),
        aspect: String::new(),
    }
}

fn completed_id(label: &str) -> TargetCompletedId {
    TargetCompletedId {
        label: label.to_string(),
        configuration: ConfigurationId {
            id: "cfg".to_string(),
        },
        aspect: String::new(),
    }
}

fn insert_started(tree: &mut Tree) -> StartedRef {
    let r = tree.insert_started(StartedNode::new(build_started()));
    tree.attach(ParentRef::Root, Attachment::Started(r))
        .expect("attach started");
    r
}

fn insert_success_pattern(tree: &mut Tree, patterns: &[&str]) -> PatternRef {
    tree.insert_pattern(PatternNode {
        id: PatternId {
            patterns: patterns.iter().map(ToString::to_string).collect(),
        },
        outcome: PatternOutcome::Success(PatternSuccess {
            payload: PatternExpanded {},
            configuration: None,
            targets_configured: Vec::new(),
            patterns: Vec::new(),
        }),
    })
}

fn insert_configured(
    tree: &mut Tree,
    pattern: PatternRef,
    label: &str,
    outcome: TargetConfiguredOutcome,
) -> TargetConfiguredRef {
    let r = tree.insert_target_configured(TargetConfiguredNode {
        id: configured_id(label),
        outcome,
    });
    tree.attach(ParentRef::Pattern(pattern), Attachment::TargetConfigured(r))
        .expect("attach configured target");
    r
}

fn success_outcome() -> TargetConfiguredOutcome {
    TargetConfiguredOutcome::Success(TargetConfiguredSuccess {
        payload: TargetConfigured {
            target_kind: "cc_test rule".to_string(),
            tags: Vec::new(),
        },
        target_completed: None,
    })
}

fn complete_target(tree: &mut Tree, configured: TargetConfiguredRef, success: bool) {
    let label = tree.target_configured(configured).id.label.clone();
    let r = tree.insert_target_completed(TargetCompletedNode {
        id: completed_id(&label),
        outcome: TargetCompletedOutcome::Success(TargetCompletedSuccess {
            payload: TargetComplete {
                success,
                output_groups: Vec::new(),
                tags: Vec::new(),
            },
            actions_completed: Vec::new(),
            test_results: Vec::new(),
            test_summary: None,
        }),
    });
    tree.attach(
        ParentRef::TargetConfigured(configured),
        Attachment::TargetCompleted(r),
    )
    .expect("attach completed target");
}

mod attachment_grammar {
    use super::*;

    #[test]
    fn root_accepts_exactly_one_started() {
        let mut tree = Tree::default();
        let first = tree.insert_started(StartedNode::new(build_started()));
        assert!(tree
            .attach(ParentRef::Root, Attachment::Started(first))
            .is_ok());
        assert_eq!(tree.root_started(), Some(first));

        let second = tree.insert_started(StartedNode::new(build_started()));
        assert_eq!(
            tree.attach(ParentRef::Root, Attachment::Started(second)),
            Err(AttachError::AlreadySet {
                parent: NodeKind::Root,
                slot: "started",
            })
        );
    }

    #[test]
    fn root_rejects_everything_else() {
        let mut tree = Tree::default();
        let r = tree.insert_progress(ProgressNode::new(
            ProgressId { opaque_count: 0 },
            Progress::default(),
        ));
        assert_eq!(
            tree.attach(ParentRef::Root, Attachment::Progress(r)),
            Err(AttachError::InvalidPlacement {
                parent: NodeKind::Root,
                child: crate::event::EventKind::Progress,
            })
        );
    }

    #[test]
    fn started_build_finished_is_set_once() {
        let mut tree = Tree::default();
        let started = insert_started(&mut tree);

        let finished = |tree: &mut Tree| {
            tree.insert_build_finished(BuildFinishedNode::new(BuildFinished {
                overall_success: true,
                exit_code: 0,
                exit_code_name: "SUCCESS".to_string(),
                finish_time_millis: 1_720_000_060_000,
            }))
        };
        let first = finished(&mut tree);
        assert!(tree
            .attach(ParentRef::Started(started), Attachment::BuildFinished(first))
            .is_ok());

        let second = finished(&mut tree);
        assert_eq!(
            tree.attach(ParentRef::Started(started), Attachment::BuildFinished(second)),
            Err(AttachError::AlreadySet {
                parent: NodeKind::Started,
                slot: "build_finished",
            })
        );
    }

    #[test]
    fn progress_accepts_repeated_fetches() {
        let mut tree = Tree::default();
        let progress = tree.insert_progress(ProgressNode::new(
            ProgressId { opaque_count: 0 },
            Progress::default(),
        ));
        for url in ["https://example.com/a", "https://example.com/b"] {
            let node = FetchNode {
                id: FetchId {
                    url: url.to_string(),
                },
                payload: Fetch { success: true },
            };
            assert!(tree
                .attach(ParentRef::Progress(progress), Attachment::Fetch(node))
                .is_ok());
        }
        assert_eq!(tree.progress(progress).fetches.len(), 2);
    }

    #[test]
    fn aborted_target_configured_rejects_completion() {
        let mut tree = Tree::default();
        let pattern = insert_success_pattern(&mut tree, &["//pkg:all"]);
        let configured = insert_configured(
            &mut tree,
            pattern,
            "//pkg:target",
            TargetConfiguredOutcome::Aborted(AbortedNode {
                payload: aborted(AbortReason::AnalysisFailure),
            }),
        );

        let completed = tree.insert_target_completed(TargetCompletedNode {
            id: completed_id("//pkg:target"),
            outcome: TargetCompletedOutcome::Aborted(TargetCompletedAborted {
                aborted: AbortedNode {
                    payload: aborted(AbortReason::AnalysisFailure),
                },
                unconfigured_labels: Vec::new(),
            }),
        });
        assert_eq!(
            tree.attach(
                ParentRef::TargetConfigured(configured),
                Attachment::TargetCompleted(completed),
            ),
            Err(AttachError::InvalidPlacement {
                parent: NodeKind::TargetConfigured,
                child: crate::event::EventKind::TargetCompleted,
            })
        );
    }

    #[test]
    fn leaf_parents_reject_with_their_kind() {
        let mut tree = Tree::default();
        let node = ConfigurationNode {
            id: ConfigurationId {
                id: "cfg".to_string(),
            },
            payload: Configuration {
                mnemonic: "k8-fastbuild".to_string(),
                platform_name: String::new(),
                cpu: "k8".to_string(),
            },
        };
        let result = tree.attach(
            ParentRef::Leaf(NodeKind::Fetch),
            Attachment::Configuration(node),
        );
        assert_eq!(
            result,
            Err(AttachError::InvalidPlacement {
                parent: NodeKind::Fetch,
                child: crate::event::EventKind::Configuration,
            })
        );
    }

    #[test]
    fn successful_pattern_nests_only_aborted_patterns() {
        let mut tree = Tree::default();
        let parent = insert_success_pattern(&mut tree, &["//..."]);

        let aborted_child = tree.insert_pattern(PatternNode {
            id: PatternId {
                patterns: vec!["//skipped/...".to_string()],
            },
            outcome: PatternOutcome::Aborted(AbortedNode {
                payload: aborted(AbortReason::Skipped),
            }),
        });
        assert!(tree
            .attach(ParentRef::Pattern(parent), Attachment::Pattern(aborted_child))
            .is_ok());

        let success_child = insert_success_pattern(&mut tree, &["//other/..."]);
        assert_eq!(
            tree.attach(ParentRef::Pattern(parent), Attachment::Pattern(success_child)),
            Err(AttachError::InvalidPlacement {
                parent: NodeKind::Pattern,
                child: crate::event::EventKind::Pattern,
            })
        );
    }

    #[test]
    fn aborted_pattern_rejects_all_children() {
        let mut tree = Tree::default();
        let parent = tree.insert_pattern(PatternNode {
            id: PatternId {
                patterns: vec!["//...".to_string()],
            },
            outcome: PatternOutcome::Aborted(AbortedNode {
                payload: aborted(AbortReason::UserInterrupted),
            }),
        });
        let configured = tree.insert_target_configured(TargetConfiguredNode {
            id: configured_id("//pkg:target"),
            outcome: success_outcome(),
        });
        assert_eq!(
            tree.attach(
                ParentRef::Pattern(parent),
                Attachment::TargetConfigured(configured),
            ),
            Err(AttachError::InvalidPlacement {
                parent: NodeKind::Pattern,
                child: crate::event::EventKind::TargetConfigured,
            })
        );
    }
}

mod outcome_classification {
    use super::*;

    #[test]
    fn user_interrupted_abort_is_not_a_failure() {
        let mut tree = Tree::default();
        let pattern = tree.insert_pattern(PatternNode {
            id: PatternId {
                patterns: vec!["//...".to_string()],
            },
            outcome: PatternOutcome::Aborted(AbortedNode {
                payload: aborted(AbortReason::UserInterrupted),
            }),
        });
        assert!(!tree.pattern_is_failure(pattern));
        assert!(!tree.pattern_is_success(pattern));
    }

    #[test]
    fn analysis_failure_abort_is_a_failure() {
        let mut tree = Tree::default();
        let pattern = insert_success_pattern(&mut tree, &["//..."]);
        let configured = insert_configured(
            &mut tree,
            pattern,
            "//pkg:broken",
            TargetConfiguredOutcome::Aborted(AbortedNode {
                payload: aborted(AbortReason::AnalysisFailure),
            }),
        );
        assert!(tree.target_configured_is_failure(configured));
        assert!(tree.pattern_is_failure(pattern));
    }

    #[test]
    fn unfinished_target_is_neither_failed_nor_succeeded() {
        let mut tree = Tree::default();
        let pattern = insert_success_pattern(&mut tree, &["//..."]);
        let configured =
            insert_configured(&mut tree, pattern, "//pkg:slow", success_outcome());
        assert!(!tree.target_configured_is_failure(configured));
        assert!(!tree.target_configured_is_success(configured));
    }

    #[test]
    fn failing_test_summary_fails_the_target() {
        let mut tree = Tree::default();
        let pattern = insert_success_pattern(&mut tree, &["//..."]);
        let configured =
            insert_configured(&mut tree, pattern, "//pkg:test", success_outcome());

        let completed = tree.insert_target_completed(TargetCompletedNode {
            id: completed_id("//pkg:test"),
            outcome: TargetCompletedOutcome::Success(TargetCompletedSuccess {
                payload: TargetComplete {
                    success: true,
                    output_groups: Vec::new(),
                    tags: Vec::new(),
                },
                actions_completed: Vec::new(),
                test_results: Vec::new(),
                test_summary: Some(TestSummaryNode {
                    id: TestSummaryId {
                        label: "//pkg:test".to_string(),
                        configuration: ConfigurationId {
                            id: "cfg".to_string(),
                        },
                    },
                    outcome: TestSummaryOutcome::Success(TestSummary {
                        overall_status: TestStatus::Failed,
                        total_run_count: 1,
                        passed: Vec::new(),
                        failed: vec![file("test.log")],
                    }),
                }),
            }),
        });
        tree.attach(
            ParentRef::TargetConfigured(configured),
            Attachment::TargetCompleted(completed),
        )
        .expect("attach completed target");

        assert!(tree.target_configured_is_failure(configured));
        assert!(!tree.target_configured_is_success(configured));
        assert!(tree.pattern_is_failure(pattern));
    }

    #[test]
    fn built_and_passed_target_succeeds() {
        let mut tree = Tree::default();
        let pattern = insert_success_pattern(&mut tree, &["//..."]);
        let configured =
            insert_configured(&mut tree, pattern, "//pkg:lib", success_outcome());
        complete_target(&mut tree, configured, true);
        assert!(tree.target_configured_is_success(configured));
        assert!(tree.pattern_is_success(pattern));
        assert!(!tree.pattern_is_failure(pattern));
    }
}

mod display_sort {
    use super::*;

    fn build_mixed_pattern(tree: &mut Tree) -> PatternRef {
        let pattern = insert_success_pattern(tree, &["//..."]);
        // Deliberately out of display order: pending, success, failure.
        insert_configured(tree, pattern, "//pkg:b_pending", success_outcome());
        let ok = insert_configured(tree, pattern, "//pkg:c_ok", success_outcome());
        complete_target(tree, ok, true);
        let failed = insert_configured(tree, pattern, "//pkg:a_failed", success_outcome());
        complete_target(tree, failed, false);
        pattern
    }

    fn labels(tree: &Tree, pattern: PatternRef) -> Vec<String> {
        match &tree.pattern(pattern).outcome {
            PatternOutcome::Success(success) => success
                .targets_configured
                .iter()
                .map(|&r| tree.target_configured(r).id.label.clone())
                .collect(),
            PatternOutcome::Aborted(_) => unreachable!("pattern is successful"),
        }
    }

    #[test]
    fn failures_then_successes_then_pending() {
        let mut tree = Tree::default();
        let pattern = build_mixed_pattern(&mut tree);
        tree.sort_targets_for_display();
        assert_eq!(
            labels(&tree, pattern),
            vec!["//pkg:a_failed", "//pkg:c_ok", "//pkg:b_pending"],
        );
    }

    #[test]
    fn equal_outcomes_order_by_label() {
        let mut tree = Tree::default();
        let pattern = insert_success_pattern(&mut tree, &["//..."]);
        for label in ["//pkg:c", "//pkg:a", "//pkg:b"] {
            let configured = insert_configured(&mut tree, pattern, label, success_outcome());
            complete_target(&mut tree, configured, true);
        }
        tree.sort_targets_for_display();
        assert_eq!(
            labels(&tree, pattern),
            vec!["//pkg:a", "//pkg:b", "//pkg:c"],
        );
    }

    #[test]
    fn sorting_twice_is_idempotent() {
        let mut tree = Tree::default();
        let pattern = build_mixed_pattern(&mut tree);
        tree.sort_targets_for_display();
        let once = labels(&tree, pattern);
        tree.sort_targets_for_display();
        assert_eq!(labels(&tree, pattern), once);
    }
}

mod named_set_closure {
    use super::*;

    fn started_with_sets(sets: &[(&str, &[&str], &[&str])]) -> StartedNode {
        let mut node = StartedNode::new(build_started());
        for (id, files, nested) in sets {
            node.register_named_set(
                set_id(id),
                NamedSetOfFiles {
                    files: files.iter().map(|name| file(name)).collect(),
                    file_sets: nested.iter().map(|nested_id| set_id(nested_id)).collect(),
                },
            );
        }
        node
    }

    #[test]
    fn expands_nested_sets() {
        let node = started_with_sets(&[
            ("0", &["b.out"], &["1"]),
            ("1", &["a.out", "c.out"], &[]),
        ]);
        let files = node.files_for_named_sets(&[set_id("0")]);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.out", "b.out", "c.out"]);
    }

    #[test]
    fn cyclic_sets_terminate() {
        // A lists B as a nested set, and B lists A.
        let node = started_with_sets(&[
            ("a", &["a.out"], &["b"]),
            ("b", &["b.out"], &["a"]),
        ]);
        let files = node.files_for_named_sets(&[set_id("a")]);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.out", "b.out"]);
    }

    #[test]
    fn self_referential_set_terminates() {
        let node = started_with_sets(&[("0", &["x.out"], &["0"])]);
        let files = node.files_for_named_sets(&[set_id("0")]);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn unobserved_sets_are_skipped_silently() {
        let node = started_with_sets(&[("0", &["x.out"], &["never-seen"])]);
        let files = node.files_for_named_sets(&[set_id("0"), set_id("also-missing")]);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x.out"]);
    }

    #[test]
    fn duplicates_across_distinct_sets_are_preserved() {
        // Both sets carry shared.out; the caller sees it twice.
        let node = started_with_sets(&[
            ("0", &["shared.out"], &["1"]),
            ("1", &["shared.out"], &[]),
        ]);
        let files = node.files_for_named_sets(&[set_id("0")]);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["shared.out", "shared.out"]);
    }

    #[test]
    fn set_reachable_through_two_paths_expands_once() {
        let node = started_with_sets(&[
            ("root", &[], &["left", "right"]),
            ("left", &[], &["shared"]),
            ("right", &[], &["shared"]),
            ("shared", &["s.out"], &[]),
        ]);
        let files = node.files_for_named_sets(&[set_id("root")]);
        assert_eq!(files.len(), 1);
    }

    proptest! {
        /// The closure terminates and stays sorted on arbitrary reference
        /// graphs, cyclic or not.
        #[test]
        fn closure_terminates_on_arbitrary_graphs(
            edges in proptest::collection::vec((0u8..16, 0u8..16), 0..64),
            files_per_set in proptest::collection::vec(0u8..16, 0..32),
            roots in proptest::collection::vec(0u8..16, 0..8),
        ) {
            let mut node = StartedNode::new(build_started());
            for set in 0u8..16 {
                let nested: Vec<NamedSetId> = edges
                    .iter()
                    .filter(|(from, _)| *from == set)
                    .map(|(_, to)| set_id(&to.to_string()))
                    .collect();
                let files: Vec<File> = files_per_set
                    .iter()
                    .filter(|&&owner| owner == set)
                    .enumerate()
                    .map(|(i, _)| file(&format!("{set}-{i}.out")))
                    .collect();
                node.register_named_set(
                    set_id(&set.to_string()),
                    NamedSetOfFiles { files, file_sets: nested },
                );
            }
            let root_ids: Vec<NamedSetId> =
                roots.iter().map(|r| set_id(&r.to_string())).collect();
            let files = node.files_for_named_sets(&root_ids);
            prop_assert!(files.windows(2).all(|w| w[0].name <= w[1].name));
        }
    }
}
