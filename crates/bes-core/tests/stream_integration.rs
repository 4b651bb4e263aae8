//! End-to-end test over a JSON-decoded build event stream.
//!
//! Exercises the public surface the way a consumer of Bazel's
//! `--build_event_json_file` output would: decode each record with serde,
//! feed it to the parser in stream order and inspect the finished tree.

use bes_core::event::Event;
use bes_core::parser::ParseOutcome;
use bes_core::tree::{
    PatternOutcome, TargetCompletedOutcome, TargetConfiguredOutcome,
};
use bes_core::StreamParser;

fn parse_stream(json: &str) -> ParseOutcome {
    let events: Vec<Event> = serde_json::from_str(json).expect("stream decodes");
    let mut parser = StreamParser::new();
    for event in events {
        parser.add_event(event).expect("event accepted");
    }
    parser.finalize().expect("stream finalizes")
}

const STREAM: &str = r#"[
  {
    "id": "started",
    "payload": {
      "started": {
        "uuid": "d5a8e1a2-3f6b-4c1d-9e0f-7b2a4c6d8e0f",
        "start_time_millis": 1720000000000,
        "build_tool_version": "8.2.1",
        "command": "build",
        "working_directory": "/home/user/app",
        "workspace_directory": "/home/user/app"
      }
    },
    "children": [
      {"progress": {"opaque_count": 0}},
      {"pattern": {"patterns": ["//app/..."]}},
      "options_parsed",
      "workspace_status",
      {"structured_command_line": {"command_line_label": "canonical"}},
      "build_finished"
    ]
  },
  {
    "id": "options_parsed",
    "payload": {
      "options_parsed": {
        "cmd_line": ["--config=ci", "--keep_going"]
      }
    }
  },
  {
    "id": "workspace_status",
    "payload": {
      "workspace_status": {
        "items": [
          {"key": "BUILD_SCM_REVISION", "value": "3f9c2b1a"}
        ]
      }
    }
  },
  {
    "id": {"structured_command_line": {"command_line_label": "canonical"}},
    "payload": {
      "structured_command_line": {
        "command_line_label": "canonical",
        "args": ["bazel", "build", "//app/..."]
      }
    }
  },
  {
    "id": {"progress": {"opaque_count": 0}},
    "payload": {"progress": {"stderr": "Loading: 3 packages loaded\n"}},
    "children": [
      {"progress": {"opaque_count": 1}},
      {"configuration": {"id": "cfg-3f9c"}},
      {"named_set": {"id": "0"}},
      {"named_set": {"id": "1"}},
      {
        "action_completed": {
          "label": "//app:app",
          "configuration": {"id": "cfg-3f9c"},
          "primary_output": "bazel-out/k8-fastbuild/bin/app/app"
        }
      }
    ]
  },
  {
    "id": {"configuration": {"id": "cfg-3f9c"}},
    "payload": {
      "configuration": {
        "mnemonic": "k8-fastbuild",
        "platform_name": "linux",
        "cpu": "k8"
      }
    }
  },
  {
    "id": {"named_set": {"id": "1"}},
    "payload": {
      "named_set_of_files": {
        "files": [
          {"name": "app/app", "uri": "bytestream://cas/blobs/9a1f/1024"}
        ]
      }
    }
  },
  {
    "id": {"named_set": {"id": "0"}},
    "payload": {
      "named_set_of_files": {
        "files": [
          {"name": "app/libcore.a", "uri": "bytestream://cas/blobs/4b2e/2048"}
        ],
        "file_sets": [{"id": "1"}]
      }
    }
  },
  {
    "id": {"progress": {"opaque_count": 1}},
    "payload": {"progress": {}}
  },
  {
    "id": {"pattern": {"patterns": ["//app/..."]}},
    "payload": {"expanded": {}},
    "children": [
      {"target_configured": {"label": "//app:app"}},
      {"target_configured": {"label": "//app:broken"}}
    ]
  },
  {
    "id": {"target_configured": {"label": "//app:app"}},
    "payload": {
      "configured": {"target_kind": "cc_binary rule"}
    },
    "children": [
      {
        "target_completed": {
          "label": "//app:app",
          "configuration": {"id": "cfg-3f9c"}
        }
      }
    ]
  },
  {
    "id": {"target_configured": {"label": "//app:broken"}},
    "payload": {
      "aborted": {
        "reason": "ANALYSIS_FAILURE",
        "description": "no such target '//app:missing_dep'"
      }
    }
  },
  {
    "id": {
      "target_completed": {
        "label": "//app:app",
        "configuration": {"id": "cfg-3f9c"}
      }
    },
    "payload": {
      "completed": {
        "success": true,
        "output_groups": [
          {"name": "default", "file_sets": [{"id": "0"}]}
        ]
      }
    },
    "children": [
      {
        "action_completed": {
          "label": "//app:app",
          "configuration": {"id": "cfg-3f9c"},
          "primary_output": "bazel-out/k8-fastbuild/bin/app/app"
        }
      }
    ]
  },
  {
    "id": {
      "action_completed": {
        "label": "//app:app",
        "configuration": {"id": "cfg-3f9c"},
        "primary_output": "bazel-out/k8-fastbuild/bin/app/app"
      }
    },
    "payload": {
      "action": {"success": true, "exit_code": 0}
    }
  },
  {
    "id": "build_finished",
    "payload": {
      "finished": {
        "overall_success": false,
        "exit_code": 1,
        "exit_code_name": "BUILD_FAILURE",
        "finish_time_millis": 1720000042000
      }
    }
  }
]"#;

#[test]
fn reconstructs_a_json_stream_end_to_end() {
    let outcome = parse_stream(STREAM);
    assert_eq!(outcome.outstanding, 0);

    let started = outcome.tree.started(outcome.started.expect("started node"));
    assert_eq!(started.payload.command, "build");
    assert_eq!(started.structured_command_lines.len(), 1);
    let options = started.options_parsed.as_ref().expect("options parsed");
    assert_eq!(options.payload.cmd_line, vec!["--config=ci", "--keep_going"]);
    let status = started.workspace_status.as_ref().expect("workspace status");
    assert_eq!(status.payload.items[0].key, "BUILD_SCM_REVISION");

    let finished = outcome
        .tree
        .build_finished(started.build_finished.expect("build finished"));
    assert!(!finished.payload.overall_success);
    assert_eq!(finished.payload.exit_code_name, "BUILD_FAILURE");

    // The progress chain: two nodes, the first holding the configuration.
    let head = outcome.tree.progress(started.progress.expect("progress"));
    assert!(head.configuration.is_some());
    assert!(head.progress.is_some());
    assert_eq!(head.named_sets.len(), 2);
}

#[test]
fn target_order_and_overall_outcome_reflect_the_failures() {
    let outcome = parse_stream(STREAM);
    let started = outcome.tree.started(outcome.started.expect("started node"));
    let pattern_ref = started.patterns[0];
    let pattern = outcome.tree.pattern(pattern_ref);
    let PatternOutcome::Success(expansion) = &pattern.outcome else {
        panic!("pattern expanded successfully");
    };

    // Sorted for display: the analysis failure precedes the built target.
    let labels: Vec<&str> = expansion
        .targets_configured
        .iter()
        .map(|&r| outcome.tree.target_configured(r).id.label.as_str())
        .collect();
    assert_eq!(labels, vec!["//app:broken", "//app:app"]);

    assert!(outcome.tree.pattern_is_failure(pattern_ref));
    assert!(outcome.tree.pattern_is_success(pattern_ref));
    assert!(outcome
        .tree
        .target_configured_is_failure(expansion.targets_configured[0]));
    assert!(outcome
        .tree
        .target_configured_is_success(expansion.targets_configured[1]));
}

#[test]
fn output_group_files_expand_through_named_sets() {
    let outcome = parse_stream(STREAM);
    let started = outcome.tree.started(outcome.started.expect("started node"));
    let pattern = outcome.tree.pattern(started.patterns[0]);
    let PatternOutcome::Success(expansion) = &pattern.outcome else {
        panic!("pattern expanded successfully");
    };

    // The built target is sorted after the failed one.
    let configured = outcome.tree.target_configured(expansion.targets_configured[1]);
    let TargetConfiguredOutcome::Success(configured) = &configured.outcome else {
        panic!("target configured successfully");
    };
    let completed = outcome
        .tree
        .target_completed(configured.target_completed.expect("completed"));
    let TargetCompletedOutcome::Success(completed) = &completed.outcome else {
        panic!("target completed successfully");
    };

    let group = &completed.payload.output_groups[0];
    assert_eq!(group.name, "default");
    let files = started.files_for_named_sets(&group.file_sets);
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["app/app", "app/libcore.a"]);

    // The action hangs off both the progress node and the completed target.
    let head = outcome.tree.progress(started.progress.expect("progress"));
    assert_eq!(head.actions_completed, completed.actions_completed);
    assert_eq!(completed.actions_completed.len(), 1);
}
