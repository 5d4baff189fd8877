//! Integration tests for Task operations via CLI.
//!
//! These tests verify that task commands work correctly through the CLI:
//! - `crew task create/show/list/children/update/close/delete` all work
//! - Scope (repo + branch) partitions listings
//! - Delete cascades over the whole subtree
//! - JSON and human-readable output formats are correct

mod common;

use common::TestEnv;
use predicates::prelude::*;

fn create(env: &TestEnv, args: &[&str]) -> String {
    let mut full = vec!["task", "create"];
    full.extend_from_slice(args);
    env.json(&full)["id"].as_str().unwrap().to_string()
}

// === Create Tests ===

#[test]
fn test_task_create_json() {
    let env = TestEnv::new();

    env.crew()
        .args(["task", "create", "My first task"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\":\"t-"))
        .stdout(predicate::str::contains("\"title\":\"My first task\""));
}

#[test]
fn test_task_create_human() {
    let env = TestEnv::new();

    env.crew()
        .args(["task", "create", "My first task", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created task t-"));
}

#[test]
fn test_task_create_empty_title_fails() {
    let env = TestEnv::new();

    env.crew()
        .args(["task", "create", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("title cannot be empty"));
}

#[test]
fn test_task_create_with_missing_parent_fails() {
    let env = TestEnv::new();

    env.crew()
        .args(["task", "create", "Orphan", "--parent", "t-0000", "-H"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: "));

    let list = env.json(&["task", "list"]);
    assert_eq!(list["count"], 0);
}

#[test]
fn test_task_create_cross_branch_parent_fails() {
    let env = TestEnv::new();
    let parent = create(&env, &["On main"]);

    env.crew()
        .args(["--branch", "dev", "task", "create", "On dev", "--parent", &parent])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));

    let children = env.json(&["task", "children", &parent]);
    assert_eq!(children["count"], 0);
}

// === Show / List Tests ===

#[test]
fn test_task_show_includes_child_count() {
    let env = TestEnv::new();
    let root = create(&env, &["Root", "--notes", "top level"]);
    create(&env, &["Child", "--parent", &root]);

    let shown = env.json(&["task", "show", &root]);
    assert_eq!(shown["id"], root.as_str());
    assert_eq!(shown["status"], "open");
    assert_eq!(shown["notes"], "top level");
    assert_eq!(shown["child_count"], 1);
    assert_eq!(shown["branch"], "main");
}

#[test]
fn test_task_show_not_found() {
    let env = TestEnv::new();

    env.crew()
        .args(["task", "show", "t-ffff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task not found: t-ffff"));
}

#[test]
fn test_task_list_is_scoped_by_branch() {
    let env = TestEnv::new();
    create(&env, &["Main task"]);
    env.crew()
        .args(["--branch", "dev", "task", "create", "Dev task"])
        .assert()
        .success();

    let main = env.json(&["task", "list"]);
    assert_eq!(main["count"], 1);
    assert_eq!(main["tasks"][0]["title"], "Main task");

    let dev = env.json(&["--branch", "dev", "task", "list"]);
    assert_eq!(dev["count"], 1);
    assert_eq!(dev["tasks"][0]["title"], "Dev task");
}

#[test]
fn test_task_list_human_empty() {
    let env = TestEnv::new();

    env.crew()
        .args(["task", "list", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks found."));
}

// === Update / Close Tests ===

#[test]
fn test_task_update_and_close() {
    let env = TestEnv::new();
    let id = create(&env, &["Draft"]);

    let updated = env.json(&["task", "update", &id, "--title", "Final", "--status", "in_progress"]);
    assert_eq!(updated["updated_fields"], serde_json::json!(["title", "status"]));
    assert_eq!(updated["status"], "in_progress");

    env.crew()
        .args(["task", "close", &id, "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: closed"));

    let shown = env.json(&["task", "show", &id]);
    assert_eq!(shown["title"], "Final");
    assert_eq!(shown["status"], "closed");
}

#[test]
fn test_task_update_invalid_status_fails() {
    let env = TestEnv::new();
    let id = create(&env, &["Task"]);

    env.crew()
        .args(["task", "update", &id, "--status", "done"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid status"));
}

// === Delete Tests ===

#[test]
fn test_task_delete_cascades_to_descendants() {
    let env = TestEnv::new();
    let a = create(&env, &["A"]);
    let b = create(&env, &["B", "--parent", &a]);
    let c = create(&env, &["C", "--parent", &b]);

    let deleted = env.json(&["task", "delete", &a]);
    assert_eq!(deleted["count"], 3);
    assert_eq!(deleted["deleted"][0], a.as_str());

    for id in [&a, &b, &c] {
        let shown = env.json(&["task", "show", id.as_str()]);
        assert!(shown["deleted_at"].is_string(), "{} should be deleted", id);
    }
    assert_eq!(env.json(&["task", "list"])["count"], 0);

    env.crew()
        .args(["task", "delete", &a])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found or deleted"));
    env.crew()
        .args(["task", "update", &c, "--title", "zombie"])
        .assert()
        .failure();
}

#[test]
fn test_end_to_end_root_child_delete() {
    let env = TestEnv::new();
    let root = create(&env, &["Root"]);

    let list = env.json(&["task", "list"]);
    assert_eq!(list["tasks"][0]["id"], root.as_str());

    let child = create(&env, &["Child", "--parent", &root]);
    let children = env.json(&["task", "children", &root]);
    assert_eq!(children["count"], 1);
    assert_eq!(children["tasks"][0]["id"], child.as_str());

    env.crew().args(["task", "delete", &root]).assert().success();
    assert_eq!(env.json(&["task", "list"])["tasks"], serde_json::json!([]));
}

#[test]
fn test_task_delete_counts_only_newly_deleted() {
    let env = TestEnv::new();
    let a = create(&env, &["A"]);
    let b = create(&env, &["B", "--parent", &a]);
    let c = create(&env, &["C", "--parent", &a]);

    env.crew().args(["task", "delete", &b]).assert().success();
    let b_deleted_at = env.json(&["task", "show", &b])["deleted_at"].clone();

    let deleted = env.json(&["task", "delete", &a]);
    assert_eq!(deleted["count"], 2);
    assert_eq!(deleted["deleted"], serde_json::json!([a, c]));
    assert_eq!(env.json(&["task", "show", &b])["deleted_at"], b_deleted_at);
}
