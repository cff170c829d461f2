mod common;

use common::cli::{BeansWorkspace, run_beans, run_json};
use predicates::prelude::*;
use std::fs;

fn create(workspace: &BeansWorkspace, args: &[&str]) -> String {
    let mut full = vec!["create"];
    full.extend_from_slice(args);
    run_json(workspace, full, "create")["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_blocks_cycle_is_rejected() {
    let workspace = BeansWorkspace::new();
    run_beans(&workspace, ["init"], "init");
    let a = create(&workspace, &["A"]);
    let b = create(&workspace, &["B", "--blocks", &a]);
    let c = create(&workspace, &["C", "--blocks", &b]);

    let out = run_beans(&workspace, ["update", a.as_str(), "--blocks", c.as_str(), "--json"], "close cycle");
    assert!(!out.status.success());
    let err = out.json();
    assert_eq!(err["error"]["code"], "link_cycle");
    let message = err["error"]["message"].as_str().unwrap();
    assert!(message.contains(&format!("{a} -> {c} -> {b} -> {a}")), "{message}");

    workspace
        .cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("All links are valid."));
}

#[test]
fn test_check_and_fix_broken_links() {
    let workspace = BeansWorkspace::new();
    run_beans(&workspace, ["init"], "init");
    let target = create(&workspace, &["Target"]);
    let linker = create(&workspace, &["Linker", "--related", &target]);

    // Remove the target behind the store's back.
    let shown = run_json(&workspace, ["show", target.as_str()], "show target");
    fs::remove_file(workspace.beans_dir().join(shown[0]["path"].as_str().unwrap())).unwrap();

    let out = run_beans(&workspace, ["check", "--json"], "check");
    assert!(!out.status.success());
    // The report comes first, then the error object.
    let mut docs = serde_json::Deserializer::from_str(&out.stdout).into_iter::<serde_json::Value>();
    let report = docs.next().unwrap().unwrap();
    let error = docs.next().unwrap().unwrap();
    assert_eq!(report["broken"][0]["bean_id"], linker.as_str());
    assert_eq!(report["clean"], false);
    assert_eq!(error["error"]["code"], "link_issues");

    let fixed = run_json(&workspace, ["check", "--fix"], "fix");
    assert_eq!(fixed["fixed"], 1);
    assert_eq!(fixed["clean"], true);

    let again = run_json(&workspace, ["check", "--fix"], "fix again");
    assert_eq!(again["fixed"], 0);
}

#[test]
fn test_delete_requires_force_with_incoming_links() {
    let workspace = BeansWorkspace::new();
    run_beans(&workspace, ["init"], "init");
    let epic = create(&workspace, &["Epic"]);
    let task = create(&workspace, &["Task", "--parent", &epic]);

    workspace
        .cmd()
        .args(["delete", epic.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error[has_incoming_links]"));

    let out = run_json(&workspace, ["delete", epic.as_str(), "--force"], "force delete");
    assert_eq!(out["links_removed"], 1);

    let shown = run_json(&workspace, ["show", task.as_str()], "show task");
    assert_eq!(shown[0]["links"], serde_json::json!([]));
    run_json(&workspace, ["check"], "check clean");
}

#[test]
fn test_missing_bean_error_code() {
    let workspace = BeansWorkspace::new();
    run_beans(&workspace, ["init"], "init");

    workspace
        .cmd()
        .args(["show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error[not_found]"));

    let out = run_beans(&workspace, ["show", "nope", "--json"], "show json");
    assert_eq!(out.json()["error"]["code"], "not_found");
}
