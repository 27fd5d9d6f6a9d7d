//! CLIの統合テスト
//!
//! checkout_externalsバイナリの終了コードと出力を検証する

mod common;

use assert_cmd::Command;
use common::fixtures::{description, SourceTreeFixture};
use predicates::prelude::*;

fn checkout_externals(tree: &SourceTreeFixture) -> Command {
    let mut cmd = Command::cargo_bin("checkout_externals").unwrap();
    cmd.arg("--no-logging")
        .arg("--no-color")
        .arg("-C")
        .arg(tree.path())
        .env_remove("EXTERNALS_FILE")
        .env_remove("EXTERNALS_JOBS")
        .env_remove("EXTERNALS_TIMEOUT");
    cmd
}

fn data_entry(required: bool) -> String {
    format!(
        "\n[data]\nprotocol = externals_only\nlocal_path = data\nrequired = {}\n",
        if required { "True" } else { "False" }
    )
}

#[test]
fn test_help_and_version() {
    Command::cargo_bin("checkout_externals")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("--all-or-nothing"));

    Command::cargo_bin("checkout_externals")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_description_is_fatal() {
    let tree = SourceTreeFixture::new(&description(&[]));
    std::fs::remove_file(tree.join("Externals.cfg")).unwrap();

    checkout_externals(&tree)
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_malformed_description_is_fatal() {
    let tree = SourceTreeFixture::new("[lib]\nprotocol = git\n");

    checkout_externals(&tree).assert().code(2);
    assert!(!tree.join("lib").exists());
}

#[test]
fn test_status_of_empty_description_succeeds() {
    let tree = SourceTreeFixture::new(&description(&[]));

    checkout_externals(&tree).arg("status").assert().code(0);
}

#[test]
fn test_status_reports_existing_directory() {
    let tree = SourceTreeFixture::new(&description(&[data_entry(true)]));
    std::fs::create_dir(tree.join("data")).unwrap();

    checkout_externals(&tree)
        .arg("status")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("./data"));
}

#[test]
fn test_status_with_missing_required_directory_fails() {
    let tree = SourceTreeFixture::new(&description(&[data_entry(true)]));

    checkout_externals(&tree)
        .arg("status")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("e-  ./data"));
}

#[test]
fn test_missing_optional_directory_is_not_a_failure() {
    let tree = SourceTreeFixture::new(&description(&[data_entry(false)]));

    checkout_externals(&tree).arg("status").assert().code(0);
}

#[test]
fn test_json_output() {
    let tree = SourceTreeFixture::new(&description(&[data_entry(true)]));
    std::fs::create_dir(tree.join("data")).unwrap();

    let output = checkout_externals(&tree)
        .args(["status", "--format", "json"])
        .assert()
        .code(0)
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["mode"], "status");
    assert_eq!(json["entities"][0]["name"], "data");
    assert_eq!(json["entities"][0]["local_path"], "./data");
}

#[test]
fn test_alternate_description_file() {
    let tree = SourceTreeFixture::new(&description(&[data_entry(true)]));
    tree.write("Externals_ALT.cfg", &description(&[]));

    checkout_externals(&tree)
        .args(["status", "-e", "Externals_ALT.cfg"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("./data").not());
}

#[test]
fn test_only_sync_writes_the_log_file() {
    let tree = SourceTreeFixture::new(&description(&[data_entry(true)]));
    std::fs::create_dir(tree.join("data")).unwrap();
    let run = |subcommand: &str| {
        Command::cargo_bin("checkout_externals")
            .unwrap()
            .args(["--no-color", "-C"])
            .arg(tree.path())
            .arg(subcommand)
            .env_remove("EXTERNALS_FILE")
            .assert()
            .code(0);
    };

    run("status");
    assert!(!tree.join("manage_externals.log").exists());

    run("sync");
    assert!(tree.join("manage_externals.log").exists());
}

#[test]
fn test_named_components() {
    let other = "\n[tools]\nprotocol = externals_only\nlocal_path = tools\nrequired = True\n";
    let tree = SourceTreeFixture::new(&description(&[data_entry(false), other.to_string()]));
    std::fs::create_dir(tree.join("data")).unwrap();

    checkout_externals(&tree)
        .args(["data", "status"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("./data"))
        .stdout(predicate::str::contains("./tools").not());

    checkout_externals(&tree)
        .args(["status", "-x", "tools"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("./tools").not());

    checkout_externals(&tree)
        .args(["cime", "status"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no external named 'cime'"));
}
