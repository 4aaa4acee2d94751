mod common;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

use common::*;

fn layerlock(store: &std::path::Path) -> Command {
    let mut cmd = cargo_bin_cmd!("layerlock");
    cmd.arg("--store").arg(store);
    cmd
}

#[test]
fn lists_layers_with_per_platform_indices() {
    let dir = assert_fs::TempDir::new().unwrap();
    multi_platform_image(
        dir.path(),
        "app:multi",
        &[b"a0", b"a1", b"a2"],
        &[b"b0", b"b1"],
    );

    let assert = layerlock(dir.path())
        .args(["layers", "app:multi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("linux/amd64"))
        .stdout(predicate::str::contains("linux/arm64"));

    // Indices restart per platform: 0..2 for amd64, 0..1 for arm64.
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let indices: Vec<&str> = stdout
        .lines()
        .filter(|l| l.contains("linux/"))
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(indices, vec!["0", "1", "2", "0", "1"]);
}

#[test]
fn platform_filter_limits_listing() {
    let dir = assert_fs::TempDir::new().unwrap();
    multi_platform_image(dir.path(), "app:multi", &[b"a0", b"a1"], &[b"b0"]);

    layerlock(dir.path())
        .args(["layers", "app:multi", "--platform", "linux/arm64"])
        .assert()
        .success()
        .stdout(predicate::str::contains("linux/arm64"))
        .stdout(predicate::str::contains("linux/amd64").not());
}

#[test]
fn negative_selector_lists_topmost_layer_of_each_platform() {
    let dir = assert_fs::TempDir::new().unwrap();
    multi_platform_image(
        dir.path(),
        "app:multi",
        &[b"a0", b"a1", b"a2"],
        &[b"b0", b"b1"],
    );

    let assert = layerlock(dir.path())
        .args(["layers", "app:multi", "--layer", "-1"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let indices: Vec<&str> = stdout
        .lines()
        .filter(|l| l.contains("linux/"))
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(indices, vec!["2", "1"]);
}

#[test]
fn malformed_platform_specifier_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    single_platform_image(dir.path(), "app:v1", &[b"layer"]);

    layerlock(dir.path())
        .args(["layers", "app:v1", "--platform", "linux//v7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid platform specifier"));
}

#[test]
fn unknown_image_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    single_platform_image(dir.path(), "app:v1", &[b"layer"]);

    layerlock(dir.path())
        .args(["layers", "ghost:v1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
