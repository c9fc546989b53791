//! End-to-end tests that invoke the compiled `civikitchen` binary against a
//! fake `cv` and real seed scripts.
#![cfg(unix)]

use assert_cmd::Command;
use kitchen_test_utils::TestKitchen;
use predicates::prelude::*;

/// `civikitchen` run from the kitchen root, which holds `civikitchen.toml`.
fn civikitchen(kitchen: &TestKitchen) -> Command {
    let mut cmd = Command::cargo_bin("civikitchen").expect("Failed to find civikitchen binary");
    cmd.current_dir(kitchen.root())
        .env_remove("CIVIKITCHEN_CONFIG")
        .env_remove("CIVIKITCHEN_EXT_DIR")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn configured() -> TestKitchen {
    let kitchen = TestKitchen::new();
    kitchen.write_config("");
    kitchen
}

#[test]
fn test_help_exits_zero() {
    let kitchen = TestKitchen::new();
    civikitchen(&kitchen)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("seed-extensions"));
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    let kitchen = TestKitchen::new();
    civikitchen(&kitchen).assert().code(2);
}

#[test]
fn test_provision_enables_dependencies_first_and_seeds_once() {
    let kitchen = configured();
    kitchen.counted_extension("org.example.base").create();
    kitchen
        .counted_extension("org.example.target")
        .depends_on("org.example.base")
        .create();

    civikitchen(&kitchen)
        .arg("provision")
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example.base -> org.example.target"));

    civikitchen(&kitchen).arg("provision").assert().success();

    assert_eq!(kitchen.seed_runs("org.example.base"), 1);
    assert_eq!(kitchen.seed_runs("org.example.target"), 1);
    assert!(kitchen.marker_exists("org.example.base"));
    assert!(kitchen.marker_exists("org.example.target"));
    assert_eq!(kitchen.host_status("org.example.target").as_deref(), Some("installed"));
}

#[test]
fn test_provision_cycle_exits_with_cycle_code() {
    let kitchen = configured();
    kitchen.extension("org.example.a").depends_on("org.example.b").create();
    kitchen.extension("org.example.b").depends_on("org.example.a").create();

    civikitchen(&kitchen)
        .arg("provision")
        .assert()
        .code(4)
        .stdout(predicate::str::contains("org.example.a -> org.example.b -> org.example.a"));
}

#[test]
fn test_provision_json_report() {
    let kitchen = configured();
    kitchen.extension("org.example.base").create();

    let output = civikitchen(&kitchen)
        .args(["provision", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["plan"], serde_json::json!(["org.example.base"]));
    assert!(report["run_id"].is_string());
    assert!(report["results"].as_array().unwrap().iter().any(|r| r["stage"] == "install"));
}

#[test]
fn test_host_failure_is_reported_with_host_text() {
    let kitchen = configured();
    kitchen.extension("org.example.base").create();
    kitchen.fail_host("enable", "org.example.base", "Error: Missing schema file");

    civikitchen(&kitchen)
        .arg("provision")
        .assert()
        .code(6)
        .stdout(predicate::str::contains("Missing schema file"));
}

#[test]
fn test_link_then_list_extensions() {
    let kitchen = configured();
    let source = kitchen.extension("org.example.base").create();

    civikitchen(&kitchen)
        .arg("link-extension")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked"));
    assert!(kitchen.extensions_root().join("org.example.base").exists());

    civikitchen(&kitchen)
        .arg("link-extension")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("Already linked"));

    civikitchen(&kitchen)
        .args(["list-extensions", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example.base"));
}

#[test]
fn test_link_missing_source_exits_with_link_code() {
    let kitchen = configured();

    civikitchen(&kitchen)
        .arg("link-extension")
        .arg(kitchen.sources_dir().join("does-not-exist"))
        .assert()
        .code(3);
}

#[test]
fn test_list_extensions_json_reports_seed_state() {
    let kitchen = configured();
    kitchen.counted_extension("org.example.base").create();
    civikitchen(&kitchen).arg("provision").assert().success();

    let output = civikitchen(&kitchen)
        .args(["list-extensions", "--local", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let inventory: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let entry = &inventory["entries"][0];
    assert_eq!(entry["name"], "org.example.base");
    assert_eq!(entry["enabled"], true);
    assert_eq!(entry["seeded"], true);
    assert_eq!(entry["lifecycle"], "enabled");
}

#[test]
fn test_list_extensions_with_broken_host_is_partial() {
    let kitchen = configured();
    kitchen.fail_host("list", "all", "database unavailable");

    civikitchen(&kitchen)
        .arg("list-extensions")
        .assert()
        .success()
        .stderr(predicate::str::contains("database unavailable"));
}

#[test]
fn test_install_dependencies_enables_chain_without_seeding() {
    let kitchen = configured();
    kitchen.counted_extension("org.example.base").create();
    kitchen
        .counted_extension("org.example.target")
        .depends_on("org.example.base")
        .create();
    civikitchen(&kitchen)
        .arg("link-extension")
        .arg(kitchen.sources_dir().join("org.example.base"))
        .arg(kitchen.sources_dir().join("org.example.target"))
        .assert()
        .success();

    civikitchen(&kitchen)
        .args(["install-dependencies", "org.example.target"])
        .assert()
        .success();

    assert_eq!(kitchen.host_status("org.example.base").as_deref(), Some("installed"));
    assert_eq!(kitchen.host_status("org.example.target").as_deref(), Some("installed"));
    assert_eq!(kitchen.seed_runs("org.example.base"), 0);
}

#[test]
fn test_install_dependencies_with_undeclared_dependency() {
    let kitchen = configured();
    let source = kitchen
        .extension("org.example.target")
        .depends_on("org.example.absent")
        .create();
    civikitchen(&kitchen).arg("link-extension").arg(&source).assert().success();

    civikitchen(&kitchen)
        .args(["install-dependencies", "org.example.target"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("org.example.absent"));
}

#[test]
fn test_seed_failure_exits_with_seed_code_and_isolates() {
    let kitchen = configured();
    let broken = kitchen
        .extension("org.example.e1")
        .seed_script("exit 3")
        .create();
    let fine = kitchen.counted_extension("org.example.e2").create();
    civikitchen(&kitchen)
        .arg("link-extension")
        .arg(&broken)
        .arg(&fine)
        .assert()
        .success();

    civikitchen(&kitchen).arg("seed-extensions").assert().code(7);

    assert!(!kitchen.marker_exists("org.example.e1"));
    assert!(kitchen.marker_exists("org.example.e2"));
}

#[test]
fn test_reset_marker_then_seed_runs_again() {
    let kitchen = configured();
    kitchen.counted_extension("org.example.base").create();
    civikitchen(&kitchen).arg("provision").assert().success();

    civikitchen(&kitchen).arg("seed-extensions").assert().success();
    assert_eq!(kitchen.seed_runs("org.example.base"), 1);

    civikitchen(&kitchen)
        .args(["reset-seed-markers", "org.example.base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset seed marker"));
    civikitchen(&kitchen)
        .args(["seed-extensions", "org.example.base"])
        .assert()
        .success();

    assert_eq!(kitchen.seed_runs("org.example.base"), 2);
}

#[test]
fn test_seed_force_ignores_marker() {
    let kitchen = configured();
    kitchen.counted_extension("org.example.base").create();
    civikitchen(&kitchen).arg("provision").assert().success();

    civikitchen(&kitchen)
        .args(["seed-extensions", "--force"])
        .assert()
        .success();

    assert_eq!(kitchen.seed_runs("org.example.base"), 2);
}

#[test]
fn test_seed_unknown_extension_exits_with_missing_code() {
    let kitchen = configured();

    civikitchen(&kitchen)
        .args(["seed-extensions", "org.example.nowhere"])
        .assert()
        .code(5);
}

#[test]
fn test_seed_cycle_exits_with_cycle_code_and_seeds_the_rest() {
    let kitchen = configured();
    let a = kitchen
        .counted_extension("org.example.a")
        .depends_on("org.example.b")
        .create();
    let b = kitchen
        .counted_extension("org.example.b")
        .depends_on("org.example.a")
        .create();
    let solo = kitchen.counted_extension("org.example.solo").create();
    civikitchen(&kitchen)
        .arg("link-extension")
        .args([&a, &b, &solo])
        .assert()
        .success();

    civikitchen(&kitchen)
        .arg("seed-extensions")
        .assert()
        .code(4)
        .stdout(predicate::str::contains("dependency cycle"));

    assert_eq!(kitchen.seed_runs("org.example.a"), 0);
    assert_eq!(kitchen.seed_runs("org.example.b"), 0);
    assert_eq!(kitchen.seed_runs("org.example.solo"), 1);
}

#[test]
fn test_seed_missing_dependency_exits_with_missing_code() {
    let kitchen = configured();
    let source = kitchen
        .counted_extension("org.example.target")
        .depends_on("org.example.absent")
        .create();
    civikitchen(&kitchen).arg("link-extension").arg(&source).assert().success();

    civikitchen(&kitchen)
        .args(["seed-extensions", "org.example.target"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("org.example.absent"));
    assert_eq!(kitchen.seed_runs("org.example.target"), 0);
}

#[test]
fn test_reset_marker_rejects_path_like_names() {
    let kitchen = configured();
    std::fs::create_dir_all(kitchen.extensions_root()).unwrap();
    let outside = kitchen.root().join(".civicrm-seeded");
    std::fs::write(&outside, "keep").unwrap();

    civikitchen(&kitchen)
        .args(["reset-seed-markers", "../"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("invalid extension name"));

    assert!(outside.is_file());
}

#[test]
fn test_uninstall_requires_disable() {
    let kitchen = configured();
    kitchen.extension("org.example.base").create();
    civikitchen(&kitchen).arg("provision").assert().success();

    civikitchen(&kitchen)
        .args(["uninstall-extension", "org.example.base"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("disable it first"));

    civikitchen(&kitchen)
        .args(["uninstall-extension", "org.example.base", "--disable"])
        .assert()
        .success();
    assert_eq!(kitchen.host_status("org.example.base").as_deref(), Some("uninstalled"));
}

#[test]
fn test_disable_then_unlink() {
    let kitchen = configured();
    kitchen.extension("org.example.base").create();
    civikitchen(&kitchen).arg("provision").assert().success();

    civikitchen(&kitchen)
        .args(["disable-extension", "org.example.base"])
        .assert()
        .success();
    assert_eq!(kitchen.host_status("org.example.base").as_deref(), Some("disabled"));

    civikitchen(&kitchen)
        .args(["unlink-extension", "org.example.base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unlinked"));
    assert!(!kitchen.extensions_root().join("org.example.base").exists());
    assert!(kitchen.sources_dir().join("org.example.base").exists());
}

#[test]
fn test_check_manifest() {
    let kitchen = TestKitchen::new();
    let good = kitchen
        .extension("org.example.good")
        .depends_on("org.example.base")
        .seed_script("true")
        .create();
    let bad = kitchen
        .extension("org.example.bad")
        .raw_manifest(r#"{"seeding": {"enabled": "yes"}}"#)
        .create();

    civikitchen(&kitchen)
        .arg("check-manifest")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example.base"));

    civikitchen(&kitchen)
        .arg("check-manifest")
        .arg(bad.join("civikitchen.json"))
        .assert()
        .code(9);
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let kitchen = TestKitchen::new();
    std::fs::write(kitchen.config_path(), "[host]\ntimeout_secs = 0\n").unwrap();

    civikitchen(&kitchen).arg("list-extensions").assert().code(8);
}

#[test]
fn test_ext_dir_flag_overrides_config() {
    let kitchen = configured();
    let other_root = kitchen.root().join("other-ext");

    civikitchen(&kitchen)
        .arg("--ext-dir")
        .arg(&other_root)
        .arg("link-extension")
        .arg(kitchen.extension("org.example.base").create())
        .assert()
        .success();

    assert!(other_root.join("org.example.base").exists());
    assert!(!kitchen.extensions_root().join("org.example.base").exists());
}

#[test]
fn test_completions_bash() {
    let kitchen = TestKitchen::new();
    civikitchen(&kitchen)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("civikitchen"));
}
