//! Cross-crate provisioning scenarios
//!
//! Each scenario starts from a `civikitchen.toml` on disk, builds the engine
//! components from it and drives whole provisioning runs against a fake `cv`
//! or the in-memory host.
#![cfg(unix)]

use std::fs;
use std::path::PathBuf;

use kitchen_extensions::pipeline::StageStatus;
use kitchen_extensions::{
    ExtensionCatalog, HostApplication, HostStatus, Installer, Inventory, KitchenConfig,
    Lifecycle, LinkMethod, LinkStrategy, ListScope, MemoryHost, Pipeline, ResetTarget, Seeder,
    Stage,
};
use kitchen_test_utils::TestKitchen;
use pretty_assertions::assert_eq;

fn source_trees(config: &KitchenConfig) -> Vec<PathBuf> {
    ExtensionCatalog::discover_all(&config.sources)
        .unwrap()
        .iter()
        .map(|e| e.path.clone())
        .collect()
}

#[test]
fn test_config_driven_provisioning_of_dependency_chain() {
    let kitchen = TestKitchen::new();
    kitchen.counted_extension("org.example.base").create();
    kitchen
        .counted_extension("org.example.middle")
        .depends_on("org.example.base")
        .create();
    kitchen
        .counted_extension("org.example.target")
        .depends_on("org.example.middle")
        .depends_on("org.example.base")
        .create();
    let config = KitchenConfig::load(&kitchen.write_config("")).unwrap();

    let (linker, host, markers, runner) = (
        config.linker(),
        config.host(),
        config.marker_store(),
        config.script_runner(),
    );
    let report = Pipeline::new(&linker, &host, &markers, &runner).run(&source_trees(&config), &[]);

    assert!(report.is_success(), "{:#?}", report.results);
    assert_eq!(
        report.plan,
        ["org.example.base", "org.example.middle", "org.example.target"]
    );
    for name in &report.plan {
        assert_eq!(kitchen.seed_runs(name), 1);
        assert!(kitchen.marker_exists(name));
    }

    let inventory = Inventory::collect(
        &ExtensionCatalog::discover(&config.extensions_root).unwrap(),
        &host,
        &markers,
        ListScope::Local,
    );
    assert!(inventory.entries.iter().all(|e| e.lifecycle == Lifecycle::Enabled));
}

#[test]
fn test_development_cycle_reprovisions_after_uninstall() {
    let kitchen = TestKitchen::new();
    kitchen.counted_extension("org.example.base").create();
    let config = KitchenConfig::load(&kitchen.write_config("")).unwrap();
    let (linker, host, markers, runner) = (
        config.linker(),
        config.host(),
        config.marker_store(),
        config.script_runner(),
    );
    let pipeline = Pipeline::new(&linker, &host, &markers, &runner);
    let sources = source_trees(&config);

    assert!(pipeline.run(&sources, &[]).is_success());

    let installer = Installer::new(&host);
    installer.disable("org.example.base").unwrap();
    installer.uninstall("org.example.base").unwrap();
    let inventory = Inventory::collect(
        &ExtensionCatalog::discover(&config.extensions_root).unwrap(),
        &host,
        &markers,
        ListScope::Local,
    );
    assert_eq!(
        inventory.get("org.example.base").unwrap().lifecycle,
        Lifecycle::Uninstalled
    );

    Seeder::new(&markers, &runner)
        .reset_markers(&ResetTarget::All)
        .unwrap();
    let report = pipeline.run(&sources, &[]);

    assert!(report.is_success(), "{:#?}", report.results);
    assert_eq!(kitchen.seed_runs("org.example.base"), 2);
    assert_eq!(kitchen.host_status("org.example.base").as_deref(), Some("installed"));
}

#[test]
fn test_copied_extensions_resync_and_keep_markers() {
    let kitchen = TestKitchen::new();
    let source = kitchen.counted_extension("org.example.base").create();
    let config = KitchenConfig::load(&kitchen.write_config("link = 'copy'")).unwrap();
    assert_eq!(config.link, LinkStrategy::Copy);

    let host = MemoryHost::with_available(["org.example.base"]);
    let (linker, markers, runner) = (config.linker(), config.marker_store(), config.script_runner());
    let pipeline = Pipeline::new(&linker, &host, &markers, &runner);

    let first = pipeline.run(std::slice::from_ref(&source), &[]);
    assert!(first.is_success(), "{:#?}", first.results);
    let destination = linker.destination("org.example.base");
    assert!(!fs::symlink_metadata(&destination).unwrap().file_type().is_symlink());

    fs::write(source.join("README.md"), "changed upstream\n").unwrap();
    let second = pipeline.run(std::slice::from_ref(&source), &[]);

    assert!(second.is_success(), "{:#?}", second.results);
    let link = second
        .results_for("org.example.base")
        .find(|r| r.stage == Stage::Link)
        .unwrap();
    assert!(link.detail.contains(LinkMethod::Copy.as_str()));
    assert_eq!(
        fs::read_to_string(destination.join("README.md")).unwrap(),
        "changed upstream\n"
    );
    assert!(kitchen.marker_exists("org.example.base"));
    assert_eq!(kitchen.seed_runs("org.example.base"), 1);
    assert_eq!(host.status("org.example.base"), Some(HostStatus::Enabled));
}

#[test]
fn test_partial_failure_keeps_independent_chain_going() {
    let kitchen = TestKitchen::new();
    kitchen.counted_extension("org.example.base").create();
    kitchen
        .counted_extension("org.example.target")
        .depends_on("org.example.base")
        .create();
    kitchen.counted_extension("org.example.other").create();
    kitchen.fail_host("enable", "org.example.base", "Error: schema upgrade failed");
    let config = KitchenConfig::load(&kitchen.write_config("")).unwrap();
    let (linker, host, markers, runner) = (
        config.linker(),
        config.host(),
        config.marker_store(),
        config.script_runner(),
    );

    let report = Pipeline::new(&linker, &host, &markers, &runner).run(&source_trees(&config), &[]);

    assert_eq!(report.exit_code(), 6);
    let install: Vec<(&str, StageStatus)> = report
        .results
        .iter()
        .filter(|r| r.stage == Stage::Install)
        .map(|r| (r.name.as_str(), r.status))
        .collect();
    assert_eq!(
        install,
        [
            ("org.example.base", StageStatus::Failed),
            ("org.example.other", StageStatus::Done),
            ("org.example.target", StageStatus::Blocked),
        ]
    );
    assert_eq!(kitchen.seed_runs("org.example.other"), 1);
    assert_eq!(kitchen.seed_runs("org.example.base"), 0);
    assert_eq!(kitchen.seed_runs("org.example.target"), 0);
    assert_eq!(
        host.status_of("org.example.other").unwrap(),
        Some(HostStatus::Enabled)
    );
}

#[test]
fn test_json_config_is_accepted() {
    let kitchen = TestKitchen::new();
    let path = kitchen.root().join("civikitchen.json");
    let config = serde_json::json!({
        "extensions_root": kitchen.extensions_root(),
        "seeding": { "interpreter": "sh", "marker_file": ".seeded" },
    });
    fs::write(&path, config.to_string()).unwrap();

    let config = KitchenConfig::load(&path).unwrap();

    assert_eq!(config.extensions_root, kitchen.extensions_root());
    assert_eq!(config.seeding.marker_file, ".seeded");
    assert_eq!(
        config.marker_store().marker_path("org.example.base"),
        kitchen.extensions_root().join("org.example.base").join(".seeded")
    );
}
