//! The provisioning pipeline: link, resolve, install, seed.
//!
//! Stages run in that fixed order. Each one works on the install plan built
//! so far and records one [`StageResult`] per extension it touched. An
//! extension that fails at any stage is dropped from the later ones; every
//! other extension carries on.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::ExtensionCatalog;
use crate::dependency::{DependencyGraph, InstallPlan};
use crate::error::{Error, ErrorKind, Result, Stage};
use crate::host::HostApplication;
use crate::installer::{EnableOutcome, Installer};
use crate::linker::Linker;
use crate::marker::MarkerStore;
use crate::seeder::{ScriptRunner, Seeder};

/// Status of one extension at one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Done,
    Skipped,
    Failed,
    Blocked,
}

/// Outcome of one stage for one extension.
#[derive(Debug, Serialize)]
pub struct StageResult {
    pub name: String,
    pub stage: Stage,
    pub status: StageStatus,
    pub detail: String,
    pub error_kind: Option<ErrorKind>,
    #[serde(skip)]
    pub error: Option<Error>,
}

impl StageResult {
    fn done(name: impl Into<String>, stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage,
            status: StageStatus::Done,
            detail: detail.into(),
            error_kind: None,
            error: None,
        }
    }

    fn skipped(name: impl Into<String>, stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped,
            ..Self::done(name, stage, detail)
        }
    }

    fn failed(name: impl Into<String>, stage: Stage, error: Error) -> Self {
        Self {
            name: name.into(),
            stage,
            status: StageStatus::Failed,
            detail: error.to_string(),
            error_kind: Some(error.kind()),
            error: Some(error),
        }
    }

    fn blocked(name: impl Into<String>, stage: Stage, by: &str) -> Self {
        Self {
            status: StageStatus::Blocked,
            ..Self::done(name, stage, format!("blocked by {by}"))
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, StageStatus::Failed | StageStatus::Blocked)
    }
}

/// Everything one provisioning run did.
#[derive(Debug, Serialize)]
pub struct ProvisionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Final install plan, dependencies first.
    pub plan: Vec<String>,
    pub results: Vec<StageResult>,
}

impl ProvisionReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            plan: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.results.iter().any(StageResult::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Results for one extension, in stage order.
    pub fn results_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StageResult> {
        self.results.iter().filter(move |r| r.name == name)
    }

    /// `0`, or the exit code of the first failure in report order.
    pub fn exit_code(&self) -> i32 {
        self.failures()
            .find_map(|r| r.error_kind)
            .map(ErrorKind::exit_code)
            .unwrap_or(if self.is_success() { 0 } else { 1 })
    }
}

/// State threaded through the stages.
#[derive(Default)]
struct Run {
    link_ran: bool,
    linked: Vec<String>,
    catalog: ExtensionCatalog,
    plan: InstallPlan,
    failed: HashSet<String>,
}

/// Ordered provisioning stages over one extensions root and host.
pub struct Pipeline<'a> {
    linker: &'a Linker,
    host: &'a dyn HostApplication,
    markers: &'a dyn MarkerStore,
    runner: &'a dyn ScriptRunner,
    stages: Vec<Stage>,
    force_seed: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        linker: &'a Linker,
        host: &'a dyn HostApplication,
        markers: &'a dyn MarkerStore,
        runner: &'a dyn ScriptRunner,
    ) -> Self {
        Self {
            linker,
            host,
            markers,
            runner,
            stages: vec![Stage::Link, Stage::Resolve, Stage::Install, Stage::Seed],
            force_seed: false,
        }
    }

    /// Run only `stages`. Resolution is always included when installing or
    /// seeding, since both work from the plan.
    pub fn with_stages(mut self, stages: &[Stage]) -> Self {
        let mut stages = stages.to_vec();
        if stages.iter().any(|s| matches!(s, Stage::Install | Stage::Seed)) {
            stages.push(Stage::Resolve);
        }
        stages.sort();
        stages.dedup();
        self.stages = stages;
        self
    }

    pub fn force_seed(mut self, force: bool) -> Self {
        self.force_seed = force;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Link `sources`, then provision `targets`.
    ///
    /// With no targets, the extensions linked by this run are provisioned,
    /// or every extension under the extensions root when no sources were
    /// given.
    pub fn run(&self, sources: &[PathBuf], targets: &[String]) -> ProvisionReport {
        let mut report = ProvisionReport::new();
        let mut run = Run::default();
        tracing::info!(run_id = %report.run_id, stages = ?self.stages, "provisioning started");

        for stage in &self.stages {
            let proceed = match stage {
                Stage::Link => {
                    self.link(sources, &mut run, &mut report);
                    true
                }
                Stage::Resolve => self.resolve(targets, &mut run, &mut report),
                Stage::Install => self.install(&mut run, &mut report),
                Stage::Seed => {
                    self.seed(&run, &mut report);
                    true
                }
            };
            if !proceed {
                break;
            }
        }

        report.plan = run.plan.names().to_vec();
        tracing::info!(
            run_id = %report.run_id,
            failures = report.failures().count(),
            "provisioning finished"
        );
        report
    }

    fn link(&self, sources: &[PathBuf], run: &mut Run, report: &mut ProvisionReport) {
        run.link_ran = !sources.is_empty();
        for (source, result) in sources.iter().zip(self.linker.link_all(sources)) {
            match result {
                Ok(linked) => {
                    let detail = format!("{} ({})", linked.outcome.as_str(), linked.method.as_str());
                    report.results.push(StageResult::done(&linked.name, Stage::Link, detail));
                    run.linked.push(linked.name);
                }
                Err(e) => {
                    report
                        .results
                        .push(StageResult::failed(source.display().to_string(), Stage::Link, e));
                }
            }
        }
    }

    /// Returns `false` when nothing can proceed.
    fn resolve(&self, targets: &[String], run: &mut Run, report: &mut ProvisionReport) -> bool {
        run.catalog = match ExtensionCatalog::discover(self.linker.extensions_root()) {
            Ok(catalog) => catalog,
            Err(e) => {
                report.results.push(StageResult::failed("*", Stage::Resolve, e));
                return false;
            }
        };

        let requested: Vec<String> = if !targets.is_empty() {
            targets.to_vec()
        } else if run.link_ran {
            run.linked.clone()
        } else {
            run.catalog.names()
        };

        let graph = DependencyGraph::from_catalog(&run.catalog);
        for (name, result) in graph.resolve_each(requested.as_slice()) {
            match result {
                Ok(plan) => run.plan.merge(&plan),
                Err(e) => {
                    tracing::warn!(extension = %name, "cannot resolve: {e}");
                    run.failed.insert(name.clone());
                    report.results.push(StageResult::failed(name, Stage::Resolve, e));
                }
            }
        }

        for name in &run.plan {
            let deps = run.plan.dependencies_of(name);
            let detail = if deps.is_empty() {
                "no dependencies".to_string()
            } else {
                format!("after {}", deps.join(", "))
            };
            report.results.push(StageResult::done(name, Stage::Resolve, detail));
        }
        !run.plan.is_empty()
    }

    fn install(&self, run: &mut Run, report: &mut ProvisionReport) -> bool {
        let mut installer = Installer::new(self.host);
        let enabled = match installer.enable(&run.plan) {
            Ok(enabled) => enabled,
            Err(e) => {
                report.results.push(StageResult::failed("*", Stage::Install, e));
                run.failed.extend(run.plan.names().iter().cloned());
                return false;
            }
        };

        for (name, outcome) in enabled.into_entries() {
            let result = match outcome {
                EnableOutcome::Enabled => StageResult::done(&name, Stage::Install, "enabled"),
                EnableOutcome::AlreadyEnabled => StageResult::skipped(&name, Stage::Install, "already enabled"),
                EnableOutcome::Failed(e) => {
                    run.failed.insert(name.clone());
                    StageResult::failed(&name, Stage::Install, e)
                }
                EnableOutcome::Blocked { by } => {
                    run.failed.insert(name.clone());
                    StageResult::blocked(&name, Stage::Install, &by)
                }
            };
            report.results.push(result);
        }
        true
    }

    fn seed(&self, run: &Run, report: &mut ProvisionReport) {
        let seeder = Seeder::new(self.markers, self.runner).force(self.force_seed);
        for name in &run.plan {
            if run.failed.contains(name) {
                continue;
            }
            let Some(extension) = run.catalog.get(name) else {
                report.results.push(StageResult::failed(
                    name,
                    Stage::Seed,
                    Error::UnknownExtension(name.clone()),
                ));
                continue;
            };
            let result = match seeder.seed(extension) {
                Ok(outcome) if outcome.ran() => StageResult::done(name, Stage::Seed, outcome.label()),
                Ok(outcome) => StageResult::skipped(name, Stage::Seed, outcome.label()),
                Err(e) => StageResult::failed(name, Stage::Seed, e),
            };
            report.results.push(result);
        }
    }
}

/// Extensions to seed in dependency order, and the requests whose
/// dependencies cannot be resolved.
#[derive(Debug, Default)]
pub struct SeedOrder {
    pub order: Vec<String>,
    pub unresolved: Vec<(String, Error)>,
}

/// Seed order for `names`, every catalog entry when empty.
///
/// A request caught in a cycle or missing a dependency lands in
/// `unresolved` and is not seeded; the rest still are. Names absent from the
/// catalog are an error.
pub fn seed_order(catalog: &ExtensionCatalog, names: &[String]) -> Result<SeedOrder> {
    for name in names {
        if !catalog.contains(name) {
            return Err(Error::UnknownExtension(name.clone()));
        }
    }
    let requested: Vec<String> = if names.is_empty() {
        catalog.names()
    } else {
        names.to_vec()
    };

    let mut plan = InstallPlan::default();
    let mut unresolved = Vec::new();
    for (name, result) in DependencyGraph::from_catalog(catalog).resolve_each(requested.as_slice()) {
        match result {
            Ok(resolved) => plan.merge(&resolved),
            Err(e) => {
                tracing::warn!(extension = %name, "not seeding: {e}");
                unresolved.push((name, e));
            }
        }
    }

    let order = plan
        .names()
        .iter()
        .filter(|n| names.is_empty() || names.contains(n))
        .cloned()
        .collect();
    Ok(SeedOrder { order, unresolved })
}
