//! Dependency graph and install ordering for extensions.
//!
//! Every extension's `civikitchen.json` may list the extensions it depends
//! on. [`DependencyGraph::resolve`] turns one or more requested extensions
//! into an [`InstallPlan`]: each extension appears exactly once, after all
//! of its dependencies.
//!
//! # Example
//!
//! ```
//! use kitchen_extensions::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("org.example.base");
//! graph.add_node("org.example.target");
//! graph.add_edge("org.example.target", "org.example.base");
//!
//! let plan = graph.resolve(&["org.example.target"]).unwrap();
//! assert_eq!(plan.names(), ["org.example.base", "org.example.target"]);
//! ```

use std::collections::{HashMap, HashSet};

use crate::catalog::ExtensionCatalog;
use crate::error::{Error, Result};
use crate::manifest::ExtensionManifest;

/// Directed graph of dependencies between extensions.
///
/// Edges point from dependent to dependency and keep declaration order, so
/// resolution is deterministic for identical manifests. Edges may name
/// extensions that are not nodes; resolving through such an edge fails with
/// [`Error::MissingDependency`].
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Adjacency list: key depends on each value, in declaration order.
    edges: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a present extension. Adding an existing node is a no-op.
    pub fn add_node(&mut self, name: &str) {
        self.edges.entry(name.to_string()).or_default();
    }

    /// Declare that `from` depends on `to`. Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let deps = self.edges.entry(from.to_string()).or_default();
        if !deps.iter().any(|d| d == to) {
            deps.push(to.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Direct dependencies of a node, in declaration order.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// All node names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.edges.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the graph from named manifests.
    pub fn from_manifests(manifests: &[(&str, &ExtensionManifest)]) -> Self {
        let mut graph = Self::new();
        for &(name, manifest) in manifests {
            graph.add_node(name);
            for dep in &manifest.dependencies {
                graph.add_edge(name, dep);
            }
        }
        graph
    }

    /// Build the graph from every extension in a catalog.
    pub fn from_catalog(catalog: &ExtensionCatalog) -> Self {
        let mut graph = Self::new();
        for ext in catalog.iter() {
            graph.add_node(&ext.name);
            for dep in ext.dependencies() {
                graph.add_edge(&ext.name, dep);
            }
        }
        graph
    }

    /// Resolve the requested extensions into a dependency-first plan.
    ///
    /// Depth-first: an extension is emitted right after all of its
    /// dependencies, already-emitted extensions are skipped, and siblings
    /// keep their declaration order.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownExtension`] if a requested name is not a node.
    /// - [`Error::MissingDependency`] if a dependency is not a node.
    /// - [`Error::DependencyCycle`] with the full cycle path.
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> Result<InstallPlan> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut path: Vec<&str> = Vec::new();
        let mut plan = InstallPlan::default();

        for name in requested {
            let name = name.as_ref();
            let Some((node, _)) = self.edges.get_key_value(name) else {
                return Err(Error::UnknownExtension(name.to_string()));
            };
            self.visit(node, &mut marks, &mut path, &mut plan)?;
        }

        Ok(plan)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        plan: &mut InstallPlan,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(Error::DependencyCycle { cycle });
            }
            None => {}
        }

        marks.insert(name, Mark::InProgress);
        path.push(name);

        let deps = self.dependencies_of(name);
        for dep in deps {
            let Some((dep_node, _)) = self.edges.get_key_value(dep.as_str()) else {
                return Err(Error::MissingDependency {
                    requester: name.to_string(),
                    missing: dep.clone(),
                });
            };
            self.visit(dep_node, marks, path, plan)?;
        }

        path.pop();
        marks.insert(name, Mark::Done);
        plan.push(name, deps);
        Ok(())
    }

    /// Resolve each request on its own, so that one failing request does
    /// not prevent the others from being planned.
    pub fn resolve_each<S: AsRef<str>>(&self, requested: &[S]) -> Vec<(String, Result<InstallPlan>)> {
        requested
            .iter()
            .map(|name| {
                let name = name.as_ref();
                (name.to_string(), self.resolve(&[name]))
            })
            .collect()
    }

    /// Resolve every node, in name order.
    pub fn resolve_all(&self) -> Result<InstallPlan> {
        self.resolve(&self.names())
    }
}

/// Dependency-ordered extensions to install in one provisioning run.
///
/// Each entry keeps its direct dependencies so later stages can tell which
/// entries are affected by a failure without the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    order: Vec<String>,
    deps: HashMap<String, Vec<String>>,
}

impl InstallPlan {
    fn push(&mut self, name: &str, deps: &[String]) {
        if self.deps.contains_key(name) {
            return;
        }
        self.order.push(name.to_string());
        self.deps.insert(name.to_string(), deps.to_vec());
    }

    /// Append the entries of `other` that are not yet planned.
    ///
    /// Both plans are dependency-ordered, so the merged plan is too.
    pub fn merge(&mut self, other: &InstallPlan) {
        for name in &other.order {
            self.push(name, other.dependencies_of(name));
        }
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.deps.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.deps.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// For every entry that (transitively) depends on one of `failed`,
    /// the name of the failed or blocked dependency it waits on.
    pub fn blocked_by(&self, failed: &HashSet<String>) -> HashMap<String, String> {
        let mut blocked: HashMap<String, String> = HashMap::new();
        for name in &self.order {
            if failed.contains(name) {
                continue;
            }
            let culprit = self
                .dependencies_of(name)
                .iter()
                .find(|d| failed.contains(*d) || blocked.contains_key(*d));
            if let Some(dep) = culprit {
                blocked.insert(name.clone(), dep.clone());
            }
        }
        blocked
    }
}

impl<'a> IntoIterator for &'a InstallPlan {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (name, deps) in edges {
            graph.add_node(name);
            for dep in *deps {
                graph.add_edge(name, dep);
            }
        }
        graph
    }

    #[test]
    fn test_empty_request() {
        let graph = DependencyGraph::new();
        let plan = graph.resolve::<&str>(&[]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_single_node() {
        let graph = graph(&[("a", &[])]);
        let plan = graph.resolve(&["a"]).unwrap();
        assert_eq!(plan.names(), ["a"]);
    }

    #[test]
    fn test_linear_chain() {
        let graph = graph(&[("c", &["b"]), ("b", &["a"]), ("a", &[])]);
        let plan = graph.resolve(&["c"]).unwrap();
        assert_eq!(plan.names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_dependency_emitted_once() {
        let graph = graph(&[
            ("top", &["left", "right"]),
            ("left", &["base"]),
            ("right", &["base"]),
            ("base", &[]),
        ]);
        let plan = graph.resolve(&["top"]).unwrap();
        assert_eq!(plan.names(), ["base", "left", "right", "top"]);
    }

    #[test]
    fn test_sibling_order_follows_declaration() {
        let graph = graph(&[("top", &["zebra", "alpha"]), ("zebra", &[]), ("alpha", &[])]);
        let plan = graph.resolve(&["top"]).unwrap();
        assert_eq!(plan.names(), ["zebra", "alpha", "top"]);
    }

    #[test]
    fn test_multiple_requests_deduplicated() {
        let graph = graph(&[("a", &["base"]), ("b", &["base"]), ("base", &[])]);
        let plan = graph.resolve(&["a", "b", "a"]).unwrap();
        assert_eq!(plan.names(), ["base", "a", "b"]);
    }

    #[test]
    fn test_two_node_cycle_names_both() {
        let graph = graph(&[("A", &["B"]), ("B", &["A"])]);
        let err = graph.resolve(&["A"]).unwrap_err();
        match err {
            Error::DependencyCycle { ref cycle } => {
                assert_eq!(cycle, &["A", "B", "A"]);
            }
            other => panic!("expected DependencyCycle, got {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains('A') && msg.contains('B'));
    }

    #[test]
    fn test_cycle_path_excludes_entry_prefix() {
        let graph = graph(&[("entry", &["x"]), ("x", &["y"]), ("y", &["z"]), ("z", &["x"])]);
        let err = graph.resolve(&["entry"]).unwrap_err();
        assert!(
            matches!(err, Error::DependencyCycle { ref cycle } if cycle == &["x", "y", "z", "x"]),
            "got {err:?}"
        );
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let graph = graph(&[("a", &["a"])]);
        assert!(matches!(
            graph.resolve(&["a"]),
            Err(Error::DependencyCycle { .. })
        ));
    }

    #[test]
    fn test_missing_dependency_names_requester_and_missing() {
        let graph = graph(&[("A", &["C"])]);
        let err = graph.resolve(&["A"]).unwrap_err();
        assert!(
            matches!(err, Error::MissingDependency { ref requester, ref missing } if requester == "A" && missing == "C"),
            "got {err:?}"
        );
        assert!(err.to_string().contains('C'));
    }

    #[test]
    fn test_unknown_root() {
        let graph = graph(&[("a", &[])]);
        assert!(matches!(
            graph.resolve(&["nope"]),
            Err(Error::UnknownExtension(ref n)) if n == "nope"
        ));
    }

    #[test]
    fn test_resolve_each_isolates_failures() {
        let graph = graph(&[("good", &["base"]), ("base", &[]), ("bad", &["ghost"])]);
        let results = graph.resolve_each(&["bad", "good"]);
        assert!(results[0].1.is_err());
        assert_eq!(results[1].1.as_ref().unwrap().names(), ["base", "good"]);
    }

    #[test]
    fn test_resolve_all_is_deterministic() {
        let graph = graph(&[("m", &["z"]), ("z", &[]), ("a", &[])]);
        let first = graph.resolve_all().unwrap();
        let second = graph.resolve_all().unwrap();
        assert_eq!(first.names(), ["a", "z", "m"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_preserves_order() {
        let graph = graph(&[("a", &["base"]), ("b", &["base", "c"]), ("base", &[]), ("c", &[])]);
        let mut plan = graph.resolve(&["a"]).unwrap();
        plan.merge(&graph.resolve(&["b"]).unwrap());
        assert_eq!(plan.names(), ["base", "a", "c", "b"]);
    }

    #[test]
    fn test_blocked_by_is_transitive() {
        let graph = graph(&[
            ("base", &[]),
            ("mid", &["base"]),
            ("top", &["mid"]),
            ("other", &[]),
        ]);
        let plan = graph.resolve(&["top", "other"]).unwrap();
        let failed: HashSet<String> = ["base".to_string()].into();

        let blocked = plan.blocked_by(&failed);

        assert_eq!(blocked.get("mid").map(String::as_str), Some("base"));
        assert_eq!(blocked.get("top").map(String::as_str), Some("mid"));
        assert!(!blocked.contains_key("other"));
        assert!(!blocked.contains_key("base"));
    }

    #[test]
    fn test_from_manifests() {
        let target = ExtensionManifest::from_json(
            r#"{"seeding":{"enabled":true,"script":"seed.sh","runOnce":true},"dependencies":["org.example.base"]}"#,
        )
        .unwrap();
        let base = ExtensionManifest::default();
        let graph = DependencyGraph::from_manifests(&[
            ("org.example.target", &target),
            ("org.example.base", &base),
        ]);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let plan = graph.resolve(&["org.example.target"]).unwrap();
        assert_eq!(plan.names(), ["org.example.base", "org.example.target"]);
    }
}
