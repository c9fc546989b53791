use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kitchen_extensions::{DependencyGraph, ExtensionCatalog};
use kitchen_test_utils::ExtensionFixture;
use tempfile::tempdir;

/// A layered graph: every node depends on up to three nodes of the layer below.
fn layered_graph(layers: usize, width: usize) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for layer in 0..layers {
        for i in 0..width {
            let name = format!("org.bench.l{layer}n{i}");
            graph.add_node(&name);
            if layer == 0 {
                continue;
            }
            for offset in 0..3 {
                graph.add_edge(&name, &format!("org.bench.l{}n{}", layer - 1, (i + offset) % width));
            }
        }
    }
    graph
}

fn resolve_benchmark(c: &mut Criterion) {
    c.bench_function("DependencyGraph::resolve_all (20x25)", |b| {
        let graph = layered_graph(20, 25);
        b.iter(|| {
            let plan = black_box(&graph).resolve_all().unwrap();
            assert_eq!(plan.len(), 500);
        })
    });

    c.bench_function("DependencyGraph::resolve_each (20x25, top layer)", |b| {
        let graph = layered_graph(20, 25);
        let requests: Vec<String> = (0..25).map(|i| format!("org.bench.l19n{i}")).collect();
        b.iter(|| {
            let plans = graph.resolve_each(black_box(requests.as_slice()));
            assert!(plans.iter().all(|(_, p)| p.is_ok()));
        })
    });
}

fn discover_benchmark(c: &mut Criterion) {
    c.bench_function("ExtensionCatalog::discover (50 extensions)", |b| {
        let dir = tempdir().unwrap();
        for i in 0..50 {
            let mut fixture = ExtensionFixture::new(dir.path(), &format!("org.bench.e{i}")).seed_script("true");
            if i > 0 {
                fixture = fixture.depends_on(&format!("org.bench.e{}", i - 1));
            }
            fixture.create();
        }

        b.iter(|| {
            let catalog = ExtensionCatalog::discover(black_box(dir.path())).unwrap();
            assert_eq!(catalog.len(), 50);
        })
    });
}

criterion_group!(benches, resolve_benchmark, discover_benchmark);
criterion_main!(benches);
