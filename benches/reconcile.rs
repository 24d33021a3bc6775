//! Benchmarks for the pure reconciliation paths
//!
//! Planning and mount cross-referencing run on every list/push.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use devsync::reconcile::naming::resolve_child_name;
use devsync::reconcile::reconciler::plan;
use devsync::reconcile::wiring::{cross_reference, RESERVED_MOUNTS, SOURCE_VOLUME};
use devsync::StorageSpec;
use k8s_openapi::api::core::v1::{Container, PodSpec, VolumeMount};

fn storage(count: usize, size: &str) -> Vec<StorageSpec> {
    (0..count)
        .map(|i| StorageSpec::new(format!("vol-{:04}", i), size, format!("/mnt/{}", i), "runtime"))
        .collect()
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for count in [10, 100, 1000] {
        // half overlap, equal sizes written differently
        let declared = storage(count, "1Gi");
        let observed: Vec<_> = storage(count + count / 2, "1024Mi")
            .into_iter()
            .skip(count / 2)
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| plan(black_box(&declared), black_box(&observed)));
        });
    }

    group.finish();
}

fn bench_cross_reference(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_reference");

    let mount = |name: String, path: String| VolumeMount {
        name,
        mount_path: path,
        ..Default::default()
    };
    let containers: Vec<Container> = (0..8)
        .map(|c| Container {
            name: format!("container-{}", c),
            volume_mounts: Some(
                (0..32)
                    .map(|v| mount(format!("vol-{}-vol", v), format!("/mnt/{}", v)))
                    .chain(std::iter::once(mount(SOURCE_VOLUME.into(), "/projects".into())))
                    .collect(),
            ),
            ..Default::default()
        })
        .collect();
    let pod = PodSpec {
        init_containers: Some(vec![Container {
            name: "init".into(),
            volume_mounts: Some(vec![mount("init-only".into(), "/opt".into())]),
            ..Default::default()
        }]),
        containers,
        ..Default::default()
    };

    group.throughput(Throughput::Elements(8 * 33));
    group.bench_function("8x33_mounts", |b| {
        b.iter(|| cross_reference(black_box(&pod), &RESERVED_MOUNTS));
    });

    group.finish();
}

fn bench_naming(c: &mut Criterion) {
    let mut group = c.benchmark_group("naming");
    let long = "v".repeat(70);

    group.bench_function("short", |b| {
        b.iter(|| resolve_child_name(black_box("data"), &["nodejs", "app"]));
    });
    group.bench_function("truncated", |b| {
        b.iter(|| resolve_child_name(black_box(&long), &["nodejs", "app"]));
    });

    group.finish();
}

criterion_group!(benches, bench_plan, bench_cross_reference, bench_naming);
criterion_main!(benches);
