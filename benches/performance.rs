// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Point3;
use polyframe_csg::geometry::primitives;
use polyframe_csg::repair::{CoplanarMerger, MeshValidator, Retriangulator, ValidationParams};
use polyframe_csg::{BatchProcessor, CsgOperation, CsgOrchestrator, EntityJob, GeomSettings, MeshSet, Primitive};

fn validation(settings: &GeomSettings) -> ValidationParams {
    ValidationParams::new(settings, settings.csg_epsilon)
}

fn wall_job(id: usize) -> EntityJob {
    let x = id as f64 * 10.0;
    EntityJob {
        id: format!("wall-{id}"),
        base: primitives::cuboid(Point3::new(x, 0.0, 0.0), Point3::new(x + 4.0, 1.0, 3.0)),
        operands: vec![
            primitives::cuboid(Point3::new(x + 0.5, -0.5, 1.0), Point3::new(x + 1.5, 1.5, 2.0)),
            primitives::cuboid(Point3::new(x + 2.5, -0.5, 0.5), Point3::new(x + 3.5, 1.5, 2.5)),
        ],
        operation: CsgOperation::AMinusB,
    }
}

fn bench_validate(c: &mut Criterion) {
    let settings = GeomSettings::default();
    let validator = MeshValidator::new(validation(&settings));
    let mut group = c.benchmark_group("validate");

    for segments in [16, 64, 256] {
        let cylinder = Primitive::cylinder(Point3::origin(), 1.0, 2.0, segments).to_mesh_set();
        group.bench_with_input(BenchmarkId::new("cylinder", segments), &cylinder, |b, mesh_set| {
            b.iter(|| {
                let mut set = mesh_set.clone();
                validator.check(black_box(&mut set))
            });
        });
    }

    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let settings = GeomSettings::default();
    let params = validation(&settings);
    let mut group = c.benchmark_group("repair");

    let triangulated = primitives::cuboid(Point3::origin(), Point3::new(3.0, 2.0, 1.0));
    group.bench_function("coplanar_merge_cuboid", |b| {
        let merger = CoplanarMerger::new(&settings);
        b.iter(|| {
            let mut set = triangulated.clone();
            merger.merge(black_box(&mut set), &params).unwrap()
        });
    });

    let prism = Primitive::cylinder(Point3::origin(), 1.0, 2.0, 64).to_mesh_set();
    group.bench_function("retriangulate_prism_64", |b| {
        let retriangulator = Retriangulator::new(params);
        b.iter(|| {
            let mut set: MeshSet = prism.clone();
            retriangulator.triangulate(black_box(&mut set), false).unwrap()
        });
    });

    group.finish();
}

fn bench_boolean(c: &mut Criterion) {
    let orchestrator = CsgOrchestrator::new(GeomSettings::default());
    let mut group = c.benchmark_group("boolean");

    let a = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
    let b = primitives::cuboid(Point3::new(0.5, 0.25, 0.25), Point3::new(1.5, 0.75, 0.75));
    for op in [CsgOperation::AMinusB, CsgOperation::Union, CsgOperation::Intersection] {
        group.bench_with_input(BenchmarkId::new("cubes", op), &op, |bench, &op| {
            bench.iter(|| orchestrator.compute(black_box(&a), black_box(&b), op));
        });
    }

    let job = wall_job(0);
    group.bench_function("wall_two_openings", |bench| {
        bench.iter(|| orchestrator.compute_against_many(black_box(&job.base), &job.operands, job.operation, None));
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let processor = BatchProcessor::new(GeomSettings::default());
    let jobs: Vec<EntityJob> = (0..32).map(wall_job).collect();

    let mut group = c.benchmark_group("batch");
    group.sample_size(10);
    group.bench_function("walls_32", |b| {
        b.iter(|| processor.run(black_box(jobs.clone())).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_validate, bench_repair, bench_boolean, bench_batch);
criterion_main!(benches);
