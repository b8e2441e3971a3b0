//! # World Benchmark
//!
//! Measures object churn, hierarchy transform refresh and a full frame with
//! a parallel update function over many components.
//!
//! Run with: `cargo bench --package hearth_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hearth_core::scene::{Component, ComponentManager, GameObjectDesc, UpdateFunctionDesc, UpdatePhase, World, WorldDesc};
use hearth_shared::{Transform, Vec3};

#[derive(Default)]
struct Mover {
    velocity: f32,
    distance: f32,
}

impl Component for Mover {
    fn register_update_functions(manager: &mut ComponentManager<Self>) {
        manager.register_update_function(
            UpdateFunctionDesc::<Self>::new("move", UpdatePhase::Async, |range, ctx| {
                let dt = ctx.view.clock().delta_seconds();
                for slot in range.iter_mut() {
                    slot.distance += slot.velocity * dt;
                }
            })
            .with_granularity(1024),
        );
    }
}

fn bench_object_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("object_churn");

    for count in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut world = World::new(WorldDesc::default());
            b.iter(|| {
                let handles: Vec<_> = (0..count)
                    .filter_map(|_| world.create_object(GameObjectDesc::new("churn")).ok())
                    .collect();
                for handle in handles {
                    black_box(world.delete_object(handle));
                }
            });
        });
    }

    group.finish();
}

fn bench_transform_refresh(c: &mut Criterion) {
    let mut world = World::new(WorldDesc::default());
    let mut parents = Vec::new();
    for i in 0..100 {
        let Ok(root) = world.create_object(GameObjectDesc::new(format!("root{i}"))) else {
            continue;
        };
        parents.push(root);
        let mut parent = root;
        for depth in 0..10 {
            let desc = GameObjectDesc::new(format!("node{depth}"))
                .with_parent(parent)
                .with_transform(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
            if let Ok(child) = world.create_object(desc) {
                parent = child;
            }
        }
    }

    c.bench_function("transform_refresh_100x10", |b| {
        let mut x = 0.0f32;
        b.iter(|| {
            x += 1.0;
            for &root in &parents {
                world.set_local_transform(root, Transform::from_position(Vec3::new(x, 0.0, 0.0)));
            }
            world.update(1.0 / 60.0);
        });
    });
}

fn bench_parallel_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_frame");

    for count in [10_000, 100_000] {
        let mut world = World::new(WorldDesc::default());
        for i in 0..count {
            if let Ok(object) = world.create_object(GameObjectDesc::new("mover")) {
                let _ = world.create_component(
                    object,
                    Mover {
                        velocity: i as f32,
                        distance: 0.0,
                    },
                );
            }
        }
        world.update(0.0);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| world.update(black_box(1.0 / 60.0)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_object_churn, bench_transform_refresh, bench_parallel_frame);
criterion_main!(benches);
