//! Sync pass benchmarks
//!
//! Measures subscriber recomputation and dispatch at various client counts.
//!
//! Run with: cargo bench --bench sync_pass

use std::sync::Arc;

use colony_sync_server::colony::work_order::{BuildOrder, WorkOrder, WorkOrderRegistry};
use colony_sync_server::colony::Colony;
use colony_sync_server::net::sink::RecordingSink;
use colony_sync_server::sync::{ConnectedClient, InterestRadii, SyncCoordinator, WorldSnapshot};
use colony_sync_server::util::vec3::{BlockPos, Vec3};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use uuid::Uuid;

/// Colony with a handful of buildings and one work order per building
fn create_colony(orders: usize) -> Colony {
    let registry = Arc::new(WorkOrderRegistry::with_builtin_kinds().expect("builtin kinds"));
    let mut colony = Colony::new(1, "Bench", 0, BlockPos::new(0, 64, 0), registry);
    for i in 0..orders as i32 {
        let pos = BlockPos::new(i * 8, 64, 0);
        colony.buildings_mut().add_building(pos, "house");
        colony
            .work_manager_mut()
            .add_work_order(WorkOrder::new(BuildOrder::new(pos, "house", 1)));
    }
    colony
}

/// Clients spread uniformly over a square twice the retain radius
fn create_world(count: usize) -> WorldSnapshot {
    let mut rng = rand::thread_rng();
    let clients = (0..count)
        .map(|i| {
            let position = Vec3::new(rng.gen_range(-800.0..800.0), 64.0, rng.gen_range(-800.0..800.0));
            ConnectedClient::new(Uuid::new_v4(), format!("Client{}", i), 0, position)
        })
        .collect();
    WorldSnapshot::new(clients, [0])
}

/// Steady state: nothing dirty, nobody new
fn bench_idle_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("idle_pass");
    group.sample_size(50);

    for count in [100, 500, 1000, 5000] {
        let mut colony = create_colony(20);
        let world = create_world(count);
        let mut coordinator = SyncCoordinator::new(InterestRadii::default(), u32::MAX);
        let mut sink = RecordingSink::new();
        coordinator.update_subscribers(&mut colony, Some(&world), &mut sink);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("clients", count), &count, |b, _| {
            b.iter(|| {
                sink.clear();
                black_box(coordinator.update_subscribers(&mut colony, Some(&world), &mut sink))
            })
        });
    }
    group.finish();
}

/// Work orders dirty every pass: full book to every subscriber
fn bench_dirty_work_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("dirty_work_orders");
    group.sample_size(30);

    for count in [100, 500, 1000] {
        let mut colony = create_colony(50);
        let world = create_world(count);
        let mut coordinator = SyncCoordinator::new(InterestRadii::default(), u32::MAX);
        let mut sink = RecordingSink::new();
        coordinator.update_subscribers(&mut colony, Some(&world), &mut sink);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("clients", count), &count, |b, _| {
            b.iter(|| {
                sink.clear();
                colony.work_manager_mut().claim(1, 1);
                black_box(coordinator.update_subscribers(&mut colony, Some(&world), &mut sink))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_idle_pass, bench_dirty_work_orders);
criterion_main!(benches);
