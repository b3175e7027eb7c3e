//! Benchmark for one room step.
//!
//! TARGET: a 64-player room steps well inside the 50ms tick budget
//!
//! Run with: cargo bench --package bullion_sim --bench step_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bullion_shared::DeterministicRng;
use bullion_sim::{Engine, PlayerInput, SimConfig};

fn populated_room(players: usize) -> (Engine, Vec<String>) {
    let mut engine = Engine::new(SimConfig::default(), 1234).expect("default config is valid");
    let sessions: Vec<String> = (0..players).map(|i| format!("bot-{i}")).collect();
    for s in &sessions {
        engine.add_player(s, s, s, 1_000).expect("non-zero stake");
    }
    (engine, sessions)
}

fn random_input(rng: &mut DeterministicRng) -> PlayerInput {
    PlayerInput {
        w: rng.next_f64() < 0.3,
        a: rng.next_f64() < 0.3,
        s: rng.next_f64() < 0.3,
        d: rng.next_f64() < 0.3,
        aim_x: rng.range(-1.0, 1.0),
        aim_y: rng.range(-1.0, 1.0),
        shoot: rng.next_f64() < 0.5,
        dash: rng.next_f64() < 0.2,
        exit: false,
    }
}

fn benchmark_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("room_step");
    for players in [8usize, 32, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, &n| {
            let (mut engine, sessions) = populated_room(n);
            let mut rng = DeterministicRng::new(7);
            b.iter(|| {
                for s in &sessions {
                    engine.set_input(s, random_input(&mut rng));
                }
                black_box(engine.step())
            });
        });
    }
    group.finish();
}

fn benchmark_snapshot(c: &mut Criterion) {
    let (mut engine, _) = populated_room(64);
    for _ in 0..200 {
        engine.step();
    }
    c.bench_function("world_nodes_64", |b| b.iter(|| black_box(engine.world_nodes())));
    c.bench_function("state_digest_64", |b| b.iter(|| black_box(engine.state_digest())));
}

criterion_group!(benches, benchmark_step, benchmark_snapshot);
criterion_main!(benches);
