//! User pool partitioning benchmark suite

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rhdh_perf::partition::{generate_usernames, partition_users, worker_chunk, UserPool};

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for users in [100usize, 1_000, 10_000] {
        let names = generate_usernames("test", users);

        group.bench_with_input(BenchmarkId::new("generate", users), &users, |bencher, &users| {
            bencher.iter(|| black_box(generate_usernames(black_box("test"), users)))
        });

        for workers in [1usize, 4, 16] {
            group.bench_with_input(
                BenchmarkId::new(format!("split_{workers}_workers"), users),
                &names,
                |bencher, names| bencher.iter(|| black_box(partition_users(black_box(names), workers))),
            );
        }

        group.bench_with_input(BenchmarkId::new("worker_chunk", users), &users, |bencher, &users| {
            bencher.iter(|| black_box(worker_chunk("test", users, 3, 8)))
        });
    }

    group.finish();
}

fn bench_pool_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("user_pool");
    let names = generate_usernames("t_", 1_000);

    group.bench_function("drain_1000", |bencher| {
        bencher.iter(|| {
            let pool = UserPool::new("t_", names.clone());
            for _ in 0..names.len() {
                black_box(pool.pop());
            }
            black_box(pool.remaining())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_partition, bench_pool_drain);
criterion_main!(benches);
