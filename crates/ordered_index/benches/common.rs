use std::hint::black_box;
use std::time::{Duration, Instant};

use bench::{
    apply_medium_runtime_config, apply_small_runtime_config, default_rng, mix_seed, seed_base,
    seed_for_iter,
};
use criterion::measurement::Measurement;
use criterion::{BenchmarkGroup, BenchmarkId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ordered_index::{AvlTree, BPlusTree, BTree, OrderedIndex, RbTree, SkipList};

const SIZES: [usize; 4] = [1_000, 16_000, 64_000, 256_000];
const OPS_PER_ITER: usize = 200;
const GET_HIT_RATE_PERCENT: u64 = 80;
const SCAN_LEN: usize = 32;
const MIXED_UPDATES_PER_ITER: usize = OPS_PER_ITER / 10; // 10% inserts, 10% removes, 80% reads.

#[derive(Clone, Copy)]
enum ReadOp {
    Get { key: u64 },
    Next { key: u64 },
    Scan { key: u64 },
}

#[derive(Clone, Copy)]
enum UpdateOp {
    Insert { key: u64, value: u64 },
    Remove { key: u64 },
}

#[derive(Clone, Copy)]
enum MixedOp {
    Read(ReadOp),
    Update(UpdateOp),
}

trait Workload {
    type Op: Copy;

    fn id() -> u64;

    fn generate(keys: &[u64], size: usize, base_seed: u64, iter: u64, rng: &mut StdRng) -> Vec<Self::Op>;

    fn run<M: OrderedIndex<Key = u64, Value = u64>>(map: &mut M, ops: &[Self::Op]);
}

struct Read;
struct Update;
struct Mixed;

impl Workload for Read {
    type Op = ReadOp;

    fn id() -> u64 {
        1
    }

    fn generate(keys: &[u64], _: usize, _: u64, _: u64, rng: &mut StdRng) -> Vec<ReadOp> {
        (0..OPS_PER_ITER).map(|_| read_op(keys, rng)).collect()
    }

    fn run<M: OrderedIndex<Key = u64, Value = u64>>(map: &mut M, ops: &[ReadOp]) {
        for &op in ops {
            run_read(map, op);
        }
    }
}

impl Workload for Update {
    type Op = UpdateOp;

    fn id() -> u64 {
        2
    }

    fn generate(_: &[u64], size: usize, base_seed: u64, iter: u64, rng: &mut StdRng) -> Vec<UpdateOp> {
        let inserts = OPS_PER_ITER / 2;
        let mut inserted = Vec::with_capacity(inserts);
        let mut ops = Vec::with_capacity(OPS_PER_ITER);
        for i in 0..OPS_PER_ITER {
            if i % 2 == 0 {
                let key = fresh_key(size, base_seed, iter, inserts, i / 2);
                inserted.push(key);
                ops.push(UpdateOp::Insert { key, value: rng.random() });
            } else {
                let idx = rng.random_range(0..inserted.len());
                ops.push(UpdateOp::Remove {
                    key: inserted.swap_remove(idx),
                });
            }
        }
        debug_assert!(inserted.is_empty());
        ops
    }

    fn run<M: OrderedIndex<Key = u64, Value = u64>>(map: &mut M, ops: &[UpdateOp]) {
        for &op in ops {
            run_update(map, op);
        }
    }
}

impl Workload for Mixed {
    type Op = MixedOp;

    fn id() -> u64 {
        3
    }

    fn generate(keys: &[u64], size: usize, base_seed: u64, iter: u64, rng: &mut StdRng) -> Vec<MixedOp> {
        let mut remaining_inserts = MIXED_UPDATES_PER_ITER;
        let mut remaining_removes = MIXED_UPDATES_PER_ITER;
        let mut remaining_reads = OPS_PER_ITER - 2 * MIXED_UPDATES_PER_ITER;
        let mut live: Vec<u64> = Vec::with_capacity(MIXED_UPDATES_PER_ITER);
        let mut ops = Vec::with_capacity(OPS_PER_ITER);

        while ops.len() < OPS_PER_ITER {
            let remaining_slots = OPS_PER_ITER - ops.len();
            let do_read = remaining_reads > 0
                && (remaining_inserts + remaining_removes == 0
                    || rng.random_range(0..remaining_slots) < remaining_reads);
            if do_read {
                ops.push(MixedOp::Read(read_op(keys, rng)));
                remaining_reads -= 1;
                continue;
            }

            let can_remove = remaining_removes > 0 && !live.is_empty();
            let do_remove = can_remove
                && (remaining_inserts == 0
                    || rng.random_range(0..remaining_inserts + remaining_removes) < remaining_removes);
            if do_remove {
                let idx = rng.random_range(0..live.len());
                ops.push(MixedOp::Update(UpdateOp::Remove {
                    key: live.swap_remove(idx),
                }));
                remaining_removes -= 1;
            } else {
                let nth = MIXED_UPDATES_PER_ITER - remaining_inserts;
                let key = fresh_key(size, base_seed, iter, MIXED_UPDATES_PER_ITER, nth);
                live.push(key);
                ops.push(MixedOp::Update(UpdateOp::Insert { key, value: rng.random() }));
                remaining_inserts -= 1;
            }
        }
        debug_assert!(live.is_empty());
        ops
    }

    fn run<M: OrderedIndex<Key = u64, Value = u64>>(map: &mut M, ops: &[MixedOp]) {
        for &op in ops {
            match op {
                MixedOp::Read(op) => run_read(map, op),
                MixedOp::Update(op) => run_update(map, op),
            }
        }
    }
}

fn bench_workload<W, M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    W: Workload,
    T: Measurement<Value = Duration>,
    M: OrderedIndex<Key = u64, Value = u64> + Default,
{
    for &size in &SIZES {
        if size >= 64_000 {
            apply_medium_runtime_config(group);
        } else {
            apply_small_runtime_config(group);
        }
        let base_seed = seed_base(W::id(), size as u64);
        let keys = generate_initial_keys(size, base_seed);
        let mut init_rng = default_rng();
        let mut map = M::default();
        for &k in &keys {
            black_box(map.insert(k, init_rng.random()));
        }

        group.bench_function(BenchmarkId::new(label, size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for iter in 0..iters {
                    let mut rng = StdRng::seed_from_u64(seed_for_iter(base_seed, iter));
                    let ops = W::generate(&keys, size, base_seed, iter, &mut rng);
                    let start = Instant::now();
                    W::run(&mut map, &ops);
                    black_box(map.len());
                    total += start.elapsed();
                }
                total
            })
        });
    }
}

fn generate_initial_keys(size: usize, base_seed: u64) -> Vec<u64> {
    (0..size).map(|i| mix_seed(base_seed ^ (i as u64))).collect()
}

/// Key the map has never seen: ids above `size` are unique per iteration.
fn fresh_key(size: usize, base_seed: u64, iter: u64, per_iter: usize, nth: usize) -> u64 {
    let id = (size as u64)
        .wrapping_add(iter.wrapping_mul(per_iter as u64))
        .wrapping_add(nth as u64);
    mix_seed(base_seed ^ id)
}

fn read_op(keys: &[u64], rng: &mut StdRng) -> ReadOp {
    match rng.random_range(0..3) {
        0 => {
            let hit = rng.random_range(0..100) < GET_HIT_RATE_PERCENT;
            let key = if hit {
                keys[rng.random_range(0..keys.len())]
            } else {
                rng.random()
            };
            ReadOp::Get { key }
        }
        1 => ReadOp::Next { key: rng.random() },
        _ => ReadOp::Scan { key: rng.random() },
    }
}

fn run_read<M: OrderedIndex<Key = u64, Value = u64>>(map: &M, op: ReadOp) {
    match op {
        ReadOp::Get { key } => {
            black_box(map.get(&key).copied());
        }
        ReadOp::Next { key } => {
            black_box(map.next(&key).map(|c| (*c.key(), *c.value())));
        }
        ReadOp::Scan { key } => {
            let mut sum = 0_u64;
            let mut cur = map.next(&key);
            for _ in 0..SCAN_LEN {
                let Some(c) = cur else { break };
                sum = sum.wrapping_add(*c.value());
                cur = c.next();
            }
            black_box(sum);
        }
    }
}

fn run_update<M: OrderedIndex<Key = u64, Value = u64>>(map: &mut M, op: UpdateOp) {
    match op {
        UpdateOp::Insert { key, value } => {
            black_box(map.insert(key, value));
        }
        UpdateOp::Remove { key } => {
            black_box(map.remove(&key));
        }
    }
}

fn bench_all<W, T>(group: &mut BenchmarkGroup<'_, T>)
where
    W: Workload,
    T: Measurement<Value = Duration>,
{
    bench_workload::<W, AvlTree<u64, u64>, _>(group, "avl");
    bench_workload::<W, RbTree<u64, u64>, _>(group, "rb");
    bench_workload::<W, BTree<u64, u64>, _>(group, "btree");
    bench_workload::<W, BPlusTree<u64, u64>, _>(group, "bplus_tree");
    bench_workload::<W, SkipList<u64, u64>, _>(group, "skip_list");
}

pub fn bench_all_read<T: Measurement<Value = Duration>>(group: &mut BenchmarkGroup<'_, T>) {
    bench_all::<Read, T>(group);
}

pub fn bench_all_update<T: Measurement<Value = Duration>>(group: &mut BenchmarkGroup<'_, T>) {
    bench_all::<Update, T>(group);
}

pub fn bench_all_mixed<T: Measurement<Value = Duration>>(group: &mut BenchmarkGroup<'_, T>) {
    bench_all::<Mixed, T>(group);
}
