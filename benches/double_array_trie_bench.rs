//! Benchmarks for the dynamic double-array trie
//!
//! Compares insertion and lookup against `HashMap` and `BTreeMap`, and
//! measures loading a saved array and adopting it as a zero-copy view.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};

use dyndat::DoubleArrayTrie;

// Benchmark data generators
fn generate_dense_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("key_{:06}", i).into_bytes())
        .collect()
}

fn generate_random_keys(count: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(0xda7);
    (0..count)
        .map(|_| {
            let len = rng.gen_range(4..=32);
            (0..len).map(|_| rng.gen_range(b'!'..=b'~')).collect()
        })
        .collect()
}

fn generate_action_keys(count: usize) -> Vec<Vec<u8>> {
    let labels = ["DEP", "NMOD", "OBJ", "SBJ", "PMOD", "VC", "ROOT", "P"];
    (0..count)
        .map(|i| {
            let action = match i % 3 {
                0 => "LARC",
                1 => "RARC",
                _ => "SHIFT",
            };
            format!("{}-{}-{}", action, labels[i % labels.len()], i / 3).into_bytes()
        })
        .collect()
}

fn build(keys: &[Vec<u8>]) -> DoubleArrayTrie<'static> {
    let mut trie = DoubleArrayTrie::new();
    for (i, key) in keys.iter().enumerate() {
        trie.put(key, i as i32).unwrap();
    }
    trie
}

fn bench_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("insertion");

    for (name, keys) in [
        ("dense", generate_dense_keys(10_000)),
        ("random", generate_random_keys(10_000)),
        ("actions", generate_action_keys(10_000)),
    ] {
        group.throughput(Throughput::Elements(keys.len() as u64));

        group.bench_function(format!("double_array_{}", name), |b| {
            b.iter_batched(
                || keys.clone(),
                |keys| {
                    let mut trie = DoubleArrayTrie::new();
                    for (i, key) in keys.iter().enumerate() {
                        trie.put(key, i as i32).unwrap();
                    }
                    black_box(trie)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashmap_{}", name), |b| {
            b.iter_batched(
                || keys.clone(),
                |keys| {
                    let mut map = HashMap::new();
                    for (i, key) in keys.into_iter().enumerate() {
                        map.insert(key, i as i32);
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [1_000usize, 10_000, 50_000] {
        let keys = generate_random_keys(size);
        let trie = build(&keys);
        let hashmap: HashMap<Vec<u8>, i32> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i as i32))
            .collect();
        let btreemap: BTreeMap<Vec<u8>, i32> = hashmap.clone().into_iter().collect();

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("double_array_{}", size), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(trie.get(key, -1));
                }
            })
        });

        group.bench_function(format!("hashmap_{}", size), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(hashmap.get(key));
                }
            })
        });

        group.bench_function(format!("btreemap_{}", size), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(btreemap.get(key));
                }
            })
        });
    }

    group.finish();
}

fn bench_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("persistence");
    let keys = generate_action_keys(20_000);
    let trie = build(&keys);
    let mut bytes = Vec::new();
    trie.write_to(&mut bytes).unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("read_from", |b| {
        b.iter(|| black_box(DoubleArrayTrie::read_from(bytes.as_slice()).unwrap()))
    });

    group.bench_function("borrowed_view", |b| {
        b.iter(|| {
            let view = DoubleArrayTrie::from_slice(trie.array());
            black_box(view.get(b"LARC-DEP-0", -1))
        })
    });

    group.bench_function("first_put_after_load", |b| {
        b.iter_batched(
            || DoubleArrayTrie::read_from(bytes.as_slice()).unwrap(),
            |mut loaded| {
                loaded.put(b"SHIFT-NEW", 1).unwrap();
                black_box(loaded)
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_audit(c: &mut Criterion) {
    let trie = build(&generate_random_keys(20_000));
    c.bench_function("check_20000", |b| b.iter(|| black_box(trie.check())));
}

criterion_group!(
    benches,
    bench_insertion,
    bench_lookup,
    bench_persistence,
    bench_audit
);
criterion_main!(benches);
