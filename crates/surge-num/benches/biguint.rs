//! Limb-core benchmarks
//!
//! Measures the hot paths behind literal parsing and float formatting:
//! schoolbook multiply, long division, and base-1e9 decimal rendering.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use surge_num::BigUint;

fn operand(limbs: usize, seed: u32) -> BigUint {
    let limbs: Vec<u32> = (0..limbs as u32)
        .map(|i| seed.wrapping_mul(0x9E37_79B9).wrapping_add(i * 0x85EB_CA6B) | 1)
        .collect();
    BigUint::from_limbs(limbs).unwrap()
}

fn bench_mul(c: &mut Criterion) {
    let mut group = c.benchmark_group("mul");
    for size in [8usize, 64, 512] {
        let a = operand(size, 1);
        let b = operand(size, 2);
        group.bench_function(format!("{size}x{size}_limbs"), |bench| {
            bench.iter(|| black_box(&a).mul(black_box(&b)).unwrap());
        });
    }
    group.finish();
}

fn bench_div_mod(c: &mut Criterion) {
    let mut group = c.benchmark_group("div_mod");
    let a = operand(128, 3);
    let b = operand(32, 4);
    group.bench_function("128_by_32_limbs", |bench| {
        bench.iter(|| black_box(&a).div_mod(black_box(&b)).unwrap());
    });
    group.bench_function("small_divisor", |bench| {
        bench.iter(|| black_box(&a).div_mod_small(black_box(1_000_000_007)).unwrap());
    });
    group.finish();
}

fn bench_to_decimal(c: &mut Criterion) {
    let a = operand(64, 5);
    c.bench_function("to_decimal_64_limbs", |bench| {
        bench.iter(|| black_box(&a).to_decimal());
    });
}

criterion_group!(benches, bench_mul, bench_div_mod, bench_to_decimal);
criterion_main!(benches);
