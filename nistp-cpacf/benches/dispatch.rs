//! Dispatch benchmarks: the CPACF method (native, or emulated off IBM Z)
//! against the software fallback.

use criterion::{
    BenchmarkGroup, Criterion, criterion_group, criterion_main, measurement::Measurement,
};
use hex_literal::hex;
use nistp_cpacf::{
    Capabilities, Config, EcGroup, EcKey, Emulator, Instructions, NistCurve, Signature,
    num_bigint::{BigInt, BigUint},
    p256::NistP256,
    p384::NistP384,
    p521::NistP521,
};
use rand_core::OsRng;
use std::hint::black_box;

const SCALAR: [u8; 32] = hex!("1cf6bc6c7f642a84994119e206c9f0753ff100709f4fd12f2338c1be60bf4175");

fn bench_group<M: Measurement, C: NistCurve, I: Instructions>(
    g: &mut BenchmarkGroup<'_, M>,
    label: &str,
    group: &EcGroup<C, I>,
) {
    let k = BigInt::from(BigUint::from_bytes_be(&SCALAR));
    let key = EcKey::generate(group, &mut OsRng).unwrap();
    let point = key.public().unwrap().clone();
    let digest = [0x5au8; 32];
    let signature: Signature = group.sign(&mut OsRng, &digest, &key, None).unwrap();

    g.bench_function(format!("{label}/mul_generator"), |b| {
        b.iter(|| group.mul_generator(black_box(&k)))
    });
    g.bench_function(format!("{label}/mul_point"), |b| {
        b.iter(|| group.mul_point(black_box(&point), black_box(&k)))
    });
    g.bench_function(format!("{label}/sign"), |b| {
        b.iter(|| group.sign(&mut OsRng, black_box(&digest), &key, None))
    });
    g.bench_function(format!("{label}/verify"), |b| {
        b.iter(|| group.verify(black_box(&digest), black_box(&signature), &key))
    });
}

fn bench_curve<C: NistCurve>(c: &mut Criterion) {
    let mut g = c.benchmark_group(C::DESCRIPTOR.name);

    let native = EcGroup::<C>::new(Config::detect());
    let emulator = Emulator::new();
    let emulated =
        EcGroup::<C, _>::with_instructions(Config::new(Capabilities::all()), &emulator);
    let software = EcGroup::<C>::new(Config::software());

    bench_group(&mut g, "native", &native);
    bench_group(&mut g, "emulated", &emulated);
    bench_group(&mut g, "software", &software);

    g.finish();
}

fn bench_p256(c: &mut Criterion) {
    bench_curve::<NistP256>(c);
}

fn bench_p384(c: &mut Criterion) {
    bench_curve::<NistP384>(c);
}

fn bench_p521(c: &mut Criterion) {
    bench_curve::<NistP521>(c);
}

criterion_group!(benches, bench_p256, bench_p384, bench_p521);
criterion_main!(benches);
