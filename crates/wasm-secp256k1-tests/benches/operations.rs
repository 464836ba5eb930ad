use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use wasm_secp256k1::Format;
use wasm_secp256k1_tests::vectors::*;
use wasm_secp256k1_tests::{binding, hex_array, hex_vec};

fn derive_bench(c: &mut Criterion) {
    let mut secp = binding(1);
    let sk = hex_array::<32>(SK1);
    c.bench_function("derive public key", |b| {
        b.iter(|| secp.derive_public_key(black_box(&sk), Format::Compressed))
    });
}

fn sign_bench(c: &mut Criterion) {
    let mut secp = binding(2);
    let sk = hex_array::<32>(SK1);
    let hash = hex_array::<32>(MSG_HASH);
    c.bench_function("sign", |b| {
        b.iter(|| secp.sign(black_box(&sk), black_box(&hash), None))
    });
}

fn verify_bench(c: &mut Criterion) {
    let mut secp = binding(3);
    let sig = hex_array::<64>(SIG_LOW_S);
    let hash = hex_array::<32>(MSG_HASH);
    let pk = hex_vec(PK1_COMPRESSED);
    c.bench_function("verify", |b| {
        b.iter(|| secp.verify(black_box(&sig), black_box(&hash), black_box(&pk)))
    });
}

fn ecdh_bench(c: &mut Criterion) {
    let mut secp = binding(4);
    let sk = hex_array::<32>(SK1);
    let pk = hex_vec(PK2_COMPRESSED);
    c.bench_function("ecdh", |b| {
        b.iter(|| secp.ecdh(black_box(&sk), black_box(&pk)))
    });
}

fn sha256_bench(c: &mut Criterion) {
    let mut secp = binding(5);
    let data = vec![0x42u8; 4096];
    c.bench_function("sha256 4 KiB", |b| b.iter(|| secp.sha256(black_box(&data))));
}

criterion_group!(
    benches,
    derive_bench,
    sign_bench,
    verify_bench,
    ecdh_bench,
    sha256_bench
);
criterion_main!(benches);
