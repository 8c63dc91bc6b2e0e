//! Benchmarks for token hot paths

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use warden_auth_core::{constant_time_eq, hash_token, AuthConfig, TokenCodec};
use warden_types::{Role, TenantId, TokenFamilyId, UserId};

fn codec() -> TokenCodec {
    TokenCodec::new(&AuthConfig::new("b".repeat(32), "warden-bench")).unwrap()
}

fn bench_access_tokens(c: &mut Criterion) {
    let codec = codec();
    let (user, tenant) = (UserId::new(), TenantId::new());

    c.bench_function("access_encode", |b| {
        b.iter(|| codec.encode_access(black_box(user), black_box(tenant), Role::Admin, Utc::now()));
    });

    let (token, _) = codec
        .encode_access(user, tenant, Role::Admin, Utc::now())
        .unwrap();
    c.bench_function("access_validate", |b| {
        b.iter(|| codec.validate_access(black_box(&token)));
    });

    c.bench_function("access_validate_garbage", |b| {
        b.iter(|| codec.validate_access(black_box("eyJhbGciOiJIUzI1NiJ9.e30.bad")));
    });
}

fn bench_refresh_tokens(c: &mut Criterion) {
    let codec = codec();
    let (token, _) = codec
        .encode_refresh(UserId::new(), TokenFamilyId::new(), Utc::now())
        .unwrap();

    c.bench_function("refresh_decode", |b| {
        b.iter(|| codec.decode_refresh(black_box(&token)));
    });

    c.bench_function("refresh_hash", |b| {
        b.iter(|| hash_token(black_box(&token)));
    });
}

fn bench_constant_time_eq(c: &mut Criterion) {
    let mut group = c.benchmark_group("constant_time_eq");

    for size in [32, 64, 128] {
        let a: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        let mut b = a.clone();
        b[size - 1] ^= 0xFF;

        group.bench_with_input(BenchmarkId::new("differ_at_end", size), &(a, b), |bench, (a, b)| {
            bench.iter(|| constant_time_eq(black_box(a), black_box(b)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_access_tokens,
    bench_refresh_tokens,
    bench_constant_time_eq
);
criterion_main!(benches);
