use std::sync::Arc;
use std::time::Duration;

use coffer::core::cipher::envelope::{self, OpenOptions};
use coffer::core::cipher::SymmetricKey;
use coffer::core::domain::{Scope, SecretCiphertext};
use coffer::core::identity::{DeviceKeys, IdentityManager};
use coffer::core::kdf;
use coffer::core::keys::CachedKey;
use coffer::core::secrets::{self, Keyring};
use coffer::core::store::Memory;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Generate a payload of given size.
fn generate_payload(size: usize) -> String {
    "x".repeat(size)
}

fn device(name: &str) -> DeviceKeys {
    let manager = IdentityManager::new(Arc::new(Memory::new()));
    let identity = manager.create_device_identity(Some(name), None).unwrap();
    manager.load_device(&identity).unwrap()
}

fn scope() -> Scope {
    Scope::new("acme", "api", "prod").unwrap()
}

fn stored(scope: &Scope, name: &str, value: &str, key: &CachedKey, device: &DeviceKeys) -> SecretCiphertext {
    let request =
        secrets::build_secret_payload(scope, name, value, key, &device.signing_key, None).unwrap();
    SecretCiphertext {
        payload: request.payload,
        version: 1,
        client_sig: request.client_sig,
        device_id: Some(device.identity.device_id.clone()),
    }
}

/// Benchmark envelope seal/open with varying payload sizes.
fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    group.sample_size(50);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let alice = device("alice");
    let bob = device("bob");
    let to = bob.identity.encryption_key().unwrap();
    let sizes = [32, 256, 1024, 4096, 16384];

    for size in sizes {
        let payload = generate_payload(size);
        let sealed = envelope::encrypt_for_device(
            &alice.identity,
            &alice.signing_key,
            &to,
            payload.as_bytes(),
            None,
        )
        .unwrap();

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(
            BenchmarkId::new("seal", format!("{}B", size)),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let sealed = envelope::encrypt_for_device(
                        &alice.identity,
                        &alice.signing_key,
                        black_box(&to),
                        black_box(payload.as_bytes()),
                        None,
                    )
                    .unwrap();
                    black_box(sealed);
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("open", format!("{}B", size)),
            &sealed,
            |b, sealed| {
                b.iter(|| {
                    let opened = envelope::open_with_secret(
                        black_box(sealed),
                        &bob.encryption_key,
                        OpenOptions::default(),
                    )
                    .unwrap();
                    black_box(opened);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the secret payload codec under one environment key.
fn bench_secret_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("secret_payload");
    group.sample_size(50);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let alice = device("alice");
    let scope = scope();
    let key = CachedKey::new(SymmetricKey::generate(), 1);
    let keyring = Keyring::single(&scope, key.clone());
    let sizes = [32, 256, 4096];

    for size in sizes {
        let value = generate_payload(size);
        let record = stored(&scope, "DATABASE_URL", &value, &key, &alice);

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(
            BenchmarkId::new("build", format!("{}B", size)),
            &value,
            |b, value| {
                b.iter(|| {
                    let request = secrets::build_secret_payload(
                        &scope,
                        "DATABASE_URL",
                        black_box(value),
                        &key,
                        &alice.signing_key,
                        None,
                    )
                    .unwrap();
                    black_box(request);
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("decrypt", format!("{}B", size)),
            &record,
            |b, record| {
                b.iter(|| {
                    let value = secrets::decrypt_secret(black_box(record), &scope, &keyring).unwrap();
                    black_box(value);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark pulling a whole environment as the bundle grows.
fn bench_bundle_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundle_scaling");
    group.sample_size(30);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let alice = device("alice");
    let scope = scope();
    let key = CachedKey::new(SymmetricKey::generate(), 1);
    let keyring = Keyring::single(&scope, key.clone());
    let counts = [1, 10, 50, 100];

    for count in counts {
        let records: Vec<_> = (0..count)
            .map(|i| stored(&scope, &format!("VAR_{}", i), "value", &key, &alice))
            .collect();

        group.bench_with_input(
            BenchmarkId::new("decrypt_bundle", format!("{}_secrets", count)),
            &records,
            |b, records| {
                b.iter(|| {
                    let report = secrets::decrypt_bundle(black_box(records), &scope, &keyring);
                    black_box(report);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the HKDF key hierarchy walk.
fn bench_kdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdf");
    group.sample_size(50);

    let seed = [7u8; 32];
    let env_kek = kdf::env_kek_from_master(&seed, "acme", "api", "prod").unwrap();

    group.bench_function("env_kek_from_master", |b| {
        b.iter(|| {
            let key = kdf::env_kek_from_master(black_box(&seed), "acme", "api", "prod").unwrap();
            black_box(key);
        });
    });

    group.bench_function("var_dek", |b| {
        b.iter(|| {
            let key = kdf::var_dek(black_box(&env_kek), "DATABASE_URL", 1).unwrap();
            black_box(key);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_envelope,
    bench_secret_payload,
    bench_bundle_scaling,
    bench_kdf,
);
criterion_main!(benches);
