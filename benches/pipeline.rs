//! Integration benchmark for the beacon processing pipeline.
//!
//! Benchmarks the full application loop using the same patterns as the
//! integration tests in app.rs - with a FakeScanner feeding advertisements
//! through run_with_io.

use beacon_listener::app::{Options, Scanner, run_with_io};
use beacon_listener::{
    Advertisement, AdvertisementResult, Backend, BeaconAddress, DataSection, ScanError,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

fn tlm_payload(count: u32) -> Vec<u8> {
    let mut payload = vec![
        0x20, 0x00, // TLM, version 0
        0x0C, 0x1C, // Battery: 3100 mV
        0x19, 0x40, // Temperature: 25.25 °C
    ];
    payload.extend_from_slice(&count.to_be_bytes());
    payload.extend_from_slice(&(count * 10).to_be_bytes());
    payload
}

fn nearable_payload(status: u8) -> Vec<u8> {
    vec![
        0x01, 0xD8, 0x29, 0x3B, 0x01, 0x02, 0x03, 0x04, 0x05, 0x0B, 0xB8, 0x84, 0x01, status,
        0x10, 0xF0, 0x40, 0x05, 0x42,
    ]
}

fn address(index: u8) -> BeaconAddress {
    BeaconAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, index])
}

fn eddystone_advertisement(index: u8, seconds: u64, payload: Vec<u8>) -> Advertisement {
    Advertisement::new(
        address(index),
        -60,
        SystemTime::UNIX_EPOCH + Duration::from_secs(seconds),
        vec![DataSection::service_data(0xFEAA, payload)],
    )
}

/// A fake scanner that yields pre-built advertisements, similar to the one in
/// app.rs tests.
struct FakeScanner {
    results: Vec<AdvertisementResult>,
}

impl FakeScanner {
    fn new(results: Vec<AdvertisementResult>) -> Self {
        Self { results }
    }
}

impl Scanner for FakeScanner {
    fn start_scan(
        &self,
        _backend: Backend,
        _verbose: bool,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<mpsc::Receiver<AdvertisementResult>, ScanError>> + Send + '_,
        >,
    > {
        let results = self.results.clone();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<AdvertisementResult>(results.len().max(1));
            tokio::spawn(async move {
                for r in results {
                    let _ = tx.send(r).await;
                }
            });
            Ok(rx)
        })
    }
}

fn default_options() -> Options {
    Options {
        expiry: Duration::from_secs(10),
        filters: vec![],
        aliases: vec![],
        verbose: false,
        throttle: None,
        backend: Backend::Bluer,
    }
}

/// Benchmark the full application pipeline: scanner -> registry -> sink -> write
fn bench_app_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("app_pipeline");
    let rt = Runtime::new().unwrap();

    // A telemetry beacon updating in place: one insertion, many merges
    group.throughput(Throughput::Elements(100));
    group.bench_function("single_beacon_updates", |b| {
        b.iter(|| {
            let results = (0..100u32)
                .map(|i| Ok(eddystone_advertisement(0x01, u64::from(i), tlm_payload(i))))
                .collect();
            let scanner = FakeScanner::new(results);
            let mut out = Vec::<u8>::with_capacity(8192);
            let mut err = Vec::<u8>::new();

            rt.block_on(async {
                run_with_io(default_options(), &scanner, &mut out, &mut err)
                    .await
                    .unwrap();
            });

            black_box(out)
        })
    });

    // Fresh addresses arriving: insertion plus the expiry sweep every time
    for fleet in [10usize, 50] {
        group.throughput(Throughput::Elements(fleet as u64));
        group.bench_with_input(
            BenchmarkId::new("fleet_insertions", fleet),
            &fleet,
            |b, &fleet| {
                b.iter(|| {
                    let results = (0..fleet)
                        .map(|i| {
                            Ok(eddystone_advertisement(
                                i as u8,
                                i as u64,
                                tlm_payload(i as u32),
                            ))
                        })
                        .collect();
                    let scanner = FakeScanner::new(results);
                    let mut out = Vec::<u8>::with_capacity(8192);
                    let mut err = Vec::<u8>::new();

                    rt.block_on(async {
                        run_with_io(default_options(), &scanner, &mut out, &mut err)
                            .await
                            .unwrap();
                    });

                    black_box(out)
                })
            },
        );
    }

    // A nearable toggling its motion flag on every advertisement
    group.throughput(Throughput::Elements(100));
    group.bench_function("nearable_motion_toggles", |b| {
        b.iter(|| {
            let results = (0..100u8)
                .map(|i| {
                    Ok(Advertisement::new(
                        address(0x01),
                        -60,
                        SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(i)),
                        vec![DataSection::manufacturer_data(
                            0x015D,
                            nearable_payload(if i % 2 == 0 { 0x00 } else { 0x40 }),
                        )],
                    ))
                })
                .collect();
            let scanner = FakeScanner::new(results);
            let mut out = Vec::<u8>::with_capacity(8192);
            let mut err = Vec::<u8>::new();

            rt.block_on(async {
                run_with_io(default_options(), &scanner, &mut out, &mut err)
                    .await
                    .unwrap();
            });

            black_box(out)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_app_pipeline);
criterion_main!(benches);
