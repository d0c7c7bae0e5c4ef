//! Performance benchmarks for the intrascan engine

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use intrascan::{
    cache::AccessCache,
    config::ScanConfig,
    network::{FtpLister, HostnameResolver, Reachability, ShareLister},
    scanner::{range, ScanEngine},
    Access, Collaborators, Protocol, Service,
};

/// Benchmark candidate generation
fn bench_range_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_expansion");
    let base = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 20));

    for subnet in [24u8, 20, 16].iter() {
        group.bench_with_input(BenchmarkId::new("expand", subnet), subnet, |b, &subnet| {
            b.iter(|| black_box(range::expand(black_box(base), subnet)))
        });
    }

    group.finish();
}

fn granted_map(size: u8) -> HashMap<Service, Access> {
    (0..size)
        .flat_map(|third| {
            (1..=254u8).map(move |fourth| {
                let addr = IpAddr::V4(Ipv4Addr::new(10, 0, third, fourth));
                let access = if fourth % 3 == 0 { Access::Denied } else { Access::Granted };
                (Service::new(Protocol::Http, addr), access)
            })
        })
        .collect()
}

/// Benchmark gate queries and merges
fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_cache");
    let cache = AccessCache::new();
    cache.replace(granted_map(16));

    group.bench_function("query_hit", |b| {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 7, 100));
        b.iter(|| black_box(cache.query(Protocol::Http, black_box(addr))))
    });

    group.bench_function("query_miss", |b| {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 99, 7, 100));
        b.iter(|| black_box(cache.query(Protocol::Ftp, black_box(addr))))
    });

    group.bench_function("extend_4k", |b| {
        let update = granted_map(16);
        b.iter(|| cache.extend(update.clone()))
    });

    group.finish();
}

struct Immediate;

#[async_trait]
impl Reachability for Immediate {
    async fn is_reachable(&self, _: IpAddr, _: u16, _: Duration) -> bool {
        true
    }
}

#[async_trait]
impl FtpLister for Immediate {
    async fn list_anonymous(&self, _: IpAddr, _: u16, _: Duration) -> intrascan::Result<Vec<String>> {
        Ok(vec!["pub".to_string()])
    }
}

#[async_trait]
impl ShareLister for Immediate {
    async fn list_root(&self, _: IpAddr, _: u16, _: Duration) -> intrascan::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl HostnameResolver for Immediate {
    async fn resolve(&self, addr: IpAddr, _: Duration) -> intrascan::Result<String> {
        Ok(addr.to_string())
    }
}

/// Benchmark dispatch overhead with collaborators that answer at once
fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");
    group.sample_size(10); // Reduce sample size for expensive operations

    let candidates = range::expand(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 22).unwrap();
    for concurrency in [10usize, 100, 500].iter() {
        group.bench_with_input(
            BenchmarkId::new("full_run", concurrency),
            concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    rt.block_on(async {
                        let fake = Arc::new(Immediate);
                        let collaborators = Collaborators {
                            reachability: fake.clone(),
                            ftp: fake.clone(),
                            smb: fake.clone(),
                            resolver: fake,
                        };
                        let config = ScanConfig::new(concurrency, 1000);
                        let mut engine = ScanEngine::with_collaborators(&config, collaborators).unwrap();
                        for protocol in Protocol::ALL {
                            engine.add_protocol(protocol, candidates.iter().copied());
                        }
                        engine.start();
                        engine.terminate().await;
                        black_box(engine.services().len())
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_range_expansion, bench_cache, bench_dispatch);

criterion_main!(benches);
