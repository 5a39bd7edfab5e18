//! Route matching benchmark suite.
//!
//! Measures how fast intercepted URLs are classified:
//! - Table construction from a bootstrap URL
//! - Resolution of bootstrap, asset and foreign URLs
//! - Full interception of rejected requests
//!
//! Run with: cargo bench --bench route_matching
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use url::Url;

use mermaid_headless::{
    Error, HttpRelayClient, InterceptedRequest, RelayClientFactory, RelayRequest, RelayResponse,
    RequestInterceptor, RequestRouter, Result, RouteTable,
};

// ============================================================================
// Configuration
// ============================================================================

const BOOTSTRAP: &str = "http://mermaid.localhost/index.html";

const URLS: &[(&str, &str)] = &[
    ("bootstrap", "http://mermaid.localhost/index.html"),
    ("asset", "http://mermaid.localhost/dist/esm/chunks/mermaid.core.mjs"),
    ("asset_query", "http://mermaid.localhost/mermaid.min.js?v=11.4.0"),
    ("same_origin_other", "http://mermaid.localhost/favicon.ico"),
    ("foreign", "https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.min.js"),
    ("unparsable", "not a url"),
];

fn bootstrap() -> Url {
    Url::parse(BOOTSTRAP).expect("bootstrap url")
}

/// Relay that is never expected to be reached.
struct NullFactory;

struct NullClient;

#[async_trait]
impl HttpRelayClient for NullClient {
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse> {
        Err(Error::relay(request.url, "benchmark relay"))
    }
}

impl RelayClientFactory for NullFactory {
    fn create_client(&self) -> Result<Box<dyn HttpRelayClient>> {
        Ok(Box::new(NullClient))
    }
}

// ============================================================================
// Benchmark: Table Construction
// ============================================================================

fn bench_table_construction(c: &mut Criterion) {
    let url = bootstrap();
    c.bench_function("route_table/for_bootstrap", |b| {
        b.iter(|| RouteTable::for_bootstrap(black_box(&url)).expect("table"));
    });
}

// ============================================================================
// Benchmark: Resolution
// ============================================================================

fn bench_resolve(c: &mut Criterion) {
    let table = RouteTable::for_bootstrap(&bootstrap()).expect("table");

    let mut group = c.benchmark_group("route_table/resolve");
    for &(name, url) in URLS {
        group.bench_with_input(BenchmarkId::from_parameter(name), url, |b, url| {
            b.iter(|| table.resolve(black_box(url)));
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark: Interception
// ============================================================================

fn bench_intercept_rejected(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let table = RouteTable::for_bootstrap(&bootstrap()).expect("table");
    let router = RequestRouter::new(table, Arc::new(NullFactory));

    c.bench_function("router/intercept_foreign", |b| {
        b.to_async(&rt).iter(|| async {
            let request = InterceptedRequest::get(URLS[4].1);
            black_box(router.intercept(request).await)
        });
    });
}

criterion_group!(
    benches,
    bench_table_construction,
    bench_resolve,
    bench_intercept_rejected
);
criterion_main!(benches);
