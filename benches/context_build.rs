//! Connection bootstrap benchmarks
//!
//! This benchmark suite measures:
//! - TLS context construction for common verification policies
//! - CONNECT request encoding
//! - CONNECT reply parsing
//! - Hostname matching against certificate names
//!
//! Run with: cargo bench --bench context_build

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use openssl::x509::X509;
use securesock::http::proxy::{connect_request, ProxyConfig};
use securesock::http::tls::{
    CertInfo, ConnectionParams, FnProvider, FnValidator, RevocationDescriptor, RevocationError,
    RevocationValidator, TlsContext, TrustSource,
};
use securesock::http::{read_response, Method};
use std::io::Cursor;

// ========== Context Construction ==========

fn bench_context_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_build");

    let no_verify = ConnectionParams::builder("example.com", 443)
        .verify_peer(false)
        .build()
        .unwrap();
    group.bench_function("verify_off", |b| {
        b.iter(|| black_box(TlsContext::build(black_box(&no_verify), None).unwrap()));
    });

    let system = ConnectionParams::builder("example.com", 443).build().unwrap();
    group.bench_function("system_trust", |b| {
        b.iter(|| black_box(TlsContext::build(black_box(&system), None).unwrap()));
    });

    let provider = FnProvider(|_: &TrustSource, _: &RevocationDescriptor| {
        let validator: Box<dyn RevocationValidator> = Box::new(FnValidator(|_: &[X509]| true));
        Ok::<_, RevocationError>(validator)
    });
    let revocation = ConnectionParams::builder("example.com", 443)
        .revocation(RevocationDescriptor::new("http://ocsp.example.com"))
        .build()
        .unwrap();
    group.bench_function("with_revocation", |b| {
        b.iter(|| black_box(TlsContext::build(black_box(&revocation), Some(&provider)).unwrap()));
    });

    group.finish();
}

// ========== Proxy Tunnel ==========

fn bench_connect_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("connect_request");

    let anonymous = ProxyConfig::new("proxy.internal", 3128);
    let authenticated = ProxyConfig::new("proxy.internal", 3128).credentials("user", "secret");

    for (name, proxy) in [("anonymous", &anonymous), ("basic_auth", &authenticated)] {
        group.bench_with_input(BenchmarkId::new("encode", name), proxy, |b, proxy| {
            b.iter(|| black_box(connect_request(black_box("example.com:443"), proxy).to_wire()));
        });
    }

    group.finish();
}

fn bench_connect_reply(c: &mut Criterion) {
    let reply = b"HTTP/1.1 200 Connection established\r\nProxy-Agent: bench\r\n\r\n".to_vec();

    c.bench_function("connect_reply_parse", |b| {
        b.iter(|| {
            let mut reader = Cursor::new(black_box(&reply));
            black_box(read_response(&mut reader, Method::Connect).unwrap())
        });
    });
}

// ========== Hostname Verification ==========

fn bench_hostname_match(c: &mut Criterion) {
    let cert = CertInfo {
        subject: Some("example.com".to_string()),
        issuer: Some("Example CA".to_string()),
        dns_names: (0..20)
            .map(|i| format!("svc{}.example.com", i))
            .chain(std::iter::once("*.cdn.example.com".to_string()))
            .collect(),
        ip_addresses: Vec::new(),
    };

    let mut group = c.benchmark_group("hostname_match");
    for host in ["svc19.example.com", "edge.cdn.example.com", "unknown.example.org"] {
        group.bench_with_input(BenchmarkId::from_parameter(host), host, |b, host| {
            b.iter(|| black_box(cert.matches_host(black_box(host))));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_context_build,
    bench_connect_request,
    bench_connect_reply,
    bench_hostname_match
);
criterion_main!(benches);
