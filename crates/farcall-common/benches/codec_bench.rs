// Criterion benchmarks for the farcall-common envelope codec
//
// Run benchmarks with:
//   cargo bench -p farcall-common

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use farcall_common::{ErrorTypeRegistry, ExceptionEnvelope, JsonCodec, RequestEnvelope, ResponseEnvelope};
use serde_json::json;

fn bench_request_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_encoding");

    group.bench_function("encode_small", |b| {
        let req = RequestEnvelope::new(1, "add", vec![json!(2), json!(3)]);
        b.iter(|| JsonCodec::encode_request(black_box(&req)));
    });

    group.bench_function("encode_large", |b| {
        let data: Vec<String> = (0..100).map(|i| format!("item_{}", i)).collect();
        let req = RequestEnvelope::new(1, "ingest", vec![json!(data)]);
        b.iter(|| JsonCodec::encode_request(black_box(&req)));
    });

    group.finish();
}

fn bench_response_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_decoding");

    let result_json = r#"{"messageId":1,"result":{"values":[1,2,3,4,5,6,7,8,9,10]}}"#;
    let exception_json = r#"{"messageId":2,"exception":{"type":"RangeError","message":"bad"}}"#;

    group.bench_function("decode_result", |b| {
        b.iter(|| JsonCodec::decode_response(black_box(result_json)));
    });

    group.bench_function("decode_exception", |b| {
        b.iter(|| JsonCodec::decode_response(black_box(exception_json)));
    });

    group.bench_function("classify_envelope", |b| {
        b.iter(|| JsonCodec::decode_envelope(black_box(result_json)));
    });

    group.finish();
}

fn bench_exception_marshaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("exception_marshaling");
    let registry = ErrorTypeRegistry::standard();

    group.bench_function("known_type", |b| {
        let envelope = ExceptionEnvelope::new("TypeError", "x is not a function");
        b.iter(|| registry.error_from_envelope(black_box(&envelope)));
    });

    group.bench_function("fallback_type", |b| {
        let envelope = ExceptionEnvelope::new("MysteryError", "unknown");
        b.iter(|| registry.error_from_envelope(black_box(&envelope)));
    });

    group.bench_function("uncaught_text", |b| {
        b.iter(|| registry.error_from_uncaught(black_box("Uncaught RangeError: out of bounds")));
    });

    group.bench_function("encode_exception_response", |b| {
        let response = ResponseEnvelope::exception(3, ExceptionEnvelope::new("Error", "boom"));
        b.iter(|| JsonCodec::encode_response(black_box(&response)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_request_encoding,
    bench_response_decoding,
    bench_exception_marshaling
);
criterion_main!(benches);
