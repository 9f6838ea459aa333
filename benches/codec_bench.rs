//! Benchmarks for the wire codec

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tetherkv::protocol::{ListResponse, PutRequest};

fn codec_benchmarks(c: &mut Criterion) {
    let put = PutRequest {
        id: 3,
        key: vec![7u8; 32],
        data: vec![42u8; 4096],
        replace: true,
    };
    let put_bytes = put.encode();

    c.bench_function("encode_put_4k", |b| b.iter(|| black_box(&put).encode()));
    c.bench_function("decode_put_4k", |b| {
        b.iter(|| PutRequest::decode(black_box(&put_bytes)).unwrap())
    });

    let list = ListResponse {
        keys: (0..256).map(|i| format!("key-{i:04}").into_bytes()).collect(),
        next: b"key-0256".to_vec(),
    };
    let list_bytes = list.encode();

    c.bench_function("encode_list_256", |b| b.iter(|| black_box(&list).encode()));
    c.bench_function("decode_list_256", |b| {
        b.iter(|| ListResponse::decode(black_box(&list_bytes)).unwrap())
    });
}

criterion_group!(benches, codec_benchmarks);
criterion_main!(benches);
