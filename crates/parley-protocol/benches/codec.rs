//! Codec benchmarks for parley-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use parley_protocol::{codec, GroupEntry, ServerMessage};

fn bench_decode_small(c: &mut Criterion) {
    let text = format!(
        r#"{{"type":"group","group":"general","content":"{}"}}"#,
        "x".repeat(64)
    );

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("group_64B", |b| b.iter(|| codec::decode(black_box(&text))));
    group.finish();
}

fn bench_encode_group_list(c: &mut Criterion) {
    let message = ServerMessage::GroupList {
        groups: (0..32)
            .map(|g| GroupEntry {
                name: format!("group-{g}"),
                members: (0..16).map(|m| format!("user_{m}")).collect(),
            })
            .collect(),
    };

    c.bench_function("encode_group_list_32x16", |b| {
        b.iter(|| codec::encode(black_box(&message)).unwrap())
    });
}

fn bench_roundtrip(c: &mut Criterion) {
    let message = ServerMessage::Group {
        group: "general".into(),
        from: "Alice".into(),
        content: "x".repeat(256),
    };

    c.bench_function("roundtrip_256B", |b| {
        b.iter(|| {
            let encoded = codec::encode(black_box(&message)).unwrap();
            codec::decode_server(black_box(&encoded)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_decode_small,
    bench_encode_group_list,
    bench_roundtrip
);
criterion_main!(benches);
