//! Frame codec benchmark suite.
//!
//! Benchmarks decoding of buffered debugger traffic at different scales:
//! - Frames per buffer: 1, 64, 1024
//! - Payload shapes: small reply, add-on list
//!
//! Run with: cargo bench --bench frame_decode
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;

use firefox_extension_runner::protocol::{FrameStatus, Message, decode_frame, encode_frame};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const FRAME_COUNTS: &[usize] = &[1, 64, 1024];

// ============================================================================
// Payloads
// ============================================================================

fn small_reply() -> Message {
    Message::reply("server1.conn0.addon-a@example.com")
}

fn addon_list() -> Message {
    let addons: Vec<_> = (0..50)
        .map(|i| {
            json!({
                "id": format!("addon{i}@example.com"),
                "actor": format!("server1.conn0.addon{i}"),
            })
        })
        .collect();
    Message::reply("root").with("addons", addons)
}

fn buffer_of(message: &Message, count: usize) -> Vec<u8> {
    let frame = encode_frame(message).expect("encode frame");
    frame.repeat(count)
}

fn drain(mut buffer: Vec<u8>) -> usize {
    let mut decoded = 0;
    while let Ok(FrameStatus::Message(_)) = decode_frame(&mut buffer) {
        decoded += 1;
    }
    decoded
}

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for (shape, message) in [("small_reply", small_reply()), ("addon_list", addon_list())] {
        for &count in FRAME_COUNTS {
            let buffer = buffer_of(&message, count);
            group.throughput(Throughput::Bytes(buffer.len() as u64));
            group.bench_with_input(BenchmarkId::new(shape, count), &buffer, |b, buffer| {
                b.iter(|| drain(buffer.clone()));
            });
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let message = addon_list();
    c.bench_function("frame_encode/addon_list", |b| {
        b.iter(|| encode_frame(&message).expect("encode frame"));
    });
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
