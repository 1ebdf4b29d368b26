//! Benchmarks for the per-tick pure paths: frame codec and bar rendering

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dstat::codec::{self, FrameBuffer, Message};
use dstat::format;

fn bench_codec(c: &mut Criterion) {
    let message = Message::display("battery low: plug in the charger", Some(5));
    let frame = codec::encode_frame(&message);

    c.bench_function("encode_frame", |b| {
        b.iter(|| codec::encode_frame(black_box(&message)))
    });

    c.bench_function("decode", |b| b.iter(|| codec::decode(black_box(&frame))));

    c.bench_function("frame_buffer_8_frames", |b| {
        let stream = frame.repeat(8);
        b.iter(|| {
            let mut buffer = FrameBuffer::new();
            buffer.extend(black_box(&stream)).ok();
            let mut count = 0;
            while buffer.next_frame().is_some() {
                count += 1;
            }
            count
        })
    });
}

fn bench_format(c: &mut Criterion) {
    c.bench_function("progress_bar_12", |b| {
        b.iter(|| format::progress_bar(black_box(63.7), black_box(12)))
    });

    let loads = [12.5f32, 80.0, 3.2, 45.9, 0.0, 100.0, 27.1, 66.6];
    c.bench_function("metric_field_cpu", |b| {
        b.iter(|| {
            let avg = format::cpu_average(black_box(&loads)).map(format::round1);
            format::metric_field("CPU", avg, 12)
        })
    });
}

criterion_group!(benches, bench_codec, bench_format);
criterion_main!(benches);
