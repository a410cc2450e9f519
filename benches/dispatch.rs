//! Performance benchmarks for a3s-bus
//!
//! Run with: cargo bench

use a3s_bus::{AppEvent, Bus, Envelope, OutputStream};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_dispatch_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_chain");
    for handlers in [1, 10, 100] {
        let bus: Bus<Envelope<String>> = Bus::new();
        for p in 0..handlers {
            bus.subscribe_with_priority(p, Some);
        }

        group.bench_with_input(BenchmarkId::from_parameter(handlers), &bus, |b, bus| {
            b.iter(|| bus.dispatch(Envelope::new("output_message", "line".to_string())));
        });
    }
    group.finish();
}

fn bench_rewriting_chain(c: &mut Criterion) {
    let bus: Bus<Envelope<String>> = Bus::new();
    for p in 0..5 {
        bus.subscribe_with_priority(p, |e: Envelope<String>| {
            let tagged = format!("x/{}", e.payload);
            Some(e.with_payload(tagged))
        });
    }

    c.bench_function("dispatch (5 rewriting handlers)", |b| {
        b.iter(|| bus.dispatch(Envelope::new("bird", "eagle".to_string())));
    });
}

fn bench_command_output(c: &mut Criterion) {
    let bus: Bus<AppEvent> = Bus::new();
    bus.subscribe_for(AppEvent::COMMAND_OUTPUT, 0, Some);
    bus.subscribe_for(AppEvent::WORK_DIR_CHANGE, 0, Some);

    c.bench_function("dispatch AppEvent::CommandOutput", |b| {
        b.iter(|| {
            bus.dispatch(AppEvent::CommandOutput {
                line: "drwxr-xr-x  2 user user 4096 src".to_string(),
                stream: OutputStream::Stdout,
            })
        });
    });
}

fn bench_buffer_and_start(c: &mut Criterion) {
    c.bench_function("buffer 1000 + start", |b| {
        b.iter(|| {
            let bus: Bus<Envelope<u32>> = Bus::delayed();
            bus.subscribe(Some);
            for i in 0..1000 {
                bus.dispatch(Envelope::new("tick", i));
            }
            bus.start()
        });
    });
}

criterion_group!(
    benches,
    bench_dispatch_chain,
    bench_rewriting_chain,
    bench_command_output,
    bench_buffer_and_start,
);
criterion_main!(benches);
