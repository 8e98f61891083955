use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use stockroom_core::ProductId;
use stockroom_events::{
    DomainEvent, EventBus, EventBusExt, EventPublisher, InMemoryEventBus, MovementType, StockLow,
    StockUpdated,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn bus_with_handlers(count: usize) -> (Arc<InMemoryEventBus>, Arc<AtomicU64>) {
    let bus = Arc::new(InMemoryEventBus::new());
    let calls = Arc::new(AtomicU64::new(0));
    for _ in 0..count {
        let calls = Arc::clone(&calls);
        bus.subscribe(move |ev: StockUpdated| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(ev.new_quantity as u64, Ordering::Relaxed);
                Ok::<(), anyhow::Error>(())
            }
        })
        .unwrap();
    }
    (bus, calls)
}

fn stock_updated(product_id: ProductId) -> DomainEvent {
    StockUpdated::new(product_id, "Widget", 50, 1, MovementType::Entry, "A1").into()
}

/// Fan-out cost as the number of handlers per kind grows.
fn bench_publish_fan_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish_fan_out");

    for handlers in [1usize, 4, 16, 64].iter() {
        group.throughput(Throughput::Elements(*handlers as u64));
        group.bench_with_input(BenchmarkId::new("handlers", handlers), handlers, |b, &n| {
            let (bus, _calls) = bus_with_handlers(n);
            let product_id = ProductId::new();
            b.iter(|| {
                black_box(rt.block_on(bus.publish(stock_updated(product_id))).unwrap());
            });
        });
    }

    group.finish();
}

/// Publishing an event nobody listens to (warning path).
fn bench_publish_without_subscribers(c: &mut Criterion) {
    let rt = runtime();
    let bus = InMemoryEventBus::new();
    let product_id = ProductId::new();

    c.bench_function("publish_without_subscribers", |b| {
        b.iter(|| {
            let ev: DomainEvent = StockLow::new(product_id, "Widget", 3, 10, "A1").into();
            black_box(rt.block_on(bus.publish(ev)).unwrap());
        });
    });
}

/// Sequential batch publication through the façade.
fn bench_publish_many(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish_many");

    for batch in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::new("batch", batch), batch, |b, &size| {
            let (bus, _calls) = bus_with_handlers(2);
            let publisher = EventPublisher::new(bus);
            let product_id = ProductId::new();
            b.iter(|| {
                let events: Vec<DomainEvent> = (0..size).map(|_| stock_updated(product_id)).collect();
                black_box(rt.block_on(publisher.publish_many(events)).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_publish_fan_out,
    bench_publish_without_subscribers,
    bench_publish_many
);
criterion_main!(benches);
