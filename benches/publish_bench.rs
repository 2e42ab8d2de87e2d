use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orbit::{MemoryTransport, Orb, ShmTransport, TopicMetadata};
use tempfile::TempDir;

static BENCH_TOPIC: TopicMetadata = TopicMetadata::new("bench_sample", 64);

fn benchmark_memory_publish_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("Memory_PublishCopy");

    for queue in [1u32, 4, 16].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("round_trip", queue), queue, |b, &queue| {
            let orb = Orb::new(MemoryTransport::new());
            let mut advertiser = orb.advertise_queue(&BENCH_TOPIC, None, queue).unwrap();
            let mut subscriber = orb.subscribe(&BENCH_TOPIC).unwrap();
            let payload = [0xA5u8; 64];
            let mut buf = [0u8; 64];

            b.iter(|| {
                advertiser.publish_sample(&payload).unwrap();
                subscriber.copy_sample(&mut buf).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_shm_publish_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("Shm_PublishCopy");
    let temp_dir = TempDir::new().unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("round_trip", |b| {
        let orb = Orb::new(ShmTransport::new(temp_dir.path()).unwrap());
        let mut advertiser = orb.advertise_queue(&BENCH_TOPIC, None, 8).unwrap();
        let mut subscriber = orb.subscribe(&BENCH_TOPIC).unwrap();
        let payload = [0x5Au8; 64];
        let mut buf = [0u8; 64];

        b.iter(|| {
            advertiser.publish_sample(&payload).unwrap();
            subscriber.copy_sample(&mut buf).unwrap();
        });
    });

    group.finish();
}

fn benchmark_probe(c: &mut Criterion) {
    let orb = Orb::new(MemoryTransport::new());
    let _advertisers: Vec<_> = (0..4)
        .map(|_| orb.advertise(&BENCH_TOPIC, None).unwrap())
        .collect();

    c.bench_function("group_count_4", |b| {
        b.iter(|| orb.group_count(&BENCH_TOPIC).unwrap());
    });
}

criterion_group!(
    benches,
    benchmark_memory_publish_copy,
    benchmark_shm_publish_copy,
    benchmark_probe
);
criterion_main!(benches);
