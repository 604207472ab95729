use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use dedup_cache::{BucketKey, DeathHook, Finalize, SharedStore, Store, StoreBuilder};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BenchValue {
	data: Vec<u8>,
	hook: DeathHook,
}

impl BenchValue {
	fn new(i: u64) -> Self {
		Self {
			data: i.to_le_bytes().to_vec(),
			hook: DeathHook::new(),
		}
	}
}

impl Finalize for BenchValue {
	fn death_hook(&self) -> &DeathHook {
		&self.hook
	}
}

fn bench_intern(c: &mut Criterion) {
	let mut group = c.benchmark_group("intern");

	for size in [100, 1000, 10000] {
		group.throughput(Throughput::Elements(size as u64));
		group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
			b.iter(|| {
				let mut store = Store::<u64>::sweeping();
				let held: Vec<_> = (0..size).map(|i| store.intern(black_box(i))).collect();
				black_box(held);
			});
		});
	}

	group.finish();
}

fn bench_dedup_hit(c: &mut Criterion) {
	let mut store = Store::<u64>::sweeping();

	// Pre-populate, keeping every canonical instance alive
	let held: Vec<_> = (0..1000).map(|i| store.intern(i)).collect();

	c.bench_function("dedup_hit", |b| {
		b.iter(|| {
			for i in 0..1000 {
				let _ = store.put_if_absent(Arc::new(black_box(i)));
			}
		});
	});

	drop(held);
}

fn bench_locate(c: &mut Criterion) {
	let mut store = Store::<u64>::sweeping();
	let held: Vec<_> = (0..1000).map(|i| store.intern(i)).collect();

	c.bench_function("locate_hit", |b| {
		b.iter(|| {
			for i in 0..1000 {
				let _ = store.locate(&black_box(i));
			}
		});
	});

	drop(held);
}

fn bench_collisions(c: &mut Criterion) {
	let mut group = c.benchmark_group("collisions");

	for buckets in [1u64, 16, 256] {
		let mut store = StoreBuilder::<u64>::new()
			.coder(move |v: &u64| -> BucketKey { v % buckets })
			.death_notification(false)
			.build();
		let held: Vec<_> = (0..256).map(|i| store.intern(i)).collect();

		group.bench_with_input(BenchmarkId::new("locate", buckets), &buckets, |b, _| {
			b.iter(|| {
				for i in 0..256 {
					let _ = store.locate(&black_box(i));
				}
			});
		});

		drop(held);
	}

	group.finish();
}

fn bench_defragment(c: &mut Criterion) {
	let mut group = c.benchmark_group("defragment");

	for size in [1000, 10000] {
		group.throughput(Throughput::Elements(size as u64));
		group.bench_with_input(BenchmarkId::new("half_dead", size), &size, |b, &size| {
			b.iter(|| {
				let mut store = Store::<u64>::sweeping();
				let held: Vec<_> =
					(0..size).map(|i| store.intern(i)).enumerate().filter(|(i, _)| i % 2 == 0).collect();
				black_box(store.defragment().ok());
				drop(held);
			});
		});
	}

	group.finish();
}

fn bench_reactive_churn(c: &mut Criterion) {
	c.bench_function("reactive_churn", |b| {
		b.iter(|| {
			let mut store = Store::<BenchValue>::new();

			// Every value dies right away; cleanup rides on the next intern
			for i in 0..1000 {
				let value = store.intern(BenchValue::new(black_box(i % 100)));
				drop(value);
			}
			black_box(store.reap());
		});
	});
}

fn bench_shared_snapshot_locate(c: &mut Criterion) {
	use std::thread;

	let store = Arc::new(SharedStore::new(
		StoreBuilder::<u64>::new().death_notification(false).snapshot_on_compact(true).build(),
	));
	let held: Vec<_> = (0..1000).map(|i| store.intern(i)).collect();

	c.bench_function("shared_locate_4_threads", |b| {
		b.iter(|| {
			let mut handles = vec![];

			for _ in 0..4 {
				let store = store.clone();
				handles.push(thread::spawn(move || {
					for i in 0..250 {
						let _ = store.locate(&i);
					}
				}));
			}

			for handle in handles {
				handle.join().unwrap();
			}
		});
	});

	drop(held);
}

criterion_group!(
	benches,
	bench_intern,
	bench_dedup_hit,
	bench_locate,
	bench_collisions,
	bench_defragment,
	bench_reactive_churn,
	bench_shared_snapshot_locate
);

criterion_main!(benches);
