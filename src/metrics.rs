//! Store activity metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a store's activity counters and current shape.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use dedup_cache::Store;
///
/// let mut store = Store::<String>::sweeping();
/// let first = store.put_if_absent(Arc::new("a".to_string()));
/// let _second = store.put_if_absent(Arc::new("a".to_string()));
///
/// let metrics = store.metrics();
/// assert_eq!(metrics.inserts, 1);
/// assert_eq!(metrics.deduplicated, 1);
/// println!("Dedup rate: {:.2}%", metrics.dedup_rate() * 100.0);
/// # drop(first);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMetrics {
	/// `locate` calls that found a live equal value.
	pub hits: u64,
	/// `locate` calls that found nothing.
	pub misses: u64,
	/// Values that became canonical through `put_if_absent`.
	pub inserts: u64,
	/// `put_if_absent` calls answered with an existing canonical instance.
	pub deduplicated: u64,
	/// Live slots removed by `remove`.
	pub removals: u64,
	/// Dead slots purged by any cleanup path.
	pub purged: u64,
	/// Death tokens handled.
	pub notifications: u64,
	/// Buckets currently in the store.
	pub bucket_count: usize,
	/// Slots currently in the store, live or dead.
	pub slot_count: usize,
}

impl StoreMetrics {
	/// Fraction of `locate` calls that hit, between 0.0 and 1.0.
	///
	/// Returns 0.0 if nothing has been looked up.
	pub fn hit_rate(&self) -> f64 {
		let total = self.total_lookups();
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}

	/// Fraction of `put_if_absent` calls that were answered with an existing
	/// instance.
	pub fn dedup_rate(&self) -> f64 {
		let total = self.inserts + self.deduplicated;
		if total == 0 {
			0.0
		} else {
			self.deduplicated as f64 / total as f64
		}
	}

	pub fn total_lookups(&self) -> u64 {
		self.hits + self.misses
	}
}

/// Live counters backing [`StoreMetrics`].
///
/// Shared behind an `Arc` so readers scanning a bucket snapshot outside the
/// store can still record their lookups.
#[derive(Debug, Default)]
pub(crate) struct Counters {
	hits: AtomicU64,
	misses: AtomicU64,
	inserts: AtomicU64,
	deduplicated: AtomicU64,
	removals: AtomicU64,
	purged: AtomicU64,
	notifications: AtomicU64,
}

impl Counters {
	pub fn record_lookup(&self, hit: bool) {
		let counter = if hit { &self.hits } else { &self.misses };
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_insert(&self) {
		self.inserts.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_dedup(&self) {
		self.deduplicated.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_removals(&self, count: usize) {
		self.removals.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub fn record_purged(&self, count: usize) {
		self.purged.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub fn record_notification(&self) {
		self.notifications.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self, bucket_count: usize, slot_count: usize) -> StoreMetrics {
		StoreMetrics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			inserts: self.inserts.load(Ordering::Relaxed),
			deduplicated: self.deduplicated.load(Ordering::Relaxed),
			removals: self.removals.load(Ordering::Relaxed),
			purged: self.purged.load(Ordering::Relaxed),
			notifications: self.notifications.load(Ordering::Relaxed),
			bucket_count,
			slot_count,
		}
	}
}
