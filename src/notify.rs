//! Death notification: telling a store that one of its values is gone.
//!
//! Rust has no collector to ask for post-mortem callbacks, so "death" here is
//! the drop of the last strong `Arc`. A [`DeathNotifier`] arranges for a token
//! (the value's bucket key) to be pushed into the store's death queue at that
//! point. Delivery can happen on any thread, at any time; the store picks the
//! tokens up on its own schedule and compacts just the named buckets.
//!
//! Two notifiers ship with the crate:
//!
//! - [`DropNotifier`] arms a [`DeathHook`] embedded in the value (see
//!   [`Finalize`]). The hook fires from the value's destructor.
//! - [`ManualNotifier`] records registrations and delivers tokens only when
//!   [`ManualNotifier::collect`] is called, giving tests full control over
//!   when a death is observed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;

use crate::traits::BucketKey;

/// Queue of bucket keys whose buckets may hold dead slots.
pub(crate) type DeathQueue = SegQueue<BucketKey>;

/// Delivery end of a store's death queue.
///
/// Holds the queue weakly: tokens delivered after the store is dropped are
/// discarded.
#[derive(Clone)]
pub struct DeathSink {
	queue: Weak<DeathQueue>,
}

impl DeathSink {
	pub(crate) fn new(queue: &Arc<DeathQueue>) -> Self {
		Self {
			queue: Arc::downgrade(queue),
		}
	}

	/// Deliver `token`. Returns `false` if the receiving store no longer exists.
	pub fn notify(&self, token: BucketKey) -> bool {
		match self.queue.upgrade() {
			Some(queue) => {
				queue.push(token);
				true
			}
			None => false,
		}
	}

	fn same_queue(&self, other: &DeathSink) -> bool {
		Weak::ptr_eq(&self.queue, &other.queue)
	}
}

impl fmt::Debug for DeathSink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DeathSink").field("connected", &(self.queue.strong_count() > 0)).finish()
	}
}

/// Arranges for a token to be delivered once a stored value is dropped.
pub trait DeathNotifier<V>: Send + Sync {
	/// Register `value`; once it is dropped, `token` must reach `sink` exactly once.
	fn attach(&self, value: &Arc<V>, token: BucketKey, sink: &DeathSink);
}

impl<V, N> DeathNotifier<V> for Arc<N>
where
	N: DeathNotifier<V> + ?Sized,
{
	fn attach(&self, value: &Arc<V>, token: BucketKey, sink: &DeathSink) {
		(**self).attach(value, token, sink);
	}
}

/// Drop-time trigger embedded in a value.
///
/// Every registration made through [`DropNotifier`] is delivered when the hook
/// is dropped, i.e. when the value that owns it is dropped. Registering the
/// same sink and token twice keeps a single registration.
///
/// A hook never takes part in its owner's identity: clones start unarmed, all
/// hooks compare equal and hashing one writes nothing. Deriving `PartialEq`,
/// `Eq` and `Hash` on the owning type therefore ignores it.
#[derive(Default)]
pub struct DeathHook {
	watchers: Mutex<Vec<(DeathSink, BucketKey)>>,
}

impl DeathHook {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of registrations waiting for this hook to drop.
	pub fn armed(&self) -> usize {
		self.watchers.lock().len()
	}

	fn arm(&self, sink: &DeathSink, token: BucketKey) {
		let mut watchers = self.watchers.lock();
		if !watchers.iter().any(|(armed, armed_token)| armed.same_queue(sink) && *armed_token == token) {
			watchers.push((sink.clone(), token));
		}
	}
}

impl Drop for DeathHook {
	fn drop(&mut self) {
		for (sink, token) in self.watchers.get_mut().drain(..) {
			sink.notify(token);
		}
	}
}

impl Clone for DeathHook {
	fn clone(&self) -> Self {
		Self::new()
	}
}

impl PartialEq for DeathHook {
	fn eq(&self, _: &Self) -> bool {
		true
	}
}

impl Eq for DeathHook {}

impl Hash for DeathHook {
	fn hash<H: Hasher>(&self, _: &mut H) {}
}

impl fmt::Debug for DeathHook {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DeathHook").field("armed", &self.armed()).finish()
	}
}

/// Values that carry a [`DeathHook`].
///
/// # Example
///
/// ```
/// use dedup_cache::{DeathHook, Finalize};
///
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// struct Symbol {
///     name: String,
///     hook: DeathHook,
/// }
///
/// impl Finalize for Symbol {
///     fn death_hook(&self) -> &DeathHook {
///         &self.hook
///     }
/// }
/// ```
pub trait Finalize {
	fn death_hook(&self) -> &DeathHook;
}

/// Notifier that fires from the value's own destructor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropNotifier;

impl<V: Finalize> DeathNotifier<V> for DropNotifier {
	fn attach(&self, value: &Arc<V>, token: BucketKey, sink: &DeathSink) {
		value.death_hook().arm(sink, token);
	}
}

struct Registration<V> {
	value: Weak<V>,
	token: BucketKey,
	sink: DeathSink,
}

/// Deterministic notifier for tests and for hosts that poll.
///
/// Registrations are only checked when [`collect`](Self::collect) is called,
/// so a value can be dropped and its death observed at a chosen later point.
pub struct ManualNotifier<V> {
	registrations: Mutex<Vec<Registration<V>>>,
}

impl<V> ManualNotifier<V> {
	pub fn new() -> Self {
		Self {
			registrations: Mutex::new(Vec::new()),
		}
	}

	/// Registrations whose value has not been observed dead yet.
	pub fn pending(&self) -> usize {
		self.registrations.lock().len()
	}

	/// Deliver the token of every registered value that has been dropped.
	///
	/// Each registration is delivered at most once. Returns how many tokens
	/// were delivered.
	pub fn collect(&self) -> usize {
		let mut delivered = 0;
		self.registrations.lock().retain(|registration| {
			if registration.value.strong_count() > 0 {
				return true;
			}
			registration.sink.notify(registration.token);
			delivered += 1;
			false
		});
		delivered
	}
}

impl<V> Default for ManualNotifier<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V: Send + Sync> DeathNotifier<V> for ManualNotifier<V> {
	fn attach(&self, value: &Arc<V>, token: BucketKey, sink: &DeathSink) {
		self.registrations.lock().push(Registration {
			value: Arc::downgrade(value),
			token,
			sink: sink.clone(),
		});
	}
}

impl<V> fmt::Debug for ManualNotifier<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ManualNotifier").field("pending", &self.pending()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, Clone, PartialEq, Eq, Hash)]
	struct Tagged {
		id: u32,
		hook: DeathHook,
	}

	impl Finalize for Tagged {
		fn death_hook(&self) -> &DeathHook {
			&self.hook
		}
	}

	fn tagged(id: u32) -> Arc<Tagged> {
		Arc::new(Tagged {
			id,
			hook: DeathHook::new(),
		})
	}

	fn drain(queue: &DeathQueue) -> Vec<BucketKey> {
		std::iter::from_fn(|| queue.pop()).collect()
	}

	#[test]
	fn test_drop_notifier_fires_once_on_drop() {
		let queue = Arc::new(DeathQueue::new());
		let sink = DeathSink::new(&queue);
		let value = tagged(1);

		DropNotifier.attach(&value, 17, &sink);
		DropNotifier.attach(&value, 17, &sink);
		assert_eq!(value.hook.armed(), 1);
		assert!(queue.is_empty());

		drop(value);
		assert_eq!(drain(&queue), vec![17]);
	}

	#[test]
	fn test_drop_notifier_waits_for_last_reference() {
		let queue = Arc::new(DeathQueue::new());
		let sink = DeathSink::new(&queue);
		let value = tagged(2);
		let other = Arc::clone(&value);

		DropNotifier.attach(&value, 3, &sink);
		drop(value);
		assert!(queue.is_empty());

		drop(other);
		assert_eq!(drain(&queue), vec![3]);
	}

	#[test]
	fn test_cloned_hook_starts_unarmed() {
		let queue = Arc::new(DeathQueue::new());
		let sink = DeathSink::new(&queue);
		let value = tagged(4);
		DropNotifier.attach(&value, 9, &sink);

		let copy = Tagged::clone(&value);
		assert_eq!(copy.id, 4);
		assert_eq!(copy.hook.armed(), 0);
		assert_eq!(copy, *value);

		drop(copy);
		assert!(queue.is_empty());
	}

	#[test]
	fn test_sink_outliving_queue() {
		let queue = Arc::new(DeathQueue::new());
		let sink = DeathSink::new(&queue);
		assert!(sink.notify(1));

		drop(queue);
		assert!(!sink.notify(2));
	}

	#[test]
	fn test_manual_notifier_delivers_on_collect() {
		let queue = Arc::new(DeathQueue::new());
		let sink = DeathSink::new(&queue);
		let notifier = ManualNotifier::new();

		let kept = Arc::new(10u32);
		let doomed = Arc::new(11u32);
		notifier.attach(&kept, 100, &sink);
		notifier.attach(&doomed, 200, &sink);
		assert_eq!(notifier.pending(), 2);

		drop(doomed);
		assert!(queue.is_empty());
		assert_eq!(notifier.collect(), 1);
		assert_eq!(drain(&queue), vec![200]);

		// Already delivered; nothing more until the other value dies.
		assert_eq!(notifier.collect(), 0);
		assert_eq!(notifier.pending(), 1);
		drop(kept);
		assert_eq!(notifier.collect(), 1);
		assert_eq!(drain(&queue), vec![100]);
	}
}
