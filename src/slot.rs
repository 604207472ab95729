use std::fmt;
use std::sync::{Arc, Weak};

/// One weak handle to a stored value.
///
/// A slot is *live* while some strong `Arc` to the value exists elsewhere and
/// *dead* afterwards. The slot never keeps the value alive itself.
pub struct WeakSlot<V> {
	handle: Weak<V>,
}

impl<V> WeakSlot<V> {
	pub(crate) fn new(value: &Arc<V>) -> Self {
		Self {
			handle: Arc::downgrade(value),
		}
	}

	/// Upgrade to the stored value, or `None` if it has been dropped.
	///
	/// The returned `Arc` is a temporary strong reference; drop it promptly so
	/// the slot does not end up extending the value's lifetime.
	pub fn resolve(&self) -> Option<Arc<V>> {
		self.handle.upgrade()
	}

	/// Whether the value behind this slot has been dropped.
	pub fn is_dead(&self) -> bool {
		self.handle.strong_count() == 0
	}
}

impl<V: Eq> WeakSlot<V> {
	/// Resolve the slot if it is live and holds a value equal to `value`.
	pub(crate) fn resolve_eq(&self, value: &V) -> Option<Arc<V>> {
		self.resolve().filter(|stored| **stored == *value)
	}
}

impl<V> Clone for WeakSlot<V> {
	fn clone(&self) -> Self {
		Self {
			handle: self.handle.clone(),
		}
	}
}

impl<V> fmt::Debug for WeakSlot<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakSlot").field("dead", &self.is_dead()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_slot_does_not_keep_value_alive() {
		let value = Arc::new(String::from("transient"));
		let slot = WeakSlot::new(&value);
		assert!(!slot.is_dead());
		assert_eq!(slot.resolve().as_deref(), Some(&String::from("transient")));

		drop(value);
		assert!(slot.is_dead());
		assert!(slot.resolve().is_none());
	}

	#[test]
	fn test_resolve_eq_matches_by_value() {
		let stored = Arc::new(7u32);
		let slot = WeakSlot::new(&stored);

		let found = slot.resolve_eq(&7).expect("equal value should resolve");
		assert!(Arc::ptr_eq(&found, &stored));
		assert!(slot.resolve_eq(&8).is_none());
	}
}
