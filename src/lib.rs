//! # Dedup Cache
//!
//! A deduplicating object cache that never keeps anything alive:
//! - **Canonical instances**: equal values share one `Arc`, the first one stored
//! - **Weak storage**: the cache only holds `Weak` references, so a canonical
//!   instance lives exactly as long as its users keep it
//! - **Pluggable bucketing**: any [`Coder`] maps values to bucket keys;
//!   colliding values coexist in one bucket
//! - **Two cleanup modes**: reactive per-bucket compaction driven by death
//!   notification, or explicit full sweeps with [`Store::defragment`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use dedup_cache::{DeathHook, Finalize, Store};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Path {
//!     segments: Vec<String>,
//!     hook: DeathHook,
//! }
//!
//! impl Path {
//!     fn parse(text: &str) -> Self {
//!         Path {
//!             segments: text.split('/').map(str::to_string).collect(),
//!             hook: DeathHook::new(),
//!         }
//!     }
//! }
//!
//! // The hook lets the store hear about each value's drop.
//! impl Finalize for Path {
//!     fn death_hook(&self) -> &DeathHook {
//!         &self.hook
//!     }
//! }
//!
//! let mut store = Store::<Path>::new();
//!
//! let first = store.intern(Path::parse("usr/local/bin"));
//! let second = store.intern(Path::parse("usr/local/bin"));
//! assert!(Arc::ptr_eq(&first, &second));
//!
//! // Once every user is gone, the bucket is compacted on the next mutation.
//! drop((first, second));
//! assert_eq!(store.reap(), 1);
//! assert!(store.is_empty());
//! ```
//!
//! ## Sweeping
//!
//! Values that cannot carry a [`DeathHook`] use a sweeping store and call
//! [`Store::defragment`] now and then:
//!
//! ```rust
//! use dedup_cache::Store;
//!
//! let mut store = Store::<String>::sweeping();
//! let name = store.intern("ada".to_string());
//!
//! drop(name);
//! let swept = store.defragment().expect("sweeping store can defragment");
//! assert_eq!((swept.removed, swept.remaining), (1, 0));
//! ```
//!
//! ## Thread Safety
//!
//! [`Store`] is `Send + Sync` but mutates through `&mut self`. Use
//! [`SharedStore`] to share one between threads. Death notifications may
//! arrive from any thread; they are queued and handled by the store's owner.

mod bucket;
mod builder;
mod error;
mod metrics;
mod notify;
mod slot;
mod store;
mod sync;
mod traits;

pub use builder::StoreBuilder;
pub use error::{Error, Result};
pub use metrics::StoreMetrics;
pub use notify::{DeathHook, DeathNotifier, DeathSink, DropNotifier, Finalize, ManualNotifier};
pub use store::{Defragmented, Store};
pub use sync::SharedStore;
pub use traits::{BucketKey, Coder, HashCoder};
