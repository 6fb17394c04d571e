//! Skipwindow - a sliding window cache for virtualized scrolling.
//!
//! Items live in a skip list keyed by a monotonically increasing id. A
//! [`DataSource`](source::DataSource) serves id ranges out of it, and a
//! [`WindowCache`](window::WindowCache) keeps a small window of those items
//! (plus prefetched buffers on either side) in a fixed-size ring, so that a
//! UI can step through millions of rows while only ever touching a few
//! hundred.
//!
//! # Quick Start
//!
//! ```
//! use skipwindow::Item;
//! use skipwindow::source::SkipListSource;
//! use skipwindow::window::{WindowCache, WindowConfig};
//!
//! # let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # runtime.block_on(async {
//! let rows = (0..1_000).map(|id| Item::new(id, format!("row {id}")));
//! let source = SkipListSource::from_items(rows);
//! let cache = WindowCache::new(source, WindowConfig::new(5));
//!
//! cache.set_position(40);
//! cache.settled().await;
//!
//! let ids: Vec<u64> = cache.window_items(None).iter().map(|item| item.id).collect();
//! assert_eq!(ids, vec![40, 41, 42, 43, 44]);
//!
//! let entered = cache.move_forward().unwrap();
//! assert_eq!(entered.id, 45);
//! # });
//! ```

pub mod error;
pub mod index;
mod item;
pub mod source;
pub mod window;

pub use error::{Error, Result};
pub use item::*;
