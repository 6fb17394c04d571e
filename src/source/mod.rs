//! Data sources feeding the window cache.
//!
//! A [`DataSource`] is anything that can answer "give me `count` items
//! starting at this id, going this way". Every call is async so an in-memory
//! source and a remote one are interchangeable behind the cache.

mod delayed;
mod progress;
mod skip_list_source;

use std::sync::Arc;

use async_trait::async_trait;

pub use delayed::*;
pub use skip_list_source::*;

pub use crate::index::Direction;
use crate::Keyed;
use crate::Result;

/// A key-ordered collection the window cache can query by id and direction.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    type Item: Keyed + Clone + Send + Sync + 'static;

    /// Insert or replace an item. Returns true if the item was stored.
    async fn insert(&self, item: Self::Item) -> Result<bool>;

    /// Delete an item by id. Returns true if it existed.
    async fn delete(&self, id: u64) -> Result<bool>;

    /// Up to `count` items starting at `start_id` and walking in
    /// `direction`, always returned in ascending id order.
    ///
    /// A missing `start_id` snaps to the next id above it (forward) or the
    /// last id below it (backward).
    async fn range_from_id(
        &self,
        start_id: u64,
        count: usize,
        direction: Direction,
    ) -> Result<Vec<Self::Item>>;

    /// Upper bound on addressable positions. Not a guarantee of density.
    async fn total_count(&self) -> Result<u64>;

    async fn first_n(&self, count: usize) -> Result<Vec<Self::Item>> {
        return self.range_from_id(0, count, Direction::Forward).await;
    }

    /// Map a position onto `[0, 1]` scrollbar progress. The default scales
    /// linearly over `total_count`.
    async fn progress_for_position(&self, position: i64) -> Result<f64> {
        let total = self.total_count().await?;
        return Ok(progress::linear_progress(position, total));
    }

    /// Inverse of [`progress_for_position`](DataSource::progress_for_position).
    async fn position_for_progress(&self, progress: f64) -> Result<u64> {
        let total = self.total_count().await?;
        return Ok(progress::linear_position(progress, total));
    }
}

#[async_trait]
impl<S: DataSource> DataSource for Arc<S> {
    type Item = S::Item;

    async fn insert(&self, item: Self::Item) -> Result<bool> {
        return self.as_ref().insert(item).await;
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        return self.as_ref().delete(id).await;
    }

    async fn range_from_id(
        &self,
        start_id: u64,
        count: usize,
        direction: Direction,
    ) -> Result<Vec<Self::Item>> {
        return self.as_ref().range_from_id(start_id, count, direction).await;
    }

    async fn total_count(&self) -> Result<u64> {
        return self.as_ref().total_count().await;
    }

    async fn first_n(&self, count: usize) -> Result<Vec<Self::Item>> {
        return self.as_ref().first_n(count).await;
    }

    async fn progress_for_position(&self, position: i64) -> Result<f64> {
        return self.as_ref().progress_for_position(position).await;
    }

    async fn position_for_progress(&self, progress: f64) -> Result<u64> {
        return self.as_ref().position_for_progress(progress).await;
    }
}
