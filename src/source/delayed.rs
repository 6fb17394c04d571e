use std::time::Duration;

use async_trait::async_trait;

use super::DataSource;
use super::Direction;
use crate::Result;

/// Wraps a source and sleeps before every fetch, to stand in for a remote
/// backend. Inserts, counts and progress mapping pass straight through.
pub struct DelayedSource<S> {
    inner: S,
    delay: Duration,
}

impl<S> DelayedSource<S> {
    pub fn new(inner: S, delay: Duration) -> DelayedSource<S> {
        return DelayedSource { inner, delay };
    }

    pub fn inner(&self) -> &S {
        return &self.inner;
    }

    pub fn delay(&self) -> Duration {
        return self.delay;
    }
}

#[async_trait]
impl<S: DataSource> DataSource for DelayedSource<S> {
    type Item = S::Item;

    async fn insert(&self, item: Self::Item) -> Result<bool> {
        return self.inner.insert(item).await;
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        return self.inner.delete(id).await;
    }

    async fn range_from_id(
        &self,
        start_id: u64,
        count: usize,
        direction: Direction,
    ) -> Result<Vec<Self::Item>> {
        tokio::time::sleep(self.delay).await;
        return self.inner.range_from_id(start_id, count, direction).await;
    }

    async fn total_count(&self) -> Result<u64> {
        return self.inner.total_count().await;
    }

    async fn first_n(&self, count: usize) -> Result<Vec<Self::Item>> {
        tokio::time::sleep(self.delay).await;
        return self.inner.first_n(count).await;
    }

    async fn progress_for_position(&self, position: i64) -> Result<f64> {
        return self.inner.progress_for_position(position).await;
    }

    async fn position_for_progress(&self, progress: f64) -> Result<u64> {
        return self.inner.position_for_progress(progress).await;
    }
}
