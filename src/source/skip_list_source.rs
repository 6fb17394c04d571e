use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::DataSource;
use super::Direction;
use super::progress;
use crate::Keyed;
use crate::Result;
use crate::index::SkipList;

/// An in-memory [`DataSource`] backed by a [`SkipList`].
///
/// `total_count` is tracked as `max(id) + 1` over everything ever inserted,
/// which assumes a dense, append-only id space. Deleting the highest id does
/// not shrink it, and sparse ids make it an overestimate of the real item
/// count (see [`len`](SkipListSource::len) for that). The count saturates at
/// `u64::MAX`, so an item stored under that id is still reachable but the
/// count no longer exceeds it.
pub struct SkipListSource<T> {
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    list: SkipList<T>,
    total_count: u64,
}

impl<T: Keyed> Inner<T> {
    fn insert(&mut self, item: T) {
        self.total_count = self.total_count.max(item.id().saturating_add(1));
        self.list.insert(item);
    }

    /// Whether `id` lies below the total count. A saturated count admits
    /// every id.
    fn in_range(&self, id: u64) -> bool {
        return id < self.total_count || self.total_count == u64::MAX;
    }

    /// Sorted sample ids covering the whole list: one sparse skip list
    /// level, bracketed by the first and last ids.
    fn samples(&self) -> Vec<u64> {
        let level = progress::sampling_level(self.list.len(), self.list.level());
        let mut nodes = self.list.nodes_at_level(level);
        if nodes.is_empty() {
            nodes = self.list.nodes_at_level(0);
        }

        let mut samples = Vec::with_capacity(nodes.len() + 2);
        if let (Some(first), Some(head)) = (self.list.first(), nodes.first()) {
            if first.id() < head.id() {
                samples.push(first.id());
            }
        }
        samples.extend(nodes.iter().map(|item| item.id()));
        if let (Some(last), Some(&tail)) = (self.list.last(), samples.last()) {
            if last.id() > tail {
                samples.push(last.id());
            }
        }
        return samples;
    }
}

impl<T: Keyed> SkipListSource<T> {
    pub fn new() -> SkipListSource<T> {
        return SkipListSource::from_list(SkipList::new());
    }

    /// A source whose skip list draws levels from a fixed seed.
    pub fn with_seed(seed: u64) -> SkipListSource<T> {
        return SkipListSource::from_list(SkipList::with_seed(seed));
    }

    pub fn from_items(items: impl IntoIterator<Item = T>) -> SkipListSource<T> {
        let source = SkipListSource::new();
        {
            let mut inner = source.inner.write();
            for item in items {
                inner.insert(item);
            }
        }
        return source;
    }

    fn from_list(list: SkipList<T>) -> SkipListSource<T> {
        let total_count = list.last().map(|item| item.id().saturating_add(1)).unwrap_or(0);
        return SkipListSource {
            inner: RwLock::new(Inner { list, total_count }),
        };
    }

    /// Number of items actually stored.
    pub fn len(&self) -> usize {
        return self.inner.read().list.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.inner.read().list.is_empty();
    }

    pub fn contains(&self, id: u64) -> bool {
        return self.inner.read().list.contains(id);
    }
}

impl<T: Keyed> Default for SkipListSource<T> {
    fn default() -> Self {
        return SkipListSource::new();
    }
}

#[async_trait]
impl<T> DataSource for SkipListSource<T>
where
    T: Keyed + Clone + Send + Sync + 'static,
{
    type Item = T;

    async fn insert(&self, item: T) -> Result<bool> {
        self.inner.write().insert(item);
        return Ok(true);
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        return Ok(self.inner.write().list.remove(id).is_some());
    }

    async fn range_from_id(
        &self,
        start_id: u64,
        count: usize,
        direction: Direction,
    ) -> Result<Vec<T>> {
        let inner = self.inner.read();
        if count == 0 || !inner.in_range(start_id) {
            return Ok(Vec::new());
        }

        let mut items: Vec<T> = inner
            .list
            .range_from_id(start_id, direction, count)
            .into_iter()
            .cloned()
            .collect();
        if direction == Direction::Backward {
            items.reverse();
        }

        trace!(start_id, count, ?direction, returned = items.len(), "range query");
        return Ok(items);
    }

    async fn total_count(&self) -> Result<u64> {
        return Ok(self.inner.read().total_count);
    }

    async fn progress_for_position(&self, position: i64) -> Result<f64> {
        let inner = self.inner.read();
        if inner.total_count == 0 || position < 0 {
            return Ok(0.0);
        }
        let (Some(first), Some(last)) = (inner.list.first(), inner.list.last()) else {
            return Ok(0.0);
        };
        if position as u64 >= last.id() {
            return Ok(1.0);
        }
        if position as u64 <= first.id() {
            return Ok(0.0);
        }
        return Ok(progress::progress_from_samples(position, &inner.samples()));
    }

    async fn position_for_progress(&self, progress: f64) -> Result<u64> {
        let inner = self.inner.read();
        if !(progress > 0.0) {
            return Ok(0);
        }
        if progress >= 1.0 {
            return Ok(inner.total_count.saturating_sub(1));
        }
        if inner.total_count <= 1 {
            return Ok(0);
        }
        if inner.list.len() <= 1 {
            return Ok(progress::linear_position(progress, inner.total_count));
        }
        return Ok(progress::position_from_samples(progress, &inner.samples()));
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Item;

    fn ids(items: &[Item<()>]) -> Vec<u64> {
        return items.iter().map(|item| item.id).collect();
    }

    fn source_of(ids: impl IntoIterator<Item = u64>) -> SkipListSource<Item<()>> {
        return SkipListSource::from_items(ids.into_iter().map(|id| Item::new(id, ())));
    }

    #[tokio::test]
    async fn ranges_are_ascending_in_both_directions() {
        let source = source_of(1..=10);
        let forward = source.range_from_id(3, 5, Direction::Forward).await.unwrap();
        assert_eq!(ids(&forward), vec![3, 4, 5, 6, 7]);

        let backward = source.range_from_id(8, 3, Direction::Backward).await.unwrap();
        assert_eq!(ids(&backward), vec![6, 7, 8]);
    }

    #[tokio::test]
    async fn range_outside_total_count_is_empty() {
        let source = source_of(0..5);
        assert!(source.range_from_id(5, 3, Direction::Backward).await.unwrap().is_empty());
        assert!(source.range_from_id(2, 0, Direction::Forward).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn total_count_tracks_highest_id() {
        let source: SkipListSource<Item<()>> = SkipListSource::new();
        assert_eq!(source.total_count().await.unwrap(), 0);

        source.insert(Item::new(4, ())).await.unwrap();
        source.insert(Item::new(1, ())).await.unwrap();
        assert_eq!(source.total_count().await.unwrap(), 5);
        assert_eq!(source.len(), 2);

        // Deleting the top id keeps the count where it was.
        assert!(source.delete(4).await.unwrap());
        assert!(!source.delete(4).await.unwrap());
        assert_eq!(source.total_count().await.unwrap(), 5);
        assert!(!source.contains(4));
    }

    #[tokio::test]
    async fn top_id_saturates_total_count() {
        let source: SkipListSource<Item<()>> = SkipListSource::new();
        source.insert(Item::new(u64::MAX, ())).await.unwrap();
        source.insert(Item::new(u64::MAX - 2, ())).await.unwrap();
        assert_eq!(source.total_count().await.unwrap(), u64::MAX);

        let forward = source.range_from_id(u64::MAX - 3, 5, Direction::Forward).await.unwrap();
        assert_eq!(ids(&forward), vec![u64::MAX - 2, u64::MAX]);
        let top = source.range_from_id(u64::MAX, 2, Direction::Backward).await.unwrap();
        assert_eq!(ids(&top), vec![u64::MAX - 2, u64::MAX]);

        let rebuilt = source_of([0, u64::MAX]);
        assert_eq!(rebuilt.total_count().await.unwrap(), u64::MAX);
        let after_zero = rebuilt.range_from_id(1, 1, Direction::Forward).await.unwrap();
        assert_eq!(ids(&after_zero), vec![u64::MAX]);
    }

    #[tokio::test]
    async fn first_n_starts_at_lowest_id() {
        let source = source_of([3, 9, 27, 81]);
        let first = source.first_n(3).await.unwrap();
        assert_eq!(ids(&first), vec![3, 9, 27]);
    }

    #[tokio::test]
    async fn progress_edges() {
        let source = source_of(10..20);
        assert_eq!(source.progress_for_position(-5).await.unwrap(), 0.0);
        assert_eq!(source.progress_for_position(10).await.unwrap(), 0.0);
        assert_eq!(source.progress_for_position(19).await.unwrap(), 1.0);
        assert_eq!(source.progress_for_position(1000).await.unwrap(), 1.0);

        assert_eq!(source.position_for_progress(0.0).await.unwrap(), 0);
        assert_eq!(source.position_for_progress(1.0).await.unwrap(), 19);

        let middle = source.position_for_progress(0.5).await.unwrap();
        assert!((10..=19).contains(&middle));
    }

    #[tokio::test]
    async fn progress_on_tiny_sources() {
        let empty: SkipListSource<Item<()>> = SkipListSource::new();
        assert_eq!(empty.progress_for_position(3).await.unwrap(), 0.0);
        assert_eq!(empty.position_for_progress(0.5).await.unwrap(), 0);

        let single = source_of([6]);
        assert_eq!(single.position_for_progress(0.5).await.unwrap(), 3);
        assert_eq!(single.progress_for_position(6).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn sparse_ids_spread_evenly_on_the_track() {
        // Half the items are packed into 0..500, the other half spread over
        // a million ids. By rank, id 499 sits near the middle of the track.
        let dense = 0..500u64;
        let sparse = (0..500u64).map(|i| 1_000 + i * 2_000);
        let source = SkipListSource::with_seed(11);
        for id in dense.chain(sparse) {
            source.inner.write().insert(Item::new(id, ()));
        }

        let progress = source.progress_for_position(499).await.unwrap();
        assert!((0.2..0.8).contains(&progress), "progress was {}", progress);

        let linear = progress::linear_progress(499, source.total_count().await.unwrap());
        assert!(linear < 0.01);
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        return tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn progress_round_trip_stays_within_one_sampling_interval(
            ids in prop::collection::btree_set(0u64..1_000_000, 2..400),
            seed in any::<u64>(),
            progress in 0.0f64..=1.0,
        ) {
            let source = SkipListSource::with_seed(seed);
            for &id in &ids {
                source.inner.write().insert(Item::new(id, ()));
            }
            let samples = source.inner.read().samples();
            prop_assert!(samples.len() >= 2);
            let interval = 1.0 / (samples.len() - 1) as f64;

            let position = block_on(source.position_for_progress(progress)).unwrap();
            let back = block_on(source.progress_for_position(position as i64)).unwrap();
            prop_assert!(
                (back - progress).abs() <= interval,
                "{} -> {} -> {} with {} samples", progress, position, back, samples.len()
            );
        }
    }
}
