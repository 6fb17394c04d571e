//! Properties of the position <-> progress mapping on `SkipListSource`.

use proptest::prelude::*;
use skipwindow::Item;
use skipwindow::source::{DataSource, SkipListSource};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    return tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future);
}

fn source_of(ids: &[u64]) -> SkipListSource<Item<()>> {
    return SkipListSource::from_items(ids.iter().map(|&id| Item::new(id, ())));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Progress never decreases as the position grows, and stays in [0, 1].
    #[test]
    fn progress_is_monotonic(
        ids in prop::collection::btree_set(0..100_000u64, 1..400),
        mut queries in prop::collection::vec(-10i64..110_000, 2..40),
    ) {
        let ids: Vec<u64> = ids.into_iter().collect();
        let source = source_of(&ids);
        queries.sort_unstable();

        let progress: Vec<f64> = block_on(async {
            let mut out = Vec::new();
            for &query in &queries {
                out.push(source.progress_for_position(query).await.unwrap());
            }
            out
        });
        prop_assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
        prop_assert!(
            progress.windows(2).all(|pair| pair[0] <= pair[1]),
            "{:?} -> {:?}",
            queries,
            progress
        );
    }

    /// Position never decreases as progress grows, and stays addressable.
    #[test]
    fn position_is_monotonic(
        ids in prop::collection::btree_set(0..100_000u64, 1..400),
        mut queries in prop::collection::vec(-0.5f64..1.5, 2..40),
    ) {
        let ids: Vec<u64> = ids.into_iter().collect();
        let source = source_of(&ids);
        queries.sort_unstable_by(f64::total_cmp);

        let positions: Vec<u64> = block_on(async {
            let mut out = Vec::new();
            for &query in &queries {
                out.push(source.position_for_progress(query).await.unwrap());
            }
            out
        });
        let total = ids[ids.len() - 1] + 1;
        prop_assert!(positions.iter().all(|&p| p < total));
        prop_assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    /// Going position -> progress -> position comes back to the same id,
    /// give or take rounding. The lowest id maps to progress 0, which reads
    /// back as position 0.
    #[test]
    fn round_trip_returns_to_start(
        ids in prop::collection::btree_set(0..100_000u64, 2..400),
        pick in any::<prop::sample::Index>(),
    ) {
        let ids: Vec<u64> = ids.into_iter().collect();
        let source = source_of(&ids);
        let position = ids[pick.index(ids.len())];

        let back = block_on(async {
            let progress = source.progress_for_position(position as i64).await.unwrap();
            source.position_for_progress(progress).await.unwrap()
        });

        if position == ids[0] {
            prop_assert_eq!(back, 0);
        } else {
            prop_assert!(back.abs_diff(position) <= 1, "{} came back as {}", position, back);
        }
    }
}

#[test]
fn round_trip_is_exact_on_dense_ids() {
    let ids: Vec<u64> = (0..4_096).collect();
    let source = source_of(&ids);
    block_on(async {
        for position in (0..4_096u64).step_by(37) {
            let progress = source.progress_for_position(position as i64).await.unwrap();
            let back = source.position_for_progress(progress).await.unwrap();
            assert!(back.abs_diff(position) <= 1, "{} came back as {}", position, back);
        }
    });
}
