use std::time::Duration;

use skipwindow::Item;
use skipwindow::source::{DataSource, DelayedSource, SkipListSource};
use skipwindow::window::{WindowCache, WindowConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> skipwindow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // A dense block of ids followed by a long sparse tail.
    let source = SkipListSource::new();
    for id in (0..5_000).chain((5_000..1_000_000).step_by(997)) {
        source.insert(Item::new(id, format!("row {id}"))).await?;
    }
    info!(items = source.len(), total = source.total_count().await?, "source ready");

    let source = DelayedSource::new(source, Duration::from_millis(5));
    let cache = WindowCache::new(source, WindowConfig::new(20));

    let middle = cache.position_for_progress(0.5).await?;
    cache.set_position(middle as i64);
    cache.settled().await;
    let ids: Vec<u64> = cache.window_items(None).iter().map(|item| item.id).collect();
    info!(position = middle, ?ids, "window loaded");

    for _ in 0..30 {
        match cache.move_forward() {
            Some(item) => {
                let progress = cache.progress_for_position(item.id as i64).await?;
                info!(
                    id = item.id,
                    payload = %item.payload,
                    progress,
                    buffered = ?cache.buffered(),
                    "moved forward"
                );
            }
            None => {
                info!("upper buffer empty, waiting for it to fill");
                cache.settled().await;
            }
        }
    }

    let snapshot = cache.snapshot(Some(5));
    info!(
        version = snapshot.version,
        at_start = snapshot.at_start,
        at_end = snapshot.at_end,
        first = ?snapshot.items.first().map(|item| item.id),
        "done"
    );
    return Ok(());
}
