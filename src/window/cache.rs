use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use super::Ring;
use super::Slot;
use super::WindowConfig;
use crate::Keyed;
use crate::Result;
use crate::source::DataSource;
use crate::source::Direction;

/// Window contents plus whether the data runs out on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot<T> {
    pub items: Vec<T>,
    /// Nothing is buffered below the window and the source has nothing more.
    pub at_start: bool,
    /// Nothing is buffered above the window and the source has nothing more.
    pub at_end: bool,
    pub version: u64,
}

/// Keeps a window of `window_size` items over a [`DataSource`], with
/// prefetched buffers on both sides so single-step moves never wait on the
/// source.
///
/// Cloning gives another handle to the same window. Background fetches run
/// on the tokio runtime the cache was created on.
pub struct WindowCache<S: DataSource> {
    shared: Arc<Shared<S>>,
}

impl<S: DataSource> Clone for WindowCache<S> {
    fn clone(&self) -> Self {
        return WindowCache {
            shared: Arc::clone(&self.shared),
        };
    }
}

impl<S: DataSource> WindowCache<S> {
    /// # Panics
    ///
    /// Outside a tokio runtime. Use [`with_runtime`](WindowCache::with_runtime)
    /// to pass a handle explicitly.
    pub fn new(source: S, config: WindowConfig) -> WindowCache<S> {
        return WindowCache::with_runtime(source, config, Handle::current());
    }

    pub fn with_runtime(source: S, config: WindowConfig, runtime: Handle) -> WindowCache<S> {
        let layout = Layout {
            window_size: config.window_size,
            capacity: config.buffer_capacity(),
            ring_size: config.ring_size(),
        };
        let (version, _) = watch::channel(0);
        debug!(
            window_size = layout.window_size,
            buffer_capacity = layout.capacity,
            ring_size = layout.ring_size,
            "creating window cache"
        );
        return WindowCache {
            shared: Arc::new(Shared {
                source,
                layout,
                debounce: config.debounce(),
                refill_threshold: layout.capacity as f64 * config.refill_ratio,
                runtime,
                state: Mutex::new(WindowState::new(layout)),
                version,
                quiet: Notify::new(),
            }),
        };
    }

    /// Ask for the window to start at `position`. Runs right away when
    /// nothing else is loading, otherwise after the debounce delay. Only the
    /// most recent request is kept.
    pub fn set_position(&self, position: i64) {
        self.shared.request_position(position);
    }

    /// Slide the window one item towards higher ids, returning the item that
    /// came into view. `None` when the upper buffer is empty; a fill is
    /// scheduled so a later call can succeed.
    pub fn move_forward(&self) -> Option<S::Item> {
        return self.shared.step(Direction::Forward);
    }

    /// Slide the window one item towards lower ids, returning the item that
    /// came into view at the start.
    pub fn move_backward(&self) -> Option<S::Item> {
        return self.shared.step(Direction::Backward);
    }

    /// Up to `count` items from the start of the window. `None` and
    /// `Some(0)` both mean the whole window. Larger counts run on into the
    /// upper buffer and stop at its edge.
    pub fn window_items(&self, count: Option<usize>) -> Vec<S::Item> {
        return self.shared.state.lock().window_items(count);
    }

    pub fn snapshot(&self, count: Option<usize>) -> WindowSnapshot<S::Item> {
        let version = self.version();
        return self.shared.state.lock().snapshot(count, version);
    }

    /// Total count as last read from the source.
    pub fn total_count(&self) -> u64 {
        return self.shared.state.lock().total_count;
    }

    /// Bumped on every rebuild and every move.
    pub fn version(&self) -> u64 {
        return *self.shared.version.borrow();
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        return self.shared.version.subscribe();
    }

    /// Bump the version without changing anything, so subscribers re-read.
    pub fn publish(&self) {
        self.shared.bump_version();
    }

    /// Id of the first item in the window.
    pub fn position(&self) -> Option<u64> {
        let state = self.shared.state.lock();
        let slot = state.window_start?;
        return state.ring.get(slot).map(|item| item.id());
    }

    /// Items currently held in the (lower, upper) buffers.
    pub fn buffered(&self) -> (usize, usize) {
        let state = self.shared.state.lock();
        return (state.lower_count, state.upper_count);
    }

    pub fn window_size(&self) -> usize {
        return self.shared.layout.window_size;
    }

    pub fn buffer_capacity(&self) -> usize {
        return self.shared.layout.capacity;
    }

    pub fn source(&self) -> &S {
        return &self.shared.source;
    }

    pub async fn progress_for_position(&self, position: i64) -> Result<f64> {
        return self.shared.source.progress_for_position(position).await;
    }

    pub async fn position_for_progress(&self, progress: f64) -> Result<u64> {
        return self.shared.source.position_for_progress(progress).await;
    }

    /// Wait until no rebuild, debounce or buffer fill is pending.
    pub async fn settled(&self) {
        loop {
            let mut notified = std::pin::pin!(self.shared.quiet.notified());
            notified.as_mut().enable();
            let quiet = self.shared.state.lock().is_quiet();
            if quiet {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    window_size: usize,
    /// Items per buffer region.
    capacity: usize,
    ring_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Lower,
    Upper,
}

impl Region {
    fn direction(self) -> Direction {
        return match self {
            Region::Lower => Direction::Backward,
            Region::Upper => Direction::Forward,
        };
    }

    /// The buffer a move in `direction` consumes.
    fn ahead(direction: Direction) -> Region {
        return match direction {
            Direction::Forward => Region::Upper,
            Direction::Backward => Region::Lower,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateState {
    Idle,
    Updating { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillState {
    Idle,
    /// Spawned but not started.
    Scheduled,
    Filling { rerun: bool },
}

struct Debounce {
    token: u64,
    handle: AbortHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FillPlan {
    generation: u64,
    edge: Slot,
    edge_id: u64,
    need: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillOutcome {
    Skipped,
    Applied { placed: usize },
    /// The window was rebuilt while fetching.
    Stale,
    /// The buffer edge moved while fetching.
    Moved,
}

#[derive(Debug, PartialEq)]
enum Step<T> {
    Uninitialized,
    Blocked,
    Moved(Option<T>),
}

struct WindowState<T> {
    layout: Layout,
    ring: Ring<T>,
    window_start: Option<Slot>,
    window_end: Option<Slot>,
    lower_count: usize,
    upper_count: usize,
    // Set when the last fill of a region came back short.
    lower_exhausted: bool,
    upper_exhausted: bool,
    total_count: u64,
    generation: u64,
    update: UpdateState,
    pending_position: Option<i64>,
    debounce: Option<Debounce>,
    next_debounce_token: u64,
    lower_fill: FillState,
    upper_fill: FillState,
}

impl<T: Keyed + Clone> WindowState<T> {
    fn new(layout: Layout) -> WindowState<T> {
        return WindowState {
            layout,
            ring: Ring::new(layout.ring_size),
            window_start: None,
            window_end: None,
            lower_count: 0,
            upper_count: 0,
            lower_exhausted: false,
            upper_exhausted: false,
            total_count: 0,
            generation: 0,
            update: UpdateState::Idle,
            pending_position: None,
            debounce: None,
            next_debounce_token: 0,
            lower_fill: FillState::Idle,
            upper_fill: FillState::Idle,
        };
    }

    fn is_quiet(&self) -> bool {
        return self.update == UpdateState::Idle
            && self.pending_position.is_none()
            && self.debounce.is_none()
            && self.lower_fill == FillState::Idle
            && self.upper_fill == FillState::Idle;
    }

    fn count(&self, region: Region) -> usize {
        return match region {
            Region::Lower => self.lower_count,
            Region::Upper => self.upper_count,
        };
    }

    fn count_mut(&mut self, region: Region) -> &mut usize {
        return match region {
            Region::Lower => &mut self.lower_count,
            Region::Upper => &mut self.upper_count,
        };
    }

    fn exhausted_mut(&mut self, region: Region) -> &mut bool {
        return match region {
            Region::Lower => &mut self.lower_exhausted,
            Region::Upper => &mut self.upper_exhausted,
        };
    }

    fn fill_state_mut(&mut self, region: Region) -> &mut FillState {
        return match region {
            Region::Lower => &mut self.lower_fill,
            Region::Upper => &mut self.upper_fill,
        };
    }

    fn window_items(&self, count: Option<usize>) -> Vec<T> {
        let Some(start) = self.window_start else {
            return Vec::new();
        };
        let count = match count {
            None | Some(0) => self.layout.window_size,
            Some(count) => count.min(self.layout.window_size + self.upper_count),
        };
        return self.ring.values(start, count).flatten().cloned().collect();
    }

    fn snapshot(&self, count: Option<usize>, version: u64) -> WindowSnapshot<T> {
        let holds = |slot: Option<Slot>| slot.and_then(|slot| self.ring.get(slot)).is_some();
        let initialized = self.window_start.is_some();
        return WindowSnapshot {
            items: self.window_items(count),
            at_start: initialized
                && self.lower_count == 0
                && (self.lower_exhausted || !holds(self.window_start)),
            at_end: initialized
                && self.upper_count == 0
                && (self.upper_exhausted || !holds(self.window_end)),
            version,
        };
    }

    /// Throw away the ring and lay `items` out as the new window, starting
    /// at the head slot. A short load means nothing lies above the window.
    fn rebuild(&mut self, items: Vec<T>, total_count: u64) {
        let window_size = self.layout.window_size;
        self.ring.reset(self.layout.ring_size);
        let head = self.ring.head();
        let loaded = self
            .ring
            .set_values(head, items.into_iter().take(window_size).map(Some));
        self.window_start = Some(head);
        self.window_end = Some(self.ring.forward(head, window_size.saturating_sub(1)));
        self.lower_count = 0;
        self.upper_count = 0;
        self.lower_exhausted = false;
        self.upper_exhausted = loaded < window_size;
        self.total_count = total_count;
        self.check_invariants();
    }

    /// Outermost occupied slot of a region, or the window edge when the
    /// region is empty.
    fn edge(&self, region: Region) -> Option<Slot> {
        return match region {
            Region::Lower => Some(self.ring.backward(self.window_start?, self.lower_count)),
            Region::Upper => Some(self.ring.forward(self.window_end?, self.upper_count)),
        };
    }

    fn plan_fill(&self, region: Region) -> Option<FillPlan> {
        let need = self.layout.capacity.saturating_sub(self.count(region));
        if need == 0 {
            return None;
        }
        let edge = self.edge(region)?;
        let edge_id = self.ring.get(edge)?.id();
        return Some(FillPlan {
            generation: self.generation,
            edge,
            edge_id,
            need,
        });
    }

    /// Splice fetched items outward from the edge recorded in `plan`.
    /// `items` are ascending and may include the edge item itself.
    fn apply_fill(&mut self, region: Region, plan: &FillPlan, items: Vec<T>) -> FillOutcome {
        if self.generation != plan.generation {
            return FillOutcome::Stale;
        }
        let edge = self.edge(region);
        let edge_id = edge.and_then(|slot| self.ring.get(slot)).map(|item| item.id());
        if edge != Some(plan.edge) || edge_id != Some(plan.edge_id) {
            return FillOutcome::Moved;
        }

        let beyond: Vec<T> = match region {
            Region::Lower => items
                .into_iter()
                .rev()
                .filter(|item| item.id() < plan.edge_id)
                .collect(),
            Region::Upper => items
                .into_iter()
                .filter(|item| item.id() > plan.edge_id)
                .collect(),
        };
        let exhausted = beyond.len() < plan.need;
        let room = self.layout.capacity.saturating_sub(self.count(region));

        let mut slot = plan.edge;
        let mut placed = 0;
        for item in beyond.into_iter().take(room) {
            slot = match region {
                Region::Lower => self.ring.prev(slot),
                Region::Upper => self.ring.next(slot),
            };
            self.ring.set(slot, Some(item));
            placed += 1;
        }
        *self.count_mut(region) += placed;
        *self.exhausted_mut(region) = exhausted;
        self.check_invariants();
        return FillOutcome::Applied { placed };
    }

    /// Move the window one slot. The slot it leaves joins the buffer behind
    /// it, dropping that buffer's outermost item when it is full.
    fn step(&mut self, direction: Direction) -> Step<T> {
        let (Some(start), Some(end)) = (self.window_start, self.window_end) else {
            return Step::Uninitialized;
        };
        if self.layout.window_size == 0 || self.count(Region::ahead(direction)) == 0 {
            return Step::Blocked;
        }

        let capacity = self.layout.capacity;
        let entered = match direction {
            Direction::Forward => {
                let vacated = self.ring.get(start).is_some();
                let entered = self.ring.next(end);
                self.window_start = Some(self.ring.next(start));
                self.window_end = Some(entered);
                self.upper_count -= 1;
                if vacated {
                    if self.lower_count == capacity {
                        self.lower_exhausted = false;
                    }
                    self.lower_count = (self.lower_count + 1).min(capacity);
                }
                entered
            }
            Direction::Backward => {
                let vacated = self.ring.get(end).is_some();
                let entered = self.ring.prev(start);
                self.window_start = Some(entered);
                self.window_end = Some(self.ring.prev(end));
                self.lower_count -= 1;
                if vacated {
                    if self.upper_count == capacity {
                        self.upper_exhausted = false;
                    }
                    self.upper_count = (self.upper_count + 1).min(capacity);
                }
                entered
            }
        };
        self.check_invariants();
        return Step::Moved(self.ring.get(entered).cloned());
    }

    /// Slide a full window to `position` if that stays inside the buffers.
    /// The new first item is the first buffered id at or above `position`,
    /// and its predecessor must be buffered too (unless it is an exact
    /// match) so nothing in between can be missing.
    fn shift_to(&mut self, position: u64) -> bool {
        let (Some(start), Some(end)) = (self.window_start, self.window_end) else {
            return false;
        };
        if self.layout.window_size == 0 || self.ring.get(end).is_none() {
            return false;
        }

        // The new start can be any loaded slot from the lower edge up to
        // `upper_count` slots past the current start.
        let lowest = self.ring.backward(start, self.lower_count);
        let candidates = self.lower_count + self.upper_count + 1;
        let Some(slot) = self.ring.find(lowest, candidates, |item| item.id() >= position) else {
            return false;
        };
        let exact = self.ring.get(slot).is_some_and(|item| item.id() == position);
        if slot == lowest && !exact {
            return false;
        }
        let target = self.ring.distance(lowest, slot) as isize - self.lower_count as isize;

        let direction = if target < 0 {
            Direction::Backward
        } else {
            Direction::Forward
        };
        for _ in 0..target.unsigned_abs() {
            self.step(direction);
        }
        return true;
    }

    fn check_invariants(&self) {
        let Layout {
            window_size,
            capacity,
            ring_size,
        } = self.layout;
        debug_assert!(self.lower_count <= capacity, "lower buffer over capacity");
        debug_assert!(self.upper_count <= capacity, "upper buffer over capacity");
        debug_assert!(self.lower_count + window_size + self.upper_count < ring_size.max(1));
        if let (Some(start), Some(end)) = (self.window_start, self.window_end) {
            debug_assert_eq!(
                self.ring.distance(start, end),
                window_size.saturating_sub(1),
                "window span"
            );
            debug_assert!(self.loaded_span_ascending(start), "loaded ids out of order");
        }
    }

    /// Buffers are fully occupied and ids ascend from the lower edge to the
    /// upper edge.
    fn loaded_span_ascending(&self, start: Slot) -> bool {
        let span = self.lower_count + self.layout.window_size + self.upper_count;
        let window = self.lower_count..self.lower_count + self.layout.window_size;
        let mut last: Option<u64> = None;
        let mut slot = self.ring.backward(start, self.lower_count);
        for offset in 0..span {
            match self.ring.get(slot) {
                Some(item) => {
                    if last.is_some_and(|last| last >= item.id()) {
                        return false;
                    }
                    last = Some(item.id());
                }
                None if window.contains(&offset) => {}
                None => return false,
            }
            slot = self.ring.next(slot);
        }
        return true;
    }
}

struct Shared<S: DataSource> {
    source: S,
    layout: Layout,
    debounce: Duration,
    refill_threshold: f64,
    runtime: Handle,
    state: Mutex<WindowState<S::Item>>,
    version: watch::Sender<u64>,
    /// Woken whenever background work finishes.
    quiet: Notify,
}

impl<S: DataSource> Shared<S> {
    fn bump_version(&self) {
        self.version.send_modify(|version| *version += 1);
    }

    fn request_position(self: &Arc<Self>, position: i64) {
        let mut state = self.state.lock();
        state.pending_position = Some(position);
        if let Some(debounce) = state.debounce.take() {
            debounce.handle.abort();
        }

        if state.window_start.is_none() || state.update == UpdateState::Idle {
            drop(state);
            trace!(position, "updating window now");
            self.runtime.spawn(Arc::clone(self).execute_pending());
            return;
        }

        let token = state.next_debounce_token;
        state.next_debounce_token += 1;
        let shared = Arc::clone(self);
        let delay = self.debounce;
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.state.lock();
                if state.debounce.as_ref().map(|debounce| debounce.token) != Some(token) {
                    return;
                }
                state.debounce = None;
            }
            // A separate task, so aborting a later debounce cannot cancel it.
            shared.runtime.spawn(Arc::clone(&shared).execute_pending());
        });
        state.debounce = Some(Debounce {
            token,
            handle: task.abort_handle(),
        });
        trace!(position, "window update debounced");
    }

    async fn execute_pending(self: Arc<Self>) {
        let claimed = {
            let mut state = self.state.lock();
            match state.pending_position.take() {
                Some(position) => {
                    state.generation += 1;
                    let generation = state.generation;
                    state.update = UpdateState::Updating { generation };
                    Some((position, generation))
                }
                None => None,
            }
        };

        if let Some((position, generation)) = claimed {
            if let Err(err) = Arc::clone(&self).update_window(position, generation).await {
                warn!(position, %err, "window update failed, keeping the previous window");
            }
            let mut state = self.state.lock();
            if state.update == (UpdateState::Updating { generation }) {
                state.update = UpdateState::Idle;
            }
        }
        self.quiet.notify_waiters();
    }

    async fn update_window(self: Arc<Self>, position: i64, generation: u64) -> Result<()> {
        let total_count = self.source.total_count().await?;
        let position = clamp_position(position, total_count);

        let shifted = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return Ok(());
            }
            state.total_count = total_count;
            state.shift_to(position)
        };
        if shifted {
            debug!(position, "window slid within buffers");
            self.bump_version();
            self.schedule_low_fills();
            return Ok(());
        }

        let items = self
            .source
            .range_from_id(position, self.layout.window_size, Direction::Forward)
            .await?;
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(position, generation, "discarding stale window");
                return Ok(());
            }
            debug!(position, generation, loaded = items.len(), "window rebuilt");
            state.rebuild(items, total_count);
        }
        self.bump_version();

        Arc::clone(&self).fill(Region::Lower).await;
        Arc::clone(&self).fill(Region::Upper).await;
        return Ok(());
    }

    fn step(self: &Arc<Self>, direction: Direction) -> Option<S::Item> {
        let step = self.state.lock().step(direction);
        return match step {
            Step::Uninitialized => None,
            Step::Blocked => {
                trace!(?direction, "buffer empty, cannot move");
                self.schedule_fill(Region::ahead(direction));
                None
            }
            Step::Moved(item) => {
                trace!(?direction, id = item.as_ref().map(|item| item.id()), "window moved");
                self.bump_version();
                self.schedule_low_fills();
                item
            }
        };
    }

    fn schedule_low_fills(self: &Arc<Self>) {
        let (lower, upper) = {
            let state = self.state.lock();
            (state.lower_count, state.upper_count)
        };
        if (lower as f64) < self.refill_threshold {
            self.schedule_fill(Region::Lower);
        }
        if (upper as f64) < self.refill_threshold {
            self.schedule_fill(Region::Upper);
        }
    }

    fn schedule_fill(self: &Arc<Self>, region: Region) {
        {
            let mut state = self.state.lock();
            let fill = state.fill_state_mut(region);
            match *fill {
                FillState::Idle => *fill = FillState::Scheduled,
                FillState::Scheduled => return,
                FillState::Filling { ref mut rerun } => {
                    *rerun = true;
                    return;
                }
            }
        }
        self.runtime.spawn(Arc::clone(self).fill(region));
    }

    /// Top up one buffer region. At most one fill per region runs at a
    /// time; callers arriving meanwhile ask for a rerun instead.
    fn fill(self: Arc<Self>, region: Region) -> BoxFuture<'static, ()> {
        return Box::pin(async move {
            {
                let mut state = self.state.lock();
                let fill = state.fill_state_mut(region);
                if let FillState::Filling { rerun } = fill {
                    *rerun = true;
                    return;
                }
                *fill = FillState::Filling { rerun: false };
            }

            let moved = match self.fill_once(region).await {
                Ok(FillOutcome::Moved) => true,
                Ok(FillOutcome::Applied { placed }) => {
                    trace!(?region, placed, "buffer topped up");
                    false
                }
                Ok(_) => false,
                Err(err) => {
                    warn!(?region, %err, "buffer fill failed");
                    false
                }
            };

            let rerun = {
                let mut state = self.state.lock();
                let fill = state.fill_state_mut(region);
                let rerun = moved || *fill == FillState::Filling { rerun: true };
                *fill = FillState::Idle;
                rerun
            };
            if rerun {
                self.schedule_fill(region);
            }
            self.quiet.notify_waiters();
        });
    }

    async fn fill_once(&self, region: Region) -> Result<FillOutcome> {
        let plan = self.state.lock().plan_fill(region);
        let Some(plan) = plan else {
            return Ok(FillOutcome::Skipped);
        };

        let items = self
            .source
            .range_from_id(plan.edge_id, plan.need + 1, region.direction())
            .await?;
        let fetched = items.len();
        let outcome = self.state.lock().apply_fill(region, &plan, items);
        debug!(
            ?region,
            edge_id = plan.edge_id,
            need = plan.need,
            fetched,
            ?outcome,
            "buffer fill"
        );
        return Ok(outcome);
    }
}

/// Clamp a requested position into `[0, total_count - 1]`.
fn clamp_position(position: i64, total_count: u64) -> u64 {
    if total_count == 0 || position <= 0 {
        return 0;
    }
    return (position as u64).min(total_count - 1);
}
