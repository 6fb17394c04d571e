//! Position <-> progress mapping.
//!
//! Sparse id spaces make a plain `position / total` scrollbar lie: a gap of a
//! million unused ids would eat most of the track. Instead we take a sorted
//! sample of real ids (one skip list level) and treat the samples as evenly
//! spaced along the track, interpolating linearly between neighbours.

/// Linear fallback when there is nothing to sample.
pub(crate) fn linear_progress(position: i64, total: u64) -> f64 {
    if total <= 1 || position <= 0 {
        return 0.0;
    }
    return (position as f64 / (total - 1) as f64).min(1.0);
}

/// Inverse of [`linear_progress`]. NaN maps to 0.
pub(crate) fn linear_position(progress: f64, total: u64) -> u64 {
    if total <= 1 || !(progress > 0.0) {
        return 0;
    }
    if progress >= 1.0 {
        return total - 1;
    }
    return (progress * (total - 1) as f64).round() as u64;
}

/// Pick the skip list level to sample: about `log2(len) / 2`, but never the
/// top level, which may hold only a node or two.
pub(crate) fn sampling_level(len: usize, top_level: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let level = ((len as f64).log2() / 2.0).floor() as usize;
    return level.min(top_level.saturating_sub(1));
}

/// Progress of `position` against strictly ascending sample ids, where
/// sample `i` of `n` sits at `i / (n - 1)`.
pub(crate) fn progress_from_samples(position: i64, samples: &[u64]) -> f64 {
    let (Some(&first), Some(&last)) = (samples.first(), samples.last()) else {
        return 0.0;
    };
    if position <= first as i64 {
        return 0.0;
    }
    let position = position as u64;
    if position >= last {
        return 1.0;
    }

    // first < position < last, so there are at least two samples and
    // both neighbours exist.
    let span = (samples.len() - 1) as f64;
    let right = samples.partition_point(|&id| id <= position);
    let left = right - 1;
    if samples[left] == position {
        return left as f64 / span;
    }

    let (left_id, right_id) = (samples[left], samples[right]);
    let ratio = (position - left_id) as f64 / (right_id - left_id) as f64;
    return (left as f64 + ratio * (right - left) as f64) / span;
}

/// Inverse of [`progress_from_samples`].
pub(crate) fn position_from_samples(progress: f64, samples: &[u64]) -> u64 {
    match samples.len() {
        0 => return 0,
        1 => return samples[0],
        _ => {}
    }
    let last = samples.len() - 1;
    let exact = progress.clamp(0.0, 1.0) * last as f64;
    let left = (exact.floor() as usize).min(last);
    let right = (exact.ceil() as usize).min(last);
    if left == right {
        return samples[left];
    }

    let (left_id, right_id) = (samples[left] as f64, samples[right] as f64);
    let ratio = exact - left as f64;
    return (left_id + ratio * (right_id - left_id)).round() as u64;
}
