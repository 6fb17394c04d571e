use std::time::Duration;

use serde::Deserialize;

/// Knobs for a [`WindowCache`](super::WindowCache).
///
/// Buffers on each side of the window hold
/// `clamp(buffer_factor * window_size, min_buffer, max_buffer)` items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of items exposed to the consumer.
    pub window_size: usize,
    /// Quiet period before a position change that arrived mid-update runs.
    pub debounce_ms: u64,
    pub buffer_factor: usize,
    pub min_buffer: usize,
    pub max_buffer: usize,
    /// A buffer is refilled once it drops below this fraction of capacity.
    pub refill_ratio: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        return WindowConfig {
            window_size: 10,
            debounce_ms: 16,
            buffer_factor: 2,
            min_buffer: 10,
            max_buffer: 100,
            refill_ratio: 0.5,
        };
    }
}

impl WindowConfig {
    pub fn new(window_size: usize) -> WindowConfig {
        return WindowConfig {
            window_size,
            ..WindowConfig::default()
        };
    }

    pub fn with_debounce(mut self, debounce: Duration) -> WindowConfig {
        self.debounce_ms = debounce.as_millis() as u64;
        return self;
    }

    pub fn with_buffer_bounds(mut self, min_buffer: usize, max_buffer: usize) -> WindowConfig {
        self.min_buffer = min_buffer;
        self.max_buffer = max_buffer;
        return self;
    }

    pub fn with_refill_ratio(mut self, refill_ratio: f64) -> WindowConfig {
        self.refill_ratio = refill_ratio;
        return self;
    }

    pub fn debounce(&self) -> Duration {
        return Duration::from_millis(self.debounce_ms);
    }

    /// Items held by each buffer region when full.
    pub fn buffer_capacity(&self) -> usize {
        return self.buffer_factor
            .saturating_mul(self.window_size)
            .min(self.max_buffer)
            .max(self.min_buffer);
    }

    /// Slots in the ring: the window, both buffers, and one spare so the
    /// buffers never meet.
    pub fn ring_size(&self) -> usize {
        return self.window_size + 2 * self.buffer_capacity() + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_capacity_is_clamped() {
        assert_eq!(WindowConfig::new(0).buffer_capacity(), 10);
        assert_eq!(WindowConfig::new(3).buffer_capacity(), 10);
        assert_eq!(WindowConfig::new(20).buffer_capacity(), 40);
        assert_eq!(WindowConfig::new(80).buffer_capacity(), 100);
    }

    #[test]
    fn ring_size_fits_window_and_buffers() {
        assert_eq!(WindowConfig::new(5).ring_size(), 5 + 20 + 1);
        assert_eq!(WindowConfig::new(0).ring_size(), 21);
    }

    #[test]
    fn min_above_max_prefers_min() {
        let config = WindowConfig::new(5).with_buffer_bounds(50, 20);
        assert_eq!(config.buffer_capacity(), 50);
    }

    #[test]
    fn deserialize_fills_missing_fields() {
        let json = r#"{ "window_size": 25, "debounce_ms": 5 }"#;
        let config: WindowConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.window_size, 25);
        assert_eq!(config.debounce(), Duration::from_millis(5));
        assert_eq!(config.max_buffer, 100);
        assert_eq!(config.buffer_capacity(), 50);
    }
}
