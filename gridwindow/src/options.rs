use crate::ConfigError;

/// Configuration shared by the row and column windows, the scroll trackers and the prefetch
/// planners.
///
/// With `feature = "serde"`, missing fields fall back to their defaults, so hosts can load a
/// partial configuration from any serde format.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridOptions {
    /// Fixed row height in pixels. Must be greater than zero.
    pub item_height: u32,
    /// Rows rendered beyond each edge of the visible range.
    pub buffer_size: usize,
    /// Regular columns rendered beyond each edge of the visible column range.
    pub buffer_columns: usize,

    pub viewport_height: u32,
    pub viewport_width: u32,

    /// Minimum interval between two window recomputations while scroll events keep arriving.
    pub scroll_throttle_ms: u64,
    /// Quiet period after the last scroll event before scrolling is considered finished.
    pub scroll_end_debounce_ms: u64,
    /// Lifetime of cached responses, for hosts that add a response cache.
    pub cache_ttl_ms: u64,

    /// Number of scroll samples retained per axis.
    pub history_capacity: usize,
    /// Samples required before a scroll-end triggers prefetch planning.
    pub prefetch_min_samples: usize,
    /// Preload ranges dispatched per scroll-end; the remainder is queued.
    pub prefetch_batch_size: usize,

    /// Optional hard cap on free (released) elements kept by the recycle pool.
    pub pool_capacity: Option<usize>,

    /// Columns are virtualized only when the regular columns are wider than
    /// `viewport_width * column_virtualization_ratio`.
    pub column_virtualization_ratio: f32,
    /// Fraction of the buffered row range the visible end may consume before the next range
    /// is proposed for preloading.
    pub preload_threshold: f32,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            item_height: 40,
            buffer_size: 50,
            buffer_columns: 5,
            viewport_height: 0,
            viewport_width: 0,
            scroll_throttle_ms: 16,
            scroll_end_debounce_ms: 150,
            cache_ttl_ms: 300_000,
            history_capacity: 20,
            prefetch_min_samples: 5,
            prefetch_batch_size: 3,
            pool_capacity: None,
            column_virtualization_ratio: 1.5,
            preload_threshold: 0.8,
        }
    }
}

impl GridOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks every field that has a domain restriction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.item_height == 0 {
            return Err(ConfigError::ZeroItemHeight);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        if self.prefetch_batch_size == 0 {
            return Err(ConfigError::ZeroPrefetchBatch);
        }
        let ratio = self.column_virtualization_ratio;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(ConfigError::InvalidVirtualizationRatio(ratio));
        }
        let threshold = self.preload_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidPreloadThreshold(threshold));
        }
        Ok(())
    }

    pub fn with_item_height(mut self, item_height: u32) -> Self {
        self.item_height = item_height;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_buffer_columns(mut self, buffer_columns: usize) -> Self {
        self.buffer_columns = buffer_columns;
        self
    }

    pub fn with_viewport(mut self, viewport_width: u32, viewport_height: u32) -> Self {
        self.viewport_width = viewport_width;
        self.viewport_height = viewport_height;
        self
    }

    pub fn with_scroll_throttle_ms(mut self, ms: u64) -> Self {
        self.scroll_throttle_ms = ms;
        self
    }

    pub fn with_scroll_end_debounce_ms(mut self, ms: u64) -> Self {
        self.scroll_end_debounce_ms = ms;
        self
    }

    pub fn with_cache_ttl_ms(mut self, ms: u64) -> Self {
        self.cache_ttl_ms = ms;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_prefetch(mut self, min_samples: usize, batch_size: usize) -> Self {
        self.prefetch_min_samples = min_samples;
        self.prefetch_batch_size = batch_size;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: Option<usize>) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_column_virtualization_ratio(mut self, ratio: f32) -> Self {
        self.column_virtualization_ratio = ratio;
        self
    }

    pub fn with_preload_threshold(mut self, threshold: f32) -> Self {
        self.preload_threshold = threshold;
        self
    }
}
