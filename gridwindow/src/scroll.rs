use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::{ConfigError, GridOptions, ScrollDirection, ScrollSample};

/// Samples considered by [`ScrollTracker::metrics`].
pub const METRICS_WINDOW: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollPhase {
    #[default]
    Idle,
    Scrolling,
}

/// Emitted once when scrolling settles.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollEnd {
    pub position: u64,
    pub at_ms: u64,
    /// Samples in the history when scrolling ended.
    pub sample_count: usize,
    /// Instantaneous velocity (px/ms) between the last two samples.
    pub velocity: f64,
}

/// What the host should do after feeding the tracker an event or a timer poll.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollTick {
    /// Recompute the window for the latest position now.
    pub recompute: bool,
    pub scroll_end: Option<ScrollEnd>,
}

impl ScrollTick {
    pub fn is_idle(&self) -> bool {
        !self.recompute && self.scroll_end.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PreloadPriority {
    #[default]
    Low,
    Medium,
    High,
}

impl PreloadPriority {
    /// `High` above 1 px/ms, `Medium` above 0.5 px/ms.
    pub fn from_velocity(velocity: f64) -> Self {
        if velocity > 1.0 {
            Self::High
        } else if velocity > 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Aggregated movement over the most recent samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollMetrics {
    pub samples: usize,
    /// Average velocity in px/ms: total distance over total elapsed time.
    pub velocity: f64,
    pub direction: Option<ScrollDirection>,
    pub direction_changes: usize,
    /// `1.0` for a steady scroll, lower the more often the direction flipped.
    pub stability: f64,
    pub priority: PreloadPriority,
}

/// Scroll history, velocity and the `Idle`/`Scrolling` state machine for one axis.
///
/// The tracker never reads a clock: every call carries `now_ms`, and hosts drive debounce and
/// throttle deadlines by calling [`ScrollTracker::poll`] from their timer.
#[derive(Clone, Debug)]
pub struct ScrollTracker {
    history: VecDeque<ScrollSample>,
    capacity: usize,
    throttle_ms: u64,
    debounce_ms: u64,

    phase: ScrollPhase,
    position: u64,
    last_event_ms: Option<u64>,
    last_recompute_ms: Option<u64>,
    pending_recompute: bool,
}

impl ScrollTracker {
    pub fn new(options: &GridOptions) -> Result<Self, ConfigError> {
        Self::with_timing(
            options.history_capacity,
            options.scroll_throttle_ms,
            options.scroll_end_debounce_ms,
        )
    }

    pub fn with_timing(
        capacity: usize,
        throttle_ms: u64,
        debounce_ms: u64,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        Ok(Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            throttle_ms,
            debounce_ms,
            phase: ScrollPhase::Idle,
            position: 0,
            last_event_ms: None,
            last_recompute_ms: None,
            pending_recompute: false,
        })
    }

    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    pub fn is_scrolling(&self) -> bool {
        self.phase == ScrollPhase::Scrolling
    }

    /// The most recently recorded position.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn history(&self) -> &VecDeque<ScrollSample> {
        &self.history
    }

    pub fn samples(&self) -> Vec<ScrollSample> {
        self.history.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Whether a throttled recomputation is waiting for the next [`ScrollTracker::poll`].
    pub fn has_pending_recompute(&self) -> bool {
        self.pending_recompute
    }

    /// The earliest time at which [`ScrollTracker::poll`] can return something.
    pub fn next_deadline(&self) -> Option<u64> {
        let throttle = self
            .pending_recompute
            .then(|| self.last_recompute_ms.map(|t| t.saturating_add(self.throttle_ms)))
            .flatten();
        let debounce = self
            .is_scrolling()
            .then(|| self.last_event_ms.map(|t| t.saturating_add(self.debounce_ms)))
            .flatten();
        match (throttle, debounce) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Records a scroll event.
    pub fn record(&mut self, position: u64, now_ms: u64) -> ScrollTick {
        self.history.push_back(ScrollSample::new(position, now_ms));
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self.position = position;
        self.phase = ScrollPhase::Scrolling;
        self.last_event_ms = Some(now_ms);

        let recompute = self.throttle_elapsed(now_ms);
        if recompute {
            self.last_recompute_ms = Some(now_ms);
            self.pending_recompute = false;
        } else {
            self.pending_recompute = true;
        }
        ScrollTick {
            recompute,
            scroll_end: None,
        }
    }

    /// Advances timers: flushes a throttled recomputation and detects scroll-end.
    pub fn poll(&mut self, now_ms: u64) -> ScrollTick {
        let mut tick = ScrollTick::default();

        if self.pending_recompute && self.throttle_elapsed(now_ms) {
            tick.recompute = true;
        }

        if self.is_scrolling() {
            let quiet_since = self.last_event_ms.unwrap_or(now_ms);
            if now_ms.saturating_sub(quiet_since) >= self.debounce_ms {
                self.phase = ScrollPhase::Idle;
                // The final position must always be rendered.
                tick.recompute |= self.pending_recompute;
                let end = ScrollEnd {
                    position: self.position,
                    at_ms: now_ms,
                    sample_count: self.history.len(),
                    velocity: self.velocity(),
                };
                gdebug!(
                    samples = end.sample_count,
                    velocity = end.velocity,
                    position = end.position,
                    "ScrollTracker: scroll end"
                );
                tick.scroll_end = Some(end);
            }
        }

        if tick.recompute {
            self.pending_recompute = false;
            self.last_recompute_ms = Some(now_ms);
        }
        tick
    }

    /// Instantaneous velocity in px/ms between the two most recent samples.
    ///
    /// Zero with fewer than two samples or when both share a timestamp.
    pub fn velocity(&self) -> f64 {
        let n = self.history.len();
        if n < 2 {
            return 0.0;
        }
        let a = self.history[n - 2];
        let b = self.history[n - 1];
        let dt = b.timestamp_ms.saturating_sub(a.timestamp_ms);
        if dt == 0 {
            return 0.0;
        }
        b.position.abs_diff(a.position) as f64 / dt as f64
    }

    /// Direction of the last movement, `None` if the last two samples share a position.
    pub fn direction(&self) -> Option<ScrollDirection> {
        let n = self.history.len();
        if n < 2 {
            return None;
        }
        direction_between(self.history[n - 2].position, self.history[n - 1].position)
    }

    pub fn metrics(&self) -> ScrollMetrics {
        velocity_metrics(self.history.iter().copied())
    }

    /// Forgets the history and returns to `Idle` without emitting a scroll-end.
    pub fn reset(&mut self) {
        self.history.clear();
        self.phase = ScrollPhase::Idle;
        self.last_event_ms = None;
        self.last_recompute_ms = None;
        self.pending_recompute = false;
    }

    fn throttle_elapsed(&self, now_ms: u64) -> bool {
        match self.last_recompute_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.throttle_ms,
        }
    }
}

fn direction_between(from: u64, to: u64) -> Option<ScrollDirection> {
    match to.cmp(&from) {
        core::cmp::Ordering::Greater => Some(ScrollDirection::Forward),
        core::cmp::Ordering::Less => Some(ScrollDirection::Backward),
        core::cmp::Ordering::Equal => None,
    }
}

/// Computes [`ScrollMetrics`] over the last [`METRICS_WINDOW`] samples of `history`.
pub fn velocity_metrics(history: impl DoubleEndedIterator<Item = ScrollSample>) -> ScrollMetrics {
    let mut recent: Vec<ScrollSample> = history.rev().take(METRICS_WINDOW).collect();
    recent.reverse();

    let mut distance = 0u64;
    let mut elapsed = 0u64;
    let mut direction = None;
    let mut changes = 0usize;
    for pair in recent.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let dt = b.timestamp_ms.saturating_sub(a.timestamp_ms);
        if dt > 0 {
            distance = distance.saturating_add(b.position.abs_diff(a.position));
            elapsed = elapsed.saturating_add(dt);
        }
        if let Some(d) = direction_between(a.position, b.position) {
            if direction.is_some_and(|prev| prev != d) {
                changes += 1;
            }
            direction = Some(d);
        }
    }

    let velocity = if elapsed > 0 {
        distance as f64 / elapsed as f64
    } else {
        0.0
    };
    let stability = if recent.is_empty() {
        0.0
    } else {
        let s = 1.0 - changes as f64 / recent.len() as f64;
        if s < 0.0 { 0.0 } else { s }
    };
    ScrollMetrics {
        samples: recent.len(),
        velocity,
        direction,
        direction_changes: changes,
        stability,
        priority: PreloadPriority::from_velocity(velocity),
    }
}
