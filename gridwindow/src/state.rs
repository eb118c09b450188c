/// Scroll position and viewport extent along one axis.
///
/// Vertical and horizontal axes use independent instances. With `feature = "serde"`, this type
/// implements `Serialize`/`Deserialize`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportState {
    pub scroll_offset: u64,
    pub viewport_size: u32,
}

impl ViewportState {
    pub fn new(scroll_offset: u64, viewport_size: u32) -> Self {
        Self {
            scroll_offset,
            viewport_size,
        }
    }

    /// The exclusive end of the viewport in content coordinates.
    pub fn end(&self) -> u64 {
        self.scroll_offset.saturating_add(self.viewport_size as u64)
    }
}

/// A combined snapshot of both axes.
///
/// This is useful for restoring a grid's scroll position across sessions without coupling
/// the windows to any specific UI framework.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameState {
    pub vertical: ViewportState,
    pub horizontal: ViewportState,
}
