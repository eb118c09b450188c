use gridwindow::{
    Axis, FetchError, FetchTicket, PreloadRange, ScrollEnd, StaleResponse, WindowChange,
};

/// Notifications emitted by the [`GridController`](crate::GridController).
#[derive(Clone, Debug, PartialEq)]
pub enum GridEvent {
    /// A recompute acquired, released or moved elements.
    WindowChanged(WindowChange),
    ScrollEnd { axis: Axis, end: ScrollEnd },
    /// A data slice was applied; `backed` rendered rows now have data.
    DataApplied { ticket: FetchTicket, backed: usize },
    FetchFailed { ticket: FetchTicket, error: FetchError },
    StaleDiscarded(StaleResponse),
    PreloadDispatched(PreloadRange),
    PreloadFailed { range: PreloadRange, error: FetchError },
    TotalCountChanged(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GridEvent)>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

impl Listeners {
    pub(crate) fn subscribe(
        &mut self,
        listener: impl FnMut(&GridEvent) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push((id, Box::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn emit(&mut self, event: &GridEvent) {
        for (_, listener) in self.entries.iter_mut() {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl core::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
