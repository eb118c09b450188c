use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::ElementKind;

/// A host render node that can be pooled.
///
/// The pool never destroys a node on release; it only asks the node to drop its bindings so a
/// later `acquire` can hand it out for a different index.
pub trait RenderNode {
    fn create(kind: ElementKind) -> Self;

    /// Clears index/content bindings. Underlying render resources must be kept.
    fn clear(&mut self) {}
}

/// A handle into the pool's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u32);

impl ElementId {
    pub fn slot(self) -> usize {
        self.0 as usize
    }
}

/// A pooled render node plus what it currently represents.
#[derive(Clone, Debug)]
pub struct RenderedElement<E> {
    pub node: E,
    pub kind: ElementKind,
    /// The logical index this element represents, `None` while it sits in the pool.
    pub index: Option<usize>,
    /// Start position along the element's axis.
    pub offset: u64,
    /// Size along the element's axis.
    pub extent: u32,
    /// Set while the element is positioned but its data has not arrived yet.
    pub stale: bool,
}

impl<E> RenderedElement<E> {
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.extent as u64)
    }
}

#[derive(Clone, Debug)]
enum Slot<E> {
    Active(RenderedElement<E>),
    Free {
        element: RenderedElement<E>,
        released_at: u64,
    },
    Vacant,
}

/// Counters describing pool traffic since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Elements constructed because no free element of the requested kind was available.
    pub created: u64,
    /// Acquires served from the free list.
    pub reused: u64,
    pub released: u64,
    /// Free elements dropped because the capacity was exceeded.
    pub evicted: u64,
}

impl PoolStats {
    pub fn acquired(&self) -> u64 {
        self.created.saturating_add(self.reused)
    }
}

/// An arena of reusable render elements.
///
/// Window managers hold [`ElementId`]s for their active elements; the elements themselves
/// always live in the pool's arena. A slot is either active, free, or vacant, so an element can
/// never be active and pooled at the same time.
#[derive(Clone, Debug)]
pub struct RecyclePool<E> {
    slots: Vec<Slot<E>>,
    free_rows: VecDeque<ElementId>,
    free_columns: VecDeque<ElementId>,
    vacant: Vec<ElementId>,
    capacity: Option<usize>,
    release_seq: u64,
    stats: PoolStats,
}

impl<E> Default for RecyclePool<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RecyclePool<E> {
    /// Creates an unbounded pool.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_rows: VecDeque::new(),
            free_columns: VecDeque::new(),
            vacant: Vec::new(),
            capacity: None,
            release_seq: 0,
            stats: PoolStats::default(),
        }
    }

    /// Creates a pool that keeps at most `capacity` free elements.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let mut pool = Self::new();
        pool.capacity = capacity;
        pool
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Changes the free-element cap, evicting the oldest free elements if needed.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
        self.enforce_capacity();
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Total elements alive in the arena (active + free).
    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn free_len(&self, kind: ElementKind) -> usize {
        self.free_list(kind).len()
    }

    pub fn active_len(&self) -> usize {
        self.len() - self.free_rows.len() - self.free_columns.len()
    }

    pub fn get(&self, id: ElementId) -> Option<&RenderedElement<E>> {
        match self.slots.get(id.slot())? {
            Slot::Active(element) => Some(element),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut RenderedElement<E>> {
        match self.slots.get_mut(id.slot())? {
            Slot::Active(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_active(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Returns a free element of `kind`, constructing one if the free list is empty.
    pub fn acquire(&mut self, kind: ElementKind) -> ElementId
    where
        E: RenderNode,
    {
        // Most recently released first: it is the most likely to still be warm.
        if let Some(id) = self.free_list_mut(kind).pop_back() {
            let slot = &mut self.slots[id.slot()];
            if let Slot::Free { element, .. } = core::mem::replace(slot, Slot::Vacant) {
                *slot = Slot::Active(element);
                self.stats.reused = self.stats.reused.saturating_add(1);
                return id;
            }
            debug_assert!(false, "free list referenced a non-free slot ({id:?})");
        }

        let element = RenderedElement {
            node: E::create(kind),
            kind,
            index: None,
            offset: 0,
            extent: 0,
            stale: true,
        };
        self.stats.created = self.stats.created.saturating_add(1);
        if let Some(id) = self.vacant.pop() {
            self.slots[id.slot()] = Slot::Active(element);
            return id;
        }
        let id = ElementId(self.slots.len() as u32);
        self.slots.push(Slot::Active(element));
        id
    }

    /// Returns an active element to the pool.
    ///
    /// Returns `false` if `id` is not currently active.
    pub fn release(&mut self, id: ElementId) -> bool
    where
        E: RenderNode,
    {
        if !self.is_active(id) {
            gwarn!(slot = id.slot(), "RecyclePool: release of an element that is not active");
            return false;
        }
        let slot = &mut self.slots[id.slot()];
        let Slot::Active(mut element) = core::mem::replace(slot, Slot::Vacant) else {
            return false;
        };

        element.node.clear();
        element.index = None;
        element.stale = true;
        let kind = element.kind;
        self.release_seq = self.release_seq.wrapping_add(1);
        self.slots[id.slot()] = Slot::Free {
            element,
            released_at: self.release_seq,
        };
        self.free_list_mut(kind).push_back(id);
        self.stats.released = self.stats.released.saturating_add(1);
        self.enforce_capacity();
        true
    }

    /// Drops every element, active or free.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_rows.clear();
        self.free_columns.clear();
        self.vacant.clear();
    }

    fn free_list(&self, kind: ElementKind) -> &VecDeque<ElementId> {
        match kind {
            ElementKind::Row => &self.free_rows,
            ElementKind::Column => &self.free_columns,
        }
    }

    fn free_list_mut(&mut self, kind: ElementKind) -> &mut VecDeque<ElementId> {
        match kind {
            ElementKind::Row => &mut self.free_rows,
            ElementKind::Column => &mut self.free_columns,
        }
    }

    fn released_at(&self, id: ElementId) -> u64 {
        match self.slots.get(id.slot()) {
            Some(Slot::Free { released_at, .. }) => *released_at,
            _ => u64::MAX,
        }
    }

    fn enforce_capacity(&mut self) {
        let Some(cap) = self.capacity else {
            return;
        };
        while self.free_rows.len() + self.free_columns.len() > cap {
            // Evict the oldest free element across both kinds.
            let row_age = self.free_rows.front().map(|&id| self.released_at(id));
            let col_age = self.free_columns.front().map(|&id| self.released_at(id));
            let victim = match (row_age, col_age) {
                (Some(r), Some(c)) if c < r => self.free_columns.pop_front(),
                (Some(_), _) => self.free_rows.pop_front(),
                (None, Some(_)) => self.free_columns.pop_front(),
                (None, None) => None,
            };
            let Some(id) = victim else {
                break;
            };
            self.slots[id.slot()] = Slot::Vacant;
            self.vacant.push(id);
            self.stats.evicted = self.stats.evicted.saturating_add(1);
            gdebug!(slot = id.slot(), "RecyclePool: evicted free element");
        }
    }
}
