//! Generational slot map holding the resident chunks.
//!
//! Live chunks are kept in dense, contiguous arrays (positions, visuals, handles) so a
//! frame can walk them without gaps. A sparse slot table maps stable handles to dense
//! indices; removing a chunk swaps the last dense entry into the hole.
#![forbid(unsafe_code)]

use std::fmt;

use terra_world::ChunkCoord;

/// Largest registry the 16-bit slot index can address.
pub const MAX_CHUNKS: usize = 1 << 16;

const INDEX_MASK: u32 = 0xffff;
const GENERATION_STEP: u32 = 0x1_0000;
const INACTIVE: u32 = u32::MAX;

/// Stable reference to a registered chunk: slot index in the low 16 bits, a
/// generation counter in the high 16 bits. Reusing a slot bumps the generation so
/// handles to the previous occupant stop resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkHandle(u32);

impl ChunkHandle {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    #[inline]
    pub const fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

impl fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index(), self.generation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Every slot is live.
    CapacityExhausted { capacity: usize },
    /// Handle refers to a removed chunk or a slot that has since been reused.
    StaleHandle(ChunkHandle),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExhausted { capacity } => {
                write!(f, "chunk registry full ({} slots)", capacity)
            }
            RegistryError::StaleHandle(h) => write!(f, "stale chunk handle {}", h),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Clone, Copy, Debug)]
struct Slot {
    id: ChunkHandle,
    dense: u32,
    next: u32,
}

pub struct ChunkRegistry<V> {
    slots: Vec<Slot>,
    free_head: u32,
    free_tail: u32,
    free_len: usize,
    positions: Vec<ChunkCoord>,
    visuals: Vec<V>,
    handles: Vec<ChunkHandle>,
}

impl<V> ChunkRegistry<V> {
    /// Registry with `capacity` slots, clamped to `1..=MAX_CHUNKS`. Capacity never grows.
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.clamp(1, MAX_CHUNKS);
        if cap != capacity {
            log::warn!(target: "registry", "capacity {} clamped to {}", capacity, cap);
        }
        let slots = (0..cap as u32)
            .map(|i| Slot {
                id: ChunkHandle(i),
                dense: INACTIVE,
                next: i + 1,
            })
            .collect();
        Self {
            slots,
            free_head: 0,
            free_tail: cap as u32 - 1,
            free_len: cap,
            positions: Vec::with_capacity(cap),
            visuals: Vec::with_capacity(cap),
            handles: Vec::with_capacity(cap),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_len == 0
    }

    /// Registers a chunk and returns its handle.
    pub fn add(&mut self, position: ChunkCoord, visual: V) -> Result<ChunkHandle, RegistryError> {
        if self.free_len == 0 {
            return Err(RegistryError::CapacityExhausted {
                capacity: self.capacity(),
            });
        }
        let idx = self.free_head as usize;
        let dense = self.handles.len() as u32;
        let slot = &mut self.slots[idx];
        self.free_head = slot.next;
        self.free_len -= 1;
        slot.id = ChunkHandle(slot.id.0.wrapping_add(GENERATION_STEP));
        slot.dense = dense;
        slot.next = INACTIVE;
        let handle = slot.id;

        self.positions.push(position);
        self.visuals.push(visual);
        self.handles.push(handle);
        Ok(handle)
    }

    #[inline]
    pub fn has(&self, handle: ChunkHandle) -> bool {
        self.slots
            .get(handle.index())
            .is_some_and(|s| s.id == handle && s.dense != INACTIVE)
    }

    /// Dense index of a live handle.
    #[inline]
    pub fn lookup(&self, handle: ChunkHandle) -> Option<usize> {
        if self.has(handle) {
            Some(self.slots[handle.index()].dense as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn reverse_lookup(&self, dense: usize) -> Option<ChunkHandle> {
        self.handles.get(dense).copied()
    }

    #[inline]
    pub fn position(&self, handle: ChunkHandle) -> Option<ChunkCoord> {
        self.lookup(handle).map(|d| self.positions[d])
    }

    #[inline]
    pub fn visual(&self, handle: ChunkHandle) -> Option<&V> {
        self.lookup(handle).map(|d| &self.visuals[d])
    }

    #[inline]
    pub fn positions(&self) -> &[ChunkCoord] {
        &self.positions
    }

    #[inline]
    pub fn visuals(&self) -> &[V] {
        &self.visuals
    }

    #[inline]
    pub fn handles(&self) -> &[ChunkHandle] {
        &self.handles
    }

    /// Removes a chunk in O(1), handing its visual to `release`. The last dense entry
    /// moves into the vacated position.
    pub fn remove(&mut self, handle: ChunkHandle, release: impl FnOnce(V)) -> Result<(), RegistryError> {
        let dense = self
            .lookup(handle)
            .ok_or(RegistryError::StaleHandle(handle))?;
        let idx = handle.index();

        self.positions.swap_remove(dense);
        let visual = self.visuals.swap_remove(dense);
        self.handles.swap_remove(dense);
        if let Some(moved) = self.handles.get(dense) {
            self.slots[moved.index()].dense = dense as u32;
        }

        self.slots[idx].dense = INACTIVE;
        self.push_free(idx as u32);
        release(visual);
        Ok(())
    }

    /// Removes every chunk, handing each visual to `release`. Outstanding handles go stale.
    pub fn drain(&mut self, mut release: impl FnMut(V)) {
        for h in std::mem::take(&mut self.handles) {
            self.slots[h.index()].dense = INACTIVE;
            self.push_free(h.index() as u32);
        }
        self.positions.clear();
        for v in self.visuals.drain(..) {
            release(v);
        }
    }

    fn push_free(&mut self, idx: u32) {
        self.slots[idx as usize].next = INACTIVE;
        if self.free_len == 0 {
            self.free_head = idx;
        } else {
            self.slots[self.free_tail as usize].next = idx;
        }
        self.free_tail = idx;
        self.free_len += 1;
    }
}
