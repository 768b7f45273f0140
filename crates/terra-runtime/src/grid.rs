//! Occupancy grid over the streaming region, shared between workers and the main thread.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockWriteGuard};

use hashbrown::HashSet;
use terra_world::ChunkCoord;

const EMPTY: u8 = 0;
const SCHEDULED: u8 = 1;
const GENERATED: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Scheduled,
    Generated,
}

impl CellState {
    fn from_raw(v: u8) -> Self {
        match v {
            SCHEDULED => CellState::Scheduled,
            GENERATED => CellState::Generated,
            _ => CellState::Empty,
        }
    }
}

/// Cube of `side`³ chunk coordinates starting at `min`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub min: ChunkCoord,
    pub side: i32,
}

impl Region {
    /// Region whose center cell is `center`: `min = center - side / 2`.
    pub fn centered(center: ChunkCoord, side: i32) -> Self {
        let h = side / 2;
        Self {
            min: center.offset(-h, -h, -h),
            side,
        }
    }

    /// Exclusive upper corner.
    #[inline]
    pub fn max(&self) -> ChunkCoord {
        self.min.offset(self.side, self.side, self.side)
    }

    #[inline]
    pub fn center(&self) -> ChunkCoord {
        let h = self.side / 2;
        self.min.offset(h, h, h)
    }

    #[inline]
    pub fn len(&self) -> usize {
        let s = self.side as usize;
        s * s * s
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.side <= 0
    }

    #[inline]
    pub fn contains(&self, c: ChunkCoord) -> bool {
        let max = self.max();
        c.cx >= self.min.cx
            && c.cy >= self.min.cy
            && c.cz >= self.min.cz
            && c.cx < max.cx
            && c.cy < max.cy
            && c.cz < max.cz
    }

    /// Flat index, x fastest: `(z * side + y) * side + x`.
    #[inline]
    pub fn index_of(&self, c: ChunkCoord) -> Option<usize> {
        if !self.contains(c) {
            return None;
        }
        let s = self.side as usize;
        let x = (c.cx - self.min.cx) as usize;
        let y = (c.cy - self.min.cy) as usize;
        let z = (c.cz - self.min.cz) as usize;
        Some((z * s + y) * s + x)
    }

    #[inline]
    pub fn coord_at(&self, index: usize) -> ChunkCoord {
        let s = self.side as usize;
        let x = index % s;
        let y = (index / s) % s;
        let z = index / (s * s);
        self.min.offset(x as i32, y as i32, z as i32)
    }
}

struct GridState {
    region: Region,
    cells: Vec<AtomicU8>,
}

/// Per-cell scheduling state for the current region plus the set of coordinates whose
/// generation has started but whose result has not been integrated yet.
///
/// Lock order is grid state before the in-flight set.
pub struct SharedGrid {
    state: RwLock<GridState>,
    in_flight: Mutex<HashSet<ChunkCoord>>,
}

impl SharedGrid {
    pub fn new(center: ChunkCoord, side: i32) -> Self {
        let side = side.max(1);
        let region = Region::centered(center, side);
        let cells = (0..region.len()).map(|_| AtomicU8::new(EMPTY)).collect();
        Self {
            state: RwLock::new(GridState { region, cells }),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn region(&self) -> Region {
        self.state.read().unwrap_or_else(PoisonError::into_inner).region
    }

    pub fn contains(&self, c: ChunkCoord) -> bool {
        self.region().contains(c)
    }

    pub fn cell_state(&self, c: ChunkCoord) -> Option<CellState> {
        let st = self.state.read().unwrap_or_else(PoisonError::into_inner);
        st.region
            .index_of(c)
            .map(|i| CellState::from_raw(st.cells[i].load(Ordering::Acquire)))
    }

    /// Picks the empty cell nearest the region center among indices
    /// `worker, worker + workers, ...` (ties go to the lowest index), claims it and
    /// records it as in flight. `None` when this worker's share has nothing left.
    pub fn claim_nearest(&self, worker: usize, workers: usize) -> Option<ChunkCoord> {
        let st = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let center = st.region.center();
        let mut best: Option<(i64, usize)> = None;
        for i in (worker..st.cells.len()).step_by(workers.max(1)) {
            if st.cells[i].load(Ordering::Acquire) != EMPTY {
                continue;
            }
            let d = st.region.coord_at(i).distance_sq(center);
            if best.is_none_or(|(bd, _)| d < bd) {
                best = Some((d, i));
            }
        }
        let (_, i) = best?;
        st.cells[i]
            .compare_exchange(EMPTY, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let coord = st.region.coord_at(i);
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(coord);
        Some(coord)
    }

    /// Called once a result has been integrated or discarded as stale. Marks the cell
    /// generated if it is still inside the region.
    pub fn complete(&self, coord: ChunkCoord) {
        let st = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(i) = st.region.index_of(coord) {
            st.cells[i].store(GENERATED, Ordering::Release);
        }
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&coord);
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_in_flight(&self, coord: ChunkCoord) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&coord)
    }

    /// Moves the region to `center` and resets occupancy. In-flight coordinates still
    /// in range stay scheduled. Workers are blocked until the returned guard is dropped,
    /// so resident chunks should be re-marked through it.
    pub fn recenter(&self, center: ChunkCoord) -> RecenterGuard<'_> {
        let mut st = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let region = Region::centered(center, st.region.side);
        st.region = region;
        for c in st.cells.iter_mut() {
            *c.get_mut() = EMPTY;
        }
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        for coord in in_flight.iter() {
            if let Some(i) = region.index_of(*coord) {
                *st.cells[i].get_mut() = SCHEDULED;
            }
        }
        log::debug!(
            target: "grid",
            "recenter to {} (min {}, {} in flight)",
            center,
            region.min,
            in_flight.len()
        );
        RecenterGuard { state: st }
    }
}

pub struct RecenterGuard<'a> {
    state: RwLockWriteGuard<'a, GridState>,
}

impl RecenterGuard<'_> {
    pub fn region(&self) -> Region {
        self.state.region
    }

    /// Marks a resident chunk's cell generated. Returns `false` if the chunk is
    /// outside the new region and should be evicted.
    pub fn mark_resident(&mut self, coord: ChunkCoord) -> bool {
        let st = &mut *self.state;
        match st.region.index_of(coord) {
            Some(i) => {
                *st.cells[i].get_mut() = GENERATED;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_bounds_for_odd_and_even_sides() {
        let r = Region::centered(ChunkCoord::splat(0), 3);
        assert_eq!(r.min, ChunkCoord::splat(-1));
        assert_eq!(r.max(), ChunkCoord::splat(2));
        assert_eq!(r.center(), ChunkCoord::splat(0));
        assert_eq!(r.len(), 27);

        let r = Region::centered(ChunkCoord::new(10, 0, -4), 18);
        assert_eq!(r.min, ChunkCoord::new(1, -9, -13));
        assert_eq!(r.max(), ChunkCoord::new(19, 9, 5));
        assert_eq!(r.center(), ChunkCoord::new(10, 0, -4));
    }

    #[test]
    fn index_round_trips() {
        let r = Region::centered(ChunkCoord::new(5, -7, 2), 4);
        for i in 0..r.len() {
            assert_eq!(r.index_of(r.coord_at(i)), Some(i));
        }
        assert_eq!(r.index_of(r.max()), None);
        assert_eq!(r.coord_at(1), r.min.offset(1, 0, 0));
        assert_eq!(r.coord_at(4), r.min.offset(0, 1, 0));
        assert_eq!(r.coord_at(16), r.min.offset(0, 0, 1));
    }

    #[test]
    fn first_claim_is_center() {
        let g = SharedGrid::new(ChunkCoord::new(3, 3, 3), 5);
        assert_eq!(g.claim_nearest(0, 1), Some(ChunkCoord::new(3, 3, 3)));
        assert_eq!(g.cell_state(ChunkCoord::new(3, 3, 3)), Some(CellState::Scheduled));
        assert!(g.is_in_flight(ChunkCoord::new(3, 3, 3)));
    }

    #[test]
    fn recenter_keeps_in_flight_scheduled() {
        let g = SharedGrid::new(ChunkCoord::splat(0), 3);
        let c = g.claim_nearest(0, 1).unwrap();
        let mut guard = g.recenter(ChunkCoord::new(1, 0, 0));
        assert_eq!(guard.region(), Region::centered(ChunkCoord::new(1, 0, 0), 3));
        assert!(guard.mark_resident(ChunkCoord::new(2, 0, 0)));
        assert!(!guard.mark_resident(ChunkCoord::new(-1, 0, 0)));
        drop(guard);
        assert_eq!(g.cell_state(c), Some(CellState::Scheduled));
        assert_eq!(g.cell_state(ChunkCoord::new(2, 0, 0)), Some(CellState::Generated));
        // The in-flight center is never handed out again
        while let Some(next) = g.claim_nearest(0, 1) {
            assert_ne!(next, c);
        }
        assert_eq!(g.in_flight_len(), 26);
        g.complete(c);
        assert!(!g.is_in_flight(c));
        assert_eq!(g.cell_state(c), Some(CellState::Generated));
    }
}
