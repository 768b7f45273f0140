use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use terra_mesh::{ChunkMesh, chunk_lattice_origin, mesh_lattice};
use terra_world::{ChunkCoord, FieldConfig, TerrainField};

use crate::grid::SharedGrid;

/// Finished chunk handed from a worker to the main thread.
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub coord: ChunkCoord,
    pub mesh: ChunkMesh,
    pub t_sample_ms: u32,
    pub t_mesh_ms: u32,
}

#[derive(Default)]
pub struct RuntimeStats {
    pub generated: AtomicU64,
    pub empty_meshes: AtomicU64,
    pub idle_polls: AtomicU64,
    pub queue_retries: AtomicU64,
    pub dropped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub generated: u64,
    pub empty_meshes: u64,
    pub idle_polls: u64,
    pub queue_retries: u64,
    pub dropped: u64,
    pub in_flight: usize,
}

/// Everything a worker needs: the density field, the occupancy grid and the running
/// flag. Shared by `Arc` between the main thread and all workers.
pub struct TerrainService {
    field: TerrainField,
    field_cfg: FieldConfig,
    grid: SharedGrid,
    running: AtomicBool,
    stats: RuntimeStats,
}

impl TerrainService {
    pub fn new(field_cfg: FieldConfig, center: ChunkCoord, region_side: i32) -> Self {
        Self {
            field: TerrainField::new(&field_cfg),
            field_cfg,
            grid: SharedGrid::new(center, region_side),
            running: AtomicBool::new(true),
            stats: RuntimeStats::default(),
        }
    }

    #[inline]
    pub fn field(&self) -> &TerrainField {
        &self.field
    }

    #[inline]
    pub fn field_config(&self) -> &FieldConfig {
        &self.field_cfg
    }

    #[inline]
    pub fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    #[inline]
    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            generated: self.stats.generated.load(Ordering::Relaxed),
            empty_meshes: self.stats.empty_meshes.load(Ordering::Relaxed),
            idle_polls: self.stats.idle_polls.load(Ordering::Relaxed),
            queue_retries: self.stats.queue_retries.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            in_flight: self.grid.in_flight_len(),
        }
    }

    /// Samples and meshes one chunk. Holds no locks.
    pub fn generate_chunk(&self, coord: ChunkCoord) -> WorkItem {
        let cfg = &self.field_cfg;
        let origin = chunk_lattice_origin(coord, cfg.chunk_side);
        let n = cfg.lattice_side();

        let t0 = Instant::now();
        let lattice = self.field.sample(origin, [n, n, n], cfg.scale);
        let t_sample_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

        let t1 = Instant::now();
        let mesh = mesh_lattice(&lattice, origin, cfg.scale, cfg.isolevel);
        let t_mesh_ms = t1.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

        self.stats.generated.fetch_add(1, Ordering::Relaxed);
        if mesh.is_empty() {
            self.stats.empty_meshes.fetch_add(1, Ordering::Relaxed);
        }
        WorkItem {
            coord,
            mesh,
            t_sample_ms,
            t_mesh_ms,
        }
    }
}
