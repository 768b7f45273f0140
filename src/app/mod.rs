//! Main-thread side of terrain streaming: integrates finished chunks, moves the region
//! with the viewer, and issues copies and draws.

mod culling;
mod eviction;
mod intake;
mod stats;
#[cfg(test)]
mod tests;

pub use culling::Culling;
pub use stats::{DebugStats, StreamStats};

use std::io;
use std::sync::Arc;

use terra_chunk::ChunkRegistry;
use terra_gpu::{CommandSink, FrameRing, GpuDevice, VisualChunk};
use terra_runtime::{Region, Runtime, RuntimeOptions, TerrainService, WorkItem};
use terra_world::ChunkCoord;

use crate::camera::{FrameInput, Viewer};
use crate::config::StreamConfig;

pub struct TerrainWorld<D: GpuDevice> {
    pub(crate) device: D,
    pub(crate) runtime: Runtime,
    pub(crate) registry: ChunkRegistry<VisualChunk<D::Buffer>>,
    pub(crate) ring: FrameRing<D::Buffer>,
    /// Item that could not be integrated last time; retried before anything new.
    pub(crate) carry: Option<WorkItem>,
    pub(crate) viewer_chunk: ChunkCoord,
    pub(crate) chunk_world_side: f32,
    pub culling: Culling,
    pub stats: StreamStats,
    pub debug_stats: DebugStats,
}

impl<D: GpuDevice> TerrainWorld<D> {
    /// Builds the world around `viewer` and starts the workers.
    pub fn new(cfg: &StreamConfig, device: D, viewer: &impl Viewer) -> io::Result<Self> {
        Self::with_options(cfg, cfg.stream.runtime_options(), device, viewer)
    }

    pub fn with_options(
        cfg: &StreamConfig,
        opts: RuntimeOptions,
        device: D,
        viewer: &impl Viewer,
    ) -> io::Result<Self> {
        let chunk_world_side = cfg.field.chunk_world_side();
        let viewer_chunk = ChunkCoord::from_world(viewer.eye_position(), chunk_world_side);
        let service = Arc::new(TerrainService::new(
            cfg.field.clone(),
            viewer_chunk,
            cfg.stream.region_side,
        ));
        let runtime = Runtime::new(service, opts)?;
        log::info!(
            target: "stream",
            "world around {}: region {}^3, {} frames in flight, {} KiB staging per frame",
            viewer_chunk,
            cfg.stream.region_side,
            cfg.gpu.frames_in_flight,
            cfg.gpu.staging_bytes / 1024
        );
        Ok(Self {
            device,
            runtime,
            registry: ChunkRegistry::new(cfg.gpu.registry_capacity),
            ring: FrameRing::new(cfg.gpu.frames_in_flight, cfg.gpu.staging_bytes),
            carry: None,
            viewer_chunk,
            chunk_world_side,
            culling: Culling::new(cfg.gpu.culling),
            stats: StreamStats::default(),
            debug_stats: DebugStats::default(),
        })
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    #[inline]
    pub fn registry(&self) -> &ChunkRegistry<VisualChunk<D::Buffer>> {
        &self.registry
    }

    #[inline]
    pub fn viewer_chunk(&self) -> ChunkCoord {
        self.viewer_chunk
    }

    #[inline]
    pub fn has_carry_over(&self) -> bool {
        self.carry.is_some()
    }

    pub fn pending_destroys(&self) -> usize {
        self.ring.pending_destroys()
    }

    /// Integrates finished chunks, follows the viewer and applies input.
    pub fn update(&mut self, viewer: &impl Viewer, input: FrameInput) {
        self.debug_stats = DebugStats::default();

        // Stale results are judged against the region this frame ends in
        let chunk = ChunkCoord::from_world(viewer.eye_position(), self.chunk_world_side);
        let region = Region::centered(chunk, self.runtime.service().grid().region().side);
        self.debug_stats.integrated = self.intake(region);

        if chunk != self.viewer_chunk {
            self.viewer_chunk = chunk;
            self.recenter(chunk);
        }

        if input.toggle_freeze_culling {
            self.culling.toggle_freeze(viewer);
        }
    }

    /// Submits this frame's copies, draws every visible chunk and rotates the ring.
    pub fn draw(&mut self, sink: &mut impl CommandSink<D::Buffer>, viewer: &impl Viewer) {
        self.debug_stats.copies_submitted = self.ring.submit_copies(sink);

        let frustum = self.culling.active(viewer);
        for v in self.registry.visuals() {
            let Some(b) = v.buffers.as_ref().filter(|_| v.vertex_count > 0) else {
                continue;
            };
            if let Some(f) = frustum.as_ref() {
                if !f.intersects_aabb(&v.bounds) {
                    self.debug_stats.chunks_culled += 1;
                    continue;
                }
            }
            sink.draw(&b.positions, &b.normals, 0, v.vertex_count);
            self.debug_stats.draw_calls += 1;
            self.debug_stats.total_vertices += v.vertex_count as usize;
        }

        self.debug_stats.buffers_destroyed = self.ring.advance(&mut self.device);
    }

    /// Stops the workers and destroys every buffer still owned by the world.
    pub fn shutdown(&mut self) {
        self.runtime.shutdown();
        let device = &mut self.device;
        self.registry.drain(|v| v.release_into(|b| device.destroy_buffer(b)));
        let n = self.ring.destroy_all(&mut self.device);
        self.carry = None;
        log::info!(
            target: "stream",
            "shutdown: {} deferred buffers released, totals {:?}",
            n,
            self.stats
        );
    }
}
