use terra_gpu::{ChunkBuffers, GpuDevice, VisualChunk};
use terra_runtime::{Region, WorkItem};

use super::TerrainWorld;

impl<D: GpuDevice> TerrainWorld<D> {
    /// Integrates queued chunks until the queue is empty or one has to wait for the
    /// next frame. Chunks outside `region` are discarded without touching the device.
    /// Returns how many were integrated or discarded.
    pub(crate) fn intake(&mut self, region: Region) -> usize {
        let mut handled = 0;
        loop {
            let item = match self.carry.take() {
                Some(item) => item,
                None => match self.runtime.try_next() {
                    Some(item) => item,
                    None => break,
                },
            };
            match self.integrate(item, region) {
                Ok(()) => handled += 1,
                Err(item) => {
                    self.carry = Some(item);
                    break;
                }
            }
        }
        handled
    }

    /// Uploads one chunk. Hands the item back when it must be retried on a later frame.
    fn integrate(&mut self, item: WorkItem, region: Region) -> Result<(), WorkItem> {
        let service = self.runtime.service().clone();
        let grid = service.grid();
        let coord = item.coord;

        if !region.contains(coord) {
            log::trace!(target: "stream", "dropping stale chunk {}", coord);
            self.stats.stale += 1;
            grid.complete(coord);
            return Ok(());
        }

        let bounds = coord.world_bounds(self.chunk_world_side);
        let size = item.mesh.staged_size();
        let oversized = size > self.ring.current().capacity();
        if oversized {
            log::warn!(
                target: "stream",
                "chunk {} needs {} staging bytes, more than a frame slot holds; left empty",
                coord,
                size
            );
        }
        if item.mesh.is_empty() || oversized {
            if let Err(e) = self.registry.add(coord, VisualChunk::empty(bounds)) {
                log::warn!(target: "stream", "chunk {} deferred: {}", coord, e);
                self.stats.registry_full += 1;
                return Err(item);
            }
            if oversized {
                self.stats.oversized += 1;
            } else {
                self.stats.empty += 1;
            }
            grid.complete(coord);
            return Ok(());
        }

        let Some(reservation) = self.ring.current_mut().reserve(size) else {
            self.stats.staging_stalls += 1;
            return Err(item);
        };

        let pos_bytes = item.mesh.position_bytes();
        let norm_bytes = item.mesh.normal_bytes();
        let positions = match self
            .device
            .create_device_buffer(pos_bytes.len(), "chunk positions")
        {
            Ok(b) => b,
            Err(e) => {
                log::warn!(target: "stream", "chunk {} deferred: {}", coord, e);
                self.stats.alloc_failures += 1;
                self.ring.current_mut().cancel(reservation);
                return Err(item);
            }
        };
        let normals = match self
            .device
            .create_device_buffer(norm_bytes.len(), "chunk normals")
        {
            Ok(b) => b,
            Err(e) => {
                log::warn!(target: "stream", "chunk {} deferred: {}", coord, e);
                self.stats.alloc_failures += 1;
                self.device.destroy_buffer(positions);
                self.ring.current_mut().cancel(reservation);
                return Err(item);
            }
        };

        let visual = VisualChunk {
            buffers: Some(ChunkBuffers {
                positions: positions.clone(),
                normals: normals.clone(),
            }),
            vertex_count: item.mesh.vertex_count() as u32,
            bounds,
        };
        if let Err(e) = self.registry.add(coord, visual) {
            log::warn!(target: "stream", "chunk {} deferred: {}", coord, e);
            self.stats.registry_full += 1;
            // Never referenced by a submitted command, so no need to defer
            self.device.destroy_buffer(positions);
            self.device.destroy_buffer(normals);
            self.ring.current_mut().cancel(reservation);
            return Err(item);
        }

        self.ring
            .current_mut()
            .fill(reservation, &[(pos_bytes, &positions), (norm_bytes, &normals)]);
        self.stats.uploaded += 1;
        self.stats.bytes_staged += size as u64;
        grid.complete(coord);
        log::trace!(
            target: "stream",
            "chunk {} uploaded ({} vertices)",
            coord,
            item.mesh.vertex_count()
        );
        Ok(())
    }
}
