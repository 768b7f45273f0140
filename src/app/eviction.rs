use terra_gpu::GpuDevice;
use terra_world::ChunkCoord;

use super::TerrainWorld;

impl<D: GpuDevice> TerrainWorld<D> {
    /// Moves the streaming region to `center`, re-marks resident chunks that are still
    /// inside and evicts the rest. Evicted buffers are destroyed once the current frame
    /// slot comes around again.
    pub(crate) fn recenter(&mut self, center: ChunkCoord) {
        let service = self.runtime.service().clone();
        let mut guard = service.grid().recenter(center);
        let before = self.registry.count();

        let mut i = 0;
        while i < self.registry.count() {
            if guard.mark_resident(self.registry.positions()[i]) {
                i += 1;
                continue;
            }
            // Swap-remove pulls the last chunk into slot i, which is examined next
            let Some(handle) = self.registry.reverse_lookup(i) else {
                break;
            };
            let ring = &mut self.ring;
            // `handle` was just read back from a live dense slot
            let removed = self
                .registry
                .remove(handle, |v| v.release_into(|b| ring.defer_destroy(b)));
            debug_assert!(removed.is_ok(), "evicting slot {i}: {removed:?}");
        }
        drop(guard);

        let evicted = before - self.registry.count();
        self.stats.evicted += evicted as u64;
        self.stats.recenters += 1;
        log::debug!(
            target: "stream",
            "region moved to {}: {} resident, {} evicted",
            center,
            self.registry.count(),
            evicted
        );
    }
}
