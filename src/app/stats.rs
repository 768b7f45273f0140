/// Running totals since the world was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub uploaded: u64,
    pub empty: u64,
    pub stale: u64,
    pub oversized: u64,
    pub staging_stalls: u64,
    pub alloc_failures: u64,
    pub registry_full: u64,
    pub evicted: u64,
    pub bytes_staged: u64,
    pub recenters: u64,
}

/// Counters for the most recent `update` + `draw`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugStats {
    pub integrated: usize,
    pub chunks_culled: usize,
    pub draw_calls: usize,
    pub total_vertices: usize,
    pub copies_submitted: usize,
    pub buffers_destroyed: usize,
}
