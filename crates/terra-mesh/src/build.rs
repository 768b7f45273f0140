use terra_world::{ChunkCoord, FieldConfig, TerrainField};

use crate::march::mesh_lattice;
use crate::mesh::ChunkMesh;

/// Lattice coordinate of a chunk's minimum corner.
#[inline]
pub fn chunk_lattice_origin(coord: ChunkCoord, chunk_side: u32) -> [i32; 3] {
    let s = chunk_side as i32;
    [coord.cx * s, coord.cy * s, coord.cz * s]
}

/// Samples and meshes one chunk. Neighbouring chunks share their boundary lattice
/// points, so vertices along the seam line up exactly.
pub fn build_chunk_mesh(field: &TerrainField, cfg: &FieldConfig, coord: ChunkCoord) -> ChunkMesh {
    let origin = chunk_lattice_origin(coord, cfg.chunk_side);
    let n = cfg.lattice_side();
    let lattice = field.sample(origin, [n, n, n], cfg.scale);
    let mesh = mesh_lattice(&lattice, origin, cfg.scale, cfg.isolevel);
    log::trace!(target: "mesh", "chunk {} -> {} vertices", coord, mesh.vertex_count());
    mesh
}
