//! CPU marching-cubes mesher: turns sampled density lattices into flat triangle lists.
#![forbid(unsafe_code)]

pub mod build;
pub mod march;
pub mod mesh;
pub mod tables;

pub use build::{build_chunk_mesh, chunk_lattice_origin};
pub use march::{GridCell, interpolate_edge, mesh_lattice, triangulate};
pub use mesh::ChunkMesh;

/// Values closer than this are treated as equal when placing an edge crossing.
pub const INTERP_EPSILON: f32 = 1e-5;
