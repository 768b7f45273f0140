use terra_geom::Vec3;
use terra_world::Lattice;

use crate::INTERP_EPSILON;
use crate::mesh::ChunkMesh;
use crate::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};

/// One cube of the lattice: corner positions and the density at each corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridCell {
    pub p: [Vec3; 8],
    pub val: [f32; 8],
}

impl GridCell {
    /// Axis-aligned cube with minimum corner `min` and side `side`.
    pub fn cube(min: Vec3, side: f32, val: [f32; 8]) -> Self {
        let mut p = [Vec3::ZERO; 8];
        for (corner, off) in p.iter_mut().zip(CORNER_OFFSETS.iter()) {
            *corner = min + Vec3::new(off[0] as f32, off[1] as f32, off[2] as f32) * side;
        }
        Self { p, val }
    }

    /// Bit `c` is set when corner `c` lies below the isolevel.
    #[inline]
    pub fn cube_index(&self, isolevel: f32) -> usize {
        let mut index = 0usize;
        for (c, v) in self.val.iter().enumerate() {
            if *v < isolevel {
                index |= 1 << c;
            }
        }
        index
    }
}

/// Point where the isosurface crosses the edge `p1`-`p2`.
#[inline]
pub fn interpolate_edge(isolevel: f32, p1: Vec3, p2: Vec3, v1: f32, v2: f32) -> Vec3 {
    if (isolevel - v1).abs() < INTERP_EPSILON {
        return p1;
    }
    if (isolevel - v2).abs() < INTERP_EPSILON {
        return p2;
    }
    if (v1 - v2).abs() < INTERP_EPSILON {
        return p1;
    }
    let mu = (isolevel - v1) / (v2 - v1);
    p1 + (p2 - p1) * mu
}

/// Appends the triangles for one cell to `out` and returns how many were added (0..=5).
pub fn triangulate(cell: &GridCell, isolevel: f32, out: &mut ChunkMesh) -> usize {
    let index = cell.cube_index(isolevel);
    let edges = EDGE_TABLE[index];
    if edges == 0 {
        return 0;
    }

    let mut verts = [Vec3::ZERO; 12];
    for (e, [a, b]) in EDGE_CORNERS.iter().enumerate() {
        if edges & (1 << e) != 0 {
            verts[e] = interpolate_edge(isolevel, cell.p[*a], cell.p[*b], cell.val[*a], cell.val[*b]);
        }
    }

    let row = &TRI_TABLE[index];
    let mut count = 0;
    for tri in row.chunks_exact(3) {
        if tri[0] < 0 {
            break;
        }
        let v0 = verts[tri[0] as usize];
        let v1 = verts[tri[1] as usize];
        let v2 = verts[tri[2] as usize];
        // Zero-area triangles keep a zero normal
        let n = (v1 - v0).cross(v2 - v0).normalized();
        out.push_triangle([v0, v1, v2], n);
        count += 1;
    }
    count
}

/// Meshes every cell of `lattice`, x fastest. Lattice point `(i, j, k)` sits at
/// `(origin + (i, j, k)) * spacing`, matching how the field was sampled.
pub fn mesh_lattice(lattice: &Lattice, origin: [i32; 3], spacing: f32, isolevel: f32) -> ChunkMesh {
    let [ex, ey, ez] = lattice.extents;
    let mut out = ChunkMesh::default();
    if ex < 2 || ey < 2 || ez < 2 {
        return out;
    }
    let (cx, cy, cz) = (ex - 1, ey - 1, ez - 1);
    let world = |o: i32, i: usize| (o + i as i32) as f32 * spacing;

    let mut cell = GridCell::default();
    for z in 0..cz {
        for y in 0..cy {
            for x in 0..cx {
                for (c, off) in CORNER_OFFSETS.iter().enumerate() {
                    let (lx, ly, lz) = (x + off[0], y + off[1], z + off[2]);
                    cell.p[c] = Vec3::new(
                        world(origin[0], lx),
                        world(origin[1], ly),
                        world(origin[2], lz),
                    );
                    cell.val[c] = lattice.get(lx, ly, lz);
                }
                triangulate(&cell, isolevel, &mut out);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_midpoint_and_snaps() {
        let a = Vec3::ZERO;
        let b = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(interpolate_edge(0.0, a, b, -1.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(interpolate_edge(0.0, a, b, 0.000_001, 1.0), a);
        assert_eq!(interpolate_edge(0.0, a, b, -1.0, -0.000_001), b);
        assert_eq!(interpolate_edge(0.5, a, b, 0.2, 0.2), a);
    }

    #[test]
    fn single_corner_below_gives_one_triangle() {
        let mut val = [1.0; 8];
        val[0] = -1.0;
        let cell = GridCell::cube(Vec3::ZERO, 1.0, val);
        assert_eq!(cell.cube_index(0.0), 1);
        let mut m = ChunkMesh::default();
        assert_eq!(triangulate(&cell, 0.0, &mut m), 1);
        assert_eq!(m.vertex_count(), 3);
        // Crossings at the midpoints of edges 0, 8 and 3
        let mut ps: Vec<[f32; 3]> = (0..3).map(|i| m.position(i).to_array()).collect();
        ps.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ps, vec![[0.0, 0.0, 0.5], [0.0, 0.5, 0.0], [0.5, 0.0, 0.0]]);
        let n = m.normal(0);
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_cells_emit_nothing() {
        let mut m = ChunkMesh::default();
        let below = GridCell::cube(Vec3::ZERO, 1.0, [-1.0; 8]);
        let above = GridCell::cube(Vec3::ZERO, 1.0, [1.0; 8]);
        assert_eq!(triangulate(&below, 0.0, &mut m), 0);
        assert_eq!(triangulate(&above, 0.0, &mut m), 0);
        assert!(m.is_empty());
    }

    #[test]
    fn flat_surface_lattice() {
        // Density is y - 1.5: a horizontal plane through the middle of the second cell layer
        let mut l = Lattice::new([3, 4, 3]);
        for z in 0..3 {
            for y in 0..4 {
                for x in 0..3 {
                    let i = l.idx(x, y, z);
                    l.values[i] = y as f32 - 1.5;
                }
            }
        }
        let m = mesh_lattice(&l, [0, 0, 0], 1.0, 0.0);
        // 2x2 crossed cells, two triangles each
        assert_eq!(m.triangle_count(), 8);
        for i in 0..m.vertex_count() {
            assert!((m.position(i).y - 1.5).abs() < 1e-6);
            assert!((m.normal(i).y.abs() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn tiny_lattice_is_empty() {
        let l = Lattice::new([1, 5, 5]);
        assert!(mesh_lattice(&l, [0, 0, 0], 1.0, 0.0).is_empty());
    }
}
