//! Chunk coordinates, terrain density sampling, and field parameters.
#![forbid(unsafe_code)]

pub mod config;
pub mod field;

pub use config::FieldConfig;
pub use field::{Lattice, TerrainField};

use serde::{Deserialize, Serialize};
use terra_geom::{Aabb, Vec3};

/// Default chunk side length in world units.
pub const CHUNK_SIDE: u32 = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    #[inline]
    pub const fn splat(c: i32) -> Self {
        Self { cx: c, cy: c, cz: c }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dy = i64::from(self.cy - other.cy);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dy * dy + dz * dz
    }

    /// Chunk containing a world-space position. Floors toward negative infinity so
    /// that `-0.5` lands in chunk `-1`, not `0`.
    #[inline]
    pub fn from_world(p: Vec3, chunk_side: f32) -> Self {
        Self {
            cx: (p.x / chunk_side).floor() as i32,
            cy: (p.y / chunk_side).floor() as i32,
            cz: (p.z / chunk_side).floor() as i32,
        }
    }

    /// World-space position of the chunk's minimum corner.
    #[inline]
    pub fn world_origin(self, chunk_side: f32) -> Vec3 {
        Vec3::new(
            self.cx as f32 * chunk_side,
            self.cy as f32 * chunk_side,
            self.cz as f32 * chunk_side,
        )
    }

    #[inline]
    pub fn world_bounds(self, chunk_side: f32) -> Aabb {
        let min = self.world_origin(chunk_side);
        Aabb::new(min, min + Vec3::splat(chunk_side))
    }
}

impl From<(i32, i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkCoord> for (i32, i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.cx, self.cy, self.cz)
    }
}
