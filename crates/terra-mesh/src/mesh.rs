use terra_geom::{Aabb, Vec3};

/// Non-indexed triangle list. Every three consecutive vertices form one triangle and
/// all three carry that triangle's face normal.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ChunkMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
}

impl ChunkMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Appends one triangle with its face normal repeated on each vertex.
    pub fn push_triangle(&mut self, v: [Vec3; 3], n: Vec3) {
        for p in v {
            self.positions.extend_from_slice(&p.to_array());
            self.normals.extend_from_slice(&n.to_array());
        }
    }

    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::new(
            self.positions[i * 3],
            self.positions[i * 3 + 1],
            self.positions[i * 3 + 2],
        )
    }

    #[inline]
    pub fn normal(&self, i: usize) -> Vec3 {
        Vec3::new(self.normals[i * 3], self.normals[i * 3 + 1], self.normals[i * 3 + 2])
    }

    /// Box around all positions, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        if self.is_empty() {
            return None;
        }
        let mut b = Aabb::from_point(self.position(0));
        for i in 1..self.vertex_count() {
            b.include(self.position(i));
        }
        Some(b)
    }

    #[inline]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    #[inline]
    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    /// Bytes needed to stage both attribute streams.
    #[inline]
    pub fn staged_size(&self) -> usize {
        (self.positions.len() + self.normals.len()) * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_triangle_repeats_normal() {
        let mut m = ChunkMesh::default();
        assert!(m.is_empty());
        assert_eq!(m.bounds(), None);
        m.push_triangle(
            [Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 2.0, -1.0)],
            Vec3::UP,
        );
        assert_eq!(m.vertex_count(), 3);
        assert_eq!(m.triangle_count(), 1);
        for i in 0..3 {
            assert_eq!(m.normal(i), Vec3::UP);
        }
        let b = m.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn byte_views_cover_all_floats() {
        let mut m = ChunkMesh::default();
        m.push_triangle([Vec3::ONE; 3], Vec3::ZERO);
        assert_eq!(m.position_bytes().len(), 9 * 4);
        assert_eq!(m.normal_bytes().len(), 9 * 4);
        assert_eq!(m.staged_size(), 72);
        assert_eq!(&m.position_bytes()[0..4], &1.0f32.to_ne_bytes());
    }
}
