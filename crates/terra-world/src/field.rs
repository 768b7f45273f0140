use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use crate::config::FieldConfig;

/// Dense scalar lattice, x fastest then y then z.
#[derive(Clone, Debug, PartialEq)]
pub struct Lattice {
    pub extents: [usize; 3],
    pub values: Vec<f32>,
}

impl Lattice {
    pub fn new(extents: [usize; 3]) -> Self {
        Self {
            extents,
            values: vec![0.0; extents[0] * extents[1] * extents[2]],
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.extents[1] + y) * self.extents[0] + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[self.idx(x, y, z)]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Deterministic terrain density. Negative values are solid; the surface is the
/// `isolevel` set. Sampling only needs `&self`, so one field is shared by all workers.
pub struct TerrainField {
    noise: FastNoiseLite,
    vertical_bias: f32,
}

impl TerrainField {
    pub fn new(cfg: &FieldConfig) -> Self {
        let mut noise = FastNoiseLite::with_seed(cfg.seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(cfg.frequency));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(cfg.octaves.max(1)));
        log::debug!(
            target: "field",
            "terrain field seed={} freq={} octaves={} bias={}",
            cfg.seed,
            cfg.frequency,
            cfg.octaves,
            cfg.vertical_bias
        );
        Self {
            noise,
            vertical_bias: cfg.vertical_bias,
        }
    }

    /// Density at a world-space position.
    #[inline]
    pub fn density(&self, x: f32, y: f32, z: f32) -> f32 {
        self.noise.get_noise_3d(x, y, z) + y * self.vertical_bias
    }

    /// Samples `extents` lattice points starting at integer lattice coordinate `origin`.
    /// Point `(i, j, k)` sits at world position `(origin + (i, j, k)) * scale`.
    pub fn sample(&self, origin: [i32; 3], extents: [usize; 3], scale: f32) -> Lattice {
        let mut out = Lattice::new(extents);
        self.sample_into(origin, scale, &mut out);
        out
    }

    /// Like [`sample`](Self::sample) but reuses `out`'s storage and extents.
    pub fn sample_into(&self, origin: [i32; 3], scale: f32, out: &mut Lattice) {
        let [ex, ey, ez] = out.extents;
        out.values.resize(ex * ey * ez, 0.0);
        let mut i = 0;
        for z in 0..ez {
            let wz = (origin[2] + z as i32) as f32 * scale;
            for y in 0..ey {
                let wy = (origin[1] + y as i32) as f32 * scale;
                for x in 0..ex {
                    let wx = (origin[0] + x as i32) as f32 * scale;
                    out.values[i] = self.density(wx, wy, wz);
                    i += 1;
                }
            }
        }
    }
}
