use serde::Deserialize;

use crate::CHUNK_SIDE;

/// Parameters of the density field and the chunk lattice it is sampled on.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FieldConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default = "default_chunk_side")]
    pub chunk_side: u32,
    /// World units between neighbouring lattice points.
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
    #[serde(default = "default_octaves")]
    pub octaves: i32,
    /// Added as `y * vertical_bias`; positive values push solid material downwards.
    #[serde(default)]
    pub vertical_bias: f32,
    #[serde(default)]
    pub isolevel: f32,
}

fn default_seed() -> i32 {
    1234
}
fn default_chunk_side() -> u32 {
    CHUNK_SIDE
}
fn default_scale() -> f32 {
    1.0
}
fn default_frequency() -> f32 {
    0.0025
}
fn default_octaves() -> i32 {
    10
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            chunk_side: default_chunk_side(),
            scale: default_scale(),
            frequency: default_frequency(),
            octaves: default_octaves(),
            vertical_bias: 0.0,
            isolevel: 0.0,
        }
    }
}

impl FieldConfig {
    /// Lattice points per axis for one chunk (one more than the cell count).
    #[inline]
    pub fn lattice_side(&self) -> usize {
        self.chunk_side as usize + 1
    }

    /// World-space side length of a chunk.
    #[inline]
    pub fn chunk_world_side(&self) -> f32 {
        self.chunk_side as f32 * self.scale
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_side == 0 {
            return Err("field.chunk_side must be at least 1".into());
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(format!("field.scale must be positive, got {}", self.scale));
        }
        if self.octaves < 1 {
            return Err(format!("field.octaves must be at least 1, got {}", self.octaves));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: FieldConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, FieldConfig::default());
        assert_eq!(cfg.lattice_side(), 33);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let cfg: FieldConfig = toml::from_str(
            r#"
            seed = 7
            chunk_side = 16
            vertical_bias = 0.01
        "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.chunk_side, 16);
        assert_eq!(cfg.octaves, 10);
        assert!((cfg.vertical_bias - 0.01).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_zero_side() {
        let cfg = FieldConfig {
            chunk_side: 0,
            ..FieldConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
