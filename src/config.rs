use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use terra_runtime::{RuntimeOptions, default_worker_count};
use terra_world::FieldConfig;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StreamConfig {
    #[serde(default)]
    pub field: FieldConfig,
    #[serde(default)]
    pub stream: StreamParams,
    #[serde(default)]
    pub gpu: GpuParams,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StreamParams {
    /// Chunks per axis of the streaming region around the viewer.
    #[serde(default = "default_region_side")]
    pub region_side: i32,
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
    /// 0 picks one per core minus one.
    #[serde(default)]
    pub workers: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GpuParams {
    /// Depth of the staging ring and of the deferred-destroy ring.
    #[serde(default = "default_frames_in_flight")]
    pub frames_in_flight: usize,
    /// Staging bytes per frame slot.
    #[serde(default = "default_staging_bytes")]
    pub staging_bytes: usize,
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,
    #[serde(default)]
    pub culling: bool,
}

fn default_region_side() -> i32 {
    18
}
fn default_idle_sleep_ms() -> u64 {
    16
}
fn default_queue_capacity() -> usize {
    4096
}
fn default_push_timeout_ms() -> u64 {
    50
}
fn default_frames_in_flight() -> usize {
    3
}
fn default_staging_bytes() -> usize {
    4 * 1024 * 1024
}
fn default_registry_capacity() -> usize {
    terra_chunk::MAX_CHUNKS
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            region_side: default_region_side(),
            idle_sleep_ms: default_idle_sleep_ms(),
            queue_capacity: default_queue_capacity(),
            push_timeout_ms: default_push_timeout_ms(),
            workers: 0,
        }
    }
}

impl Default for GpuParams {
    fn default() -> Self {
        Self {
            frames_in_flight: default_frames_in_flight(),
            staging_bytes: default_staging_bytes(),
            registry_capacity: default_registry_capacity(),
            culling: false,
        }
    }
}

impl StreamParams {
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            workers: if self.workers == 0 {
                default_worker_count()
            } else {
                self.workers
            },
            queue_capacity: self.queue_capacity,
            idle_sleep: Duration::from_millis(self.idle_sleep_ms),
            push_timeout: Duration::from_millis(self.push_timeout_ms),
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.field.validate()?;
        if self.stream.region_side < 1 {
            return Err(format!(
                "stream.region_side must be at least 1, got {}",
                self.stream.region_side
            ));
        }
        if self.stream.queue_capacity == 0 {
            return Err("stream.queue_capacity must be at least 1".into());
        }
        if self.gpu.frames_in_flight == 0 {
            return Err("gpu.frames_in_flight must be at least 1".into());
        }
        if self.gpu.registry_capacity == 0 || self.gpu.registry_capacity > terra_chunk::MAX_CHUNKS {
            return Err(format!(
                "gpu.registry_capacity must be within 1..={}, got {}",
                terra_chunk::MAX_CHUNKS,
                self.gpu.registry_capacity
            ));
        }
        let region = (self.stream.region_side as usize).pow(3);
        if region > self.gpu.registry_capacity {
            log::warn!(
                target: "config",
                "region holds {} chunks but the registry only {}; streaming will stall",
                region,
                self.gpu.registry_capacity
            );
        }
        Ok(())
    }
}

pub fn load_stream_config_from_path(path: &Path) -> Result<StreamConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: StreamConfig = toml::from_str(&s)?;
    cfg.validate()?;
    Ok(cfg)
}
