//! Device-facing side of chunk streaming: the buffer/command traits a backend
//! implements, the per-frame staging ring, and a headless backend.
#![forbid(unsafe_code)]

pub mod headless;
pub mod ring;

pub use headless::{HeadlessBuffer, HeadlessDevice, RecordedCopy, RecordedDraw, RecordingSink};
pub use ring::{FrameRing, FrameSlot, Reservation, StagedCopy};

use std::fmt;

use terra_geom::Aabb;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    OutOfMemory { requested: usize },
    Device(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::OutOfMemory { requested } => {
                write!(f, "out of device memory allocating {} bytes", requested)
            }
            GpuError::Device(msg) => write!(f, "device error: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {}

/// Creates and destroys device-local vertex buffers. Only called from the main thread.
pub trait GpuDevice {
    type Buffer: Clone + fmt::Debug;

    fn create_device_buffer(&mut self, size: usize, label: &str) -> Result<Self::Buffer, GpuError>;
    fn destroy_buffer(&mut self, buffer: Self::Buffer);
}

/// Records GPU work for one frame.
pub trait CommandSink<B> {
    fn copy_staged(&mut self, staging: &[u8], src_offset: usize, dst: &B, dst_offset: usize, size: usize);
    fn draw(&mut self, vertices: &B, normals: &B, first_vertex: u32, vertex_count: u32);
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChunkBuffers<B> {
    pub positions: B,
    pub normals: B,
}

/// GPU-side state of a resident chunk. Empty chunks own no buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualChunk<B> {
    pub buffers: Option<ChunkBuffers<B>>,
    pub vertex_count: u32,
    pub bounds: Aabb,
}

impl<B> VisualChunk<B> {
    pub fn empty(bounds: Aabb) -> Self {
        Self {
            buffers: None,
            vertex_count: 0,
            bounds,
        }
    }

    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.vertex_count > 0 && self.buffers.is_some()
    }

    /// Hands both buffers to `sink`, leaving the chunk empty.
    pub fn release_into(self, mut sink: impl FnMut(B)) {
        if let Some(b) = self.buffers {
            sink(b.positions);
            sink(b.normals);
        }
    }
}
