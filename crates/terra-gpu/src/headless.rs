//! Backend without a GPU: buffers are ids with a size, commands are recorded.

use hashbrown::HashMap;

use crate::{CommandSink, GpuDevice, GpuError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeadlessBuffer {
    pub id: u64,
    pub size: usize,
}

/// Tracks live buffers so leaks and double frees show up in tests. An optional
/// allocation budget makes creation fail once exhausted.
#[derive(Default)]
pub struct HeadlessDevice {
    next_id: u64,
    live: HashMap<u64, usize>,
    live_bytes: usize,
    created: u64,
    destroyed: u64,
    invalid_destroys: u64,
    budget: Option<usize>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow only `n` more successful allocations (`None` = unlimited).
    pub fn set_allocation_budget(&mut self, n: Option<usize>) {
        self.budget = n;
    }

    #[inline]
    pub fn live_buffers(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    #[inline]
    pub fn created(&self) -> u64 {
        self.created
    }

    #[inline]
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    #[inline]
    pub fn invalid_destroys(&self) -> u64 {
        self.invalid_destroys
    }

    pub fn is_live(&self, b: &HeadlessBuffer) -> bool {
        self.live.contains_key(&b.id)
    }
}

impl GpuDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;

    fn create_device_buffer(&mut self, size: usize, label: &str) -> Result<HeadlessBuffer, GpuError> {
        if size == 0 {
            return Err(GpuError::Device(format!("zero-sized buffer '{}'", label)));
        }
        if let Some(left) = self.budget.as_mut() {
            if *left == 0 {
                return Err(GpuError::OutOfMemory { requested: size });
            }
            *left -= 1;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, size);
        self.live_bytes += size;
        self.created += 1;
        log::trace!(target: "gpu", "create {} '{}' ({} bytes)", id, label, size);
        Ok(HeadlessBuffer { id, size })
    }

    fn destroy_buffer(&mut self, buffer: HeadlessBuffer) {
        match self.live.remove(&buffer.id) {
            Some(size) => {
                self.live_bytes -= size;
                self.destroyed += 1;
            }
            None => {
                log::warn!(target: "gpu", "destroy of unknown buffer {}", buffer.id);
                self.invalid_destroys += 1;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCopy<B> {
    pub dst: B,
    pub dst_offset: usize,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw<B> {
    pub vertices: B,
    pub normals: B,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

#[derive(Clone, Debug)]
pub struct RecordingSink<B> {
    pub copies: Vec<RecordedCopy<B>>,
    pub draws: Vec<RecordedDraw<B>>,
}

impl<B> Default for RecordingSink<B> {
    fn default() -> Self {
        Self {
            copies: Vec::new(),
            draws: Vec::new(),
        }
    }
}

impl<B> RecordingSink<B> {
    pub fn clear(&mut self) {
        self.copies.clear();
        self.draws.clear();
    }

    pub fn drawn_vertices(&self) -> u64 {
        self.draws.iter().map(|d| u64::from(d.vertex_count)).sum()
    }
}

impl<B: Clone> CommandSink<B> for RecordingSink<B> {
    fn copy_staged(&mut self, staging: &[u8], src_offset: usize, dst: &B, dst_offset: usize, size: usize) {
        self.copies.push(RecordedCopy {
            dst: dst.clone(),
            dst_offset,
            data: staging[src_offset..src_offset + size].to_vec(),
        });
    }

    fn draw(&mut self, vertices: &B, normals: &B, first_vertex: u32, vertex_count: u32) {
        self.draws.push(RecordedDraw {
            vertices: vertices.clone(),
            normals: normals.clone(),
            first_vertex,
            vertex_count,
        });
    }
}
