//! Ring of per-frame slots. Each slot owns a staging region filled by bump allocation
//! and the list of buffers whose destruction waits until the slot comes around again.

use crate::{CommandSink, GpuDevice};

#[derive(Clone, Debug, PartialEq)]
pub struct StagedCopy<B> {
    pub src_offset: usize,
    pub dst: B,
    pub dst_offset: usize,
    pub size: usize,
}

/// Bytes set aside in a slot's staging region, to be filled or cancelled.
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    offset: usize,
    len: usize,
}

impl Reservation {
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct FrameSlot<B> {
    staging: Vec<u8>,
    head: usize,
    copies: Vec<StagedCopy<B>>,
    deferred: Vec<B>,
}

impl<B: Clone> FrameSlot<B> {
    fn new(staging_bytes: usize) -> Self {
        Self {
            staging: vec![0; staging_bytes],
            head: 0,
            copies: Vec::new(),
            deferred: Vec::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.staging.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.staging.len() - self.head
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn pending_copies(&self) -> &[StagedCopy<B>] {
        &self.copies
    }

    #[inline]
    pub fn deferred(&self) -> &[B] {
        &self.deferred
    }

    pub fn reserve(&mut self, len: usize) -> Option<Reservation> {
        if len > self.remaining() {
            return None;
        }
        let r = Reservation {
            offset: self.head,
            len,
        };
        self.head += len;
        Some(r)
    }

    /// Returns reserved bytes. Only the most recent reservation can be given back;
    /// older ones stay consumed until the slot is reset.
    pub fn cancel(&mut self, r: Reservation) {
        if r.offset + r.len == self.head {
            self.head = r.offset;
        }
    }

    /// Writes `parts` back to back into the reservation and records one copy per part
    /// into the start of its destination buffer.
    pub fn fill(&mut self, r: Reservation, parts: &[(&[u8], &B)]) {
        let end = r.offset + r.len;
        let mut cursor = r.offset;
        for (bytes, dst) in parts {
            let n = bytes.len().min(end - cursor);
            debug_assert_eq!(n, bytes.len(), "staging reservation too small");
            self.staging[cursor..cursor + n].copy_from_slice(&bytes[..n]);
            self.copies.push(StagedCopy {
                src_offset: cursor,
                dst: (*dst).clone(),
                dst_offset: 0,
                size: n,
            });
            cursor += n;
        }
    }

    fn submit(&mut self, sink: &mut impl CommandSink<B>) -> usize {
        let n = self.copies.len();
        for c in self.copies.drain(..) {
            sink.copy_staged(&self.staging, c.src_offset, &c.dst, c.dst_offset, c.size);
        }
        n
    }

    fn recycle<D: GpuDevice<Buffer = B>>(&mut self, device: &mut D) -> usize {
        let n = self.deferred.len();
        for b in self.deferred.drain(..) {
            device.destroy_buffer(b);
        }
        self.head = 0;
        self.copies.clear();
        n
    }
}

pub struct FrameRing<B> {
    slots: Vec<FrameSlot<B>>,
    current: usize,
}

impl<B: Clone> FrameRing<B> {
    /// `frames_in_flight` slots (at least one), each with `staging_bytes` of staging.
    pub fn new(frames_in_flight: usize, staging_bytes: usize) -> Self {
        let n = frames_in_flight.max(1);
        Self {
            slots: (0..n).map(|_| FrameSlot::new(staging_bytes)).collect(),
            current: 0,
        }
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn current(&self) -> &FrameSlot<B> {
        &self.slots[self.current]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut FrameSlot<B> {
        &mut self.slots[self.current]
    }

    /// Queues `buffer` for destruction once the GPU can no longer be using it, i.e. when
    /// the current slot is re-entered.
    pub fn defer_destroy(&mut self, buffer: B) {
        self.slots[self.current].deferred.push(buffer);
    }

    /// Sends this frame's staged copies to `sink`. Returns how many were sent.
    pub fn submit_copies(&mut self, sink: &mut impl CommandSink<B>) -> usize {
        self.slots[self.current].submit(sink)
    }

    /// Moves to the next slot, destroying its deferred buffers and resetting its
    /// staging region. Returns how many buffers were destroyed.
    pub fn advance<D: GpuDevice<Buffer = B>>(&mut self, device: &mut D) -> usize {
        self.current = (self.current + 1) % self.slots.len();
        self.slots[self.current].recycle(device)
    }

    pub fn pending_destroys(&self) -> usize {
        self.slots.iter().map(|s| s.deferred.len()).sum()
    }

    /// Destroys every deferred buffer in every slot.
    pub fn destroy_all<D: GpuDevice<Buffer = B>>(&mut self, device: &mut D) -> usize {
        self.slots.iter_mut().map(|s| s.recycle(device)).sum()
    }
}
