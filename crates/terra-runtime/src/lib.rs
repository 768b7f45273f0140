//! Background chunk generation: occupancy grid, worker threads and the result queue.
#![forbid(unsafe_code)]

pub mod grid;
mod service;

pub use grid::{CellState, RecenterGuard, Region, SharedGrid};
pub use service::{RuntimeStats, StatsSnapshot, TerrainService, WorkItem};

use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Worker threads to spawn. Zero spawns none; results can then be fed through
    /// [`Runtime::queue_sender`].
    pub workers: usize,
    pub queue_capacity: usize,
    pub idle_sleep: Duration,
    pub push_timeout: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            queue_capacity: 4096,
            idle_sleep: Duration::from_millis(16),
            push_timeout: Duration::from_millis(50),
        }
    }
}

/// One worker per core, leaving one for the main thread.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1)
}

pub struct Runtime {
    service: Arc<TerrainService>,
    res_tx: Sender<WorkItem>,
    res_rx: Receiver<WorkItem>,
    workers: Vec<JoinHandle<()>>,
}

impl Runtime {
    pub fn new(service: Arc<TerrainService>, opts: RuntimeOptions) -> io::Result<Self> {
        let (res_tx, res_rx) = bounded::<WorkItem>(opts.queue_capacity.max(1));
        let mut rt = Self {
            service,
            res_tx,
            res_rx,
            workers: Vec::with_capacity(opts.workers),
        };
        for w in 0..opts.workers {
            let service = rt.service.clone();
            let tx = rt.res_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("terra-gen-{w}"))
                .spawn(move || worker_loop(w, opts, &service, &tx));
            match spawned {
                Ok(h) => rt.workers.push(h),
                Err(e) => {
                    // Dropping rt stops and joins whatever already started
                    log::error!(target: "runtime", "failed to spawn worker {}: {}", w, e);
                    return Err(e);
                }
            }
        }
        log::info!(
            target: "runtime",
            "started {} workers, queue capacity {}",
            opts.workers,
            opts.queue_capacity
        );
        Ok(rt)
    }

    #[inline]
    pub fn service(&self) -> &Arc<TerrainService> {
        &self.service
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Next finished chunk, if any. Never blocks.
    #[inline]
    pub fn try_next(&self) -> Option<WorkItem> {
        self.res_rx.try_recv().ok()
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.res_rx.len()
    }

    pub fn queue_sender(&self) -> Sender<WorkItem> {
        self.res_tx.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.service.snapshot()
    }

    /// Stops and joins every worker. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.service.stop();
        let n = self.workers.len();
        for h in self.workers.drain(..) {
            if h.join().is_err() {
                log::error!(target: "runtime", "worker panicked");
            }
        }
        if n > 0 {
            log::info!(target: "runtime", "joined {} workers", n);
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(w: usize, opts: RuntimeOptions, service: &TerrainService, tx: &Sender<WorkItem>) {
    let stats = service.stats();
    while service.is_running() {
        let Some(coord) = service.grid().claim_nearest(w, opts.workers) else {
            stats.idle_polls.fetch_add(1, Ordering::Relaxed);
            thread::sleep(opts.idle_sleep);
            continue;
        };
        let item = service.generate_chunk(coord);
        log::trace!(
            target: "runtime",
            "worker {} built {} ({} verts, sample {}ms, mesh {}ms)",
            w,
            coord,
            item.mesh.vertex_count(),
            item.t_sample_ms,
            item.t_mesh_ms
        );
        if !push(item, opts.push_timeout, service, tx) {
            break;
        }
    }
}

/// Blocks until `item` is queued. Returns `false` if it had to be dropped because the
/// runtime is shutting down or the receiver is gone.
fn push(mut item: WorkItem, timeout: Duration, service: &TerrainService, tx: &Sender<WorkItem>) -> bool {
    let stats = service.stats();
    loop {
        match tx.send_timeout(item, timeout) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => {
                if !service.is_running() {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                stats.queue_retries.fetch_add(1, Ordering::Relaxed);
                item = back;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
    }
}
