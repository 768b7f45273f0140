use std::thread;
use std::time::{Duration, Instant};

use terra_geom::Vec3;
use terra_gpu::{HeadlessBuffer, HeadlessDevice, RecordingSink};
use terra_mesh::ChunkMesh;
use terra_runtime::{RuntimeOptions, WorkItem};
use terra_world::{ChunkCoord, FieldConfig};

use super::TerrainWorld;
use crate::camera::{FrameInput, ScriptedViewer};
use crate::config::{GpuParams, StreamConfig, StreamParams};

const SIDE: f32 = 4.0;

fn test_config(staging_bytes: usize, registry_capacity: usize) -> StreamConfig {
    StreamConfig {
        field: FieldConfig {
            chunk_side: 4,
            frequency: 0.05,
            octaves: 2,
            ..FieldConfig::default()
        },
        stream: StreamParams {
            region_side: 3,
            ..StreamParams::default()
        },
        gpu: GpuParams {
            frames_in_flight: 3,
            staging_bytes,
            registry_capacity,
            culling: false,
        },
    }
}

fn manual() -> RuntimeOptions {
    RuntimeOptions {
        workers: 0,
        ..RuntimeOptions::default()
    }
}

/// Viewer standing inside chunk `c`.
fn viewer_in(c: ChunkCoord) -> ScriptedViewer {
    ScriptedViewer::stationary(c.world_origin(SIDE) + Vec3::splat(0.5))
}

fn world(cfg: &StreamConfig) -> TerrainWorld<HeadlessDevice> {
    TerrainWorld::with_options(cfg, manual(), HeadlessDevice::new(), &viewer_in(ChunkCoord::splat(0)))
        .unwrap()
}

/// Mesh with `n` triangles (216 bytes per three).
fn mesh(n: usize) -> ChunkMesh {
    let mut m = ChunkMesh::default();
    for i in 0..n {
        let o = Vec3::splat(i as f32 * 0.1);
        m.push_triangle([o, o + Vec3::new(1.0, 0.0, 0.0), o + Vec3::UP], Vec3::new(0.0, 0.0, 1.0));
    }
    m
}

fn inject(w: &TerrainWorld<HeadlessDevice>, coord: ChunkCoord, mesh: ChunkMesh) {
    w.runtime()
        .queue_sender()
        .send(WorkItem {
            coord,
            mesh,
            t_sample_ms: 0,
            t_mesh_ms: 0,
        })
        .unwrap();
}

fn frame(w: &mut TerrainWorld<HeadlessDevice>, v: &ScriptedViewer) -> RecordingSink<HeadlessBuffer> {
    w.update(v, FrameInput::default());
    let mut sink: RecordingSink<HeadlessBuffer> = RecordingSink::default();
    w.draw(&mut sink, v);
    sink
}

#[test]
fn staging_overflow_carries_items_to_the_next_frame() {
    // Each one-triangle mesh stages 72 bytes; two fit in 200
    let cfg = test_config(200, 27);
    let mut w = world(&cfg);
    let v = viewer_in(ChunkCoord::splat(0));
    for x in -1..=1 {
        inject(&w, ChunkCoord::new(x, 0, 0), mesh(1));
    }

    w.update(&v, FrameInput::default());
    assert_eq!(w.registry().count(), 2);
    assert!(w.has_carry_over());
    assert_eq!(w.stats.staging_stalls, 1);
    let mut sink: RecordingSink<HeadlessBuffer> = RecordingSink::default();
    w.draw(&mut sink, &v);
    assert_eq!(sink.copies.len(), 4);
    assert_eq!(sink.draws.len(), 2);

    let sink = frame(&mut w, &v);
    assert!(!w.has_carry_over());
    assert_eq!(w.registry().count(), 3);
    assert_eq!(sink.copies.len(), 2);
    assert_eq!(sink.draws.len(), 3);
    assert_eq!(w.device().live_buffers(), 6);
    assert_eq!(w.stats.uploaded, 3);
}

#[test]
fn staged_bytes_match_the_mesh() {
    let cfg = test_config(1024, 27);
    let mut w = world(&cfg);
    let v = viewer_in(ChunkCoord::splat(0));
    let m = mesh(2);
    inject(&w, ChunkCoord::splat(0), m.clone());
    let sink = frame(&mut w, &v);
    assert_eq!(sink.copies.len(), 2);
    assert_eq!(sink.copies[0].data, m.position_bytes());
    assert_eq!(sink.copies[1].data, m.normal_bytes());
    assert_eq!(sink.draws[0].vertex_count, 6);
    assert_eq!(sink.draws[0].vertices, sink.copies[0].dst);
    assert_eq!(sink.draws[0].normals, sink.copies[1].dst);
}

#[test]
fn evicted_buffers_outlive_frames_in_flight_draws() {
    let cfg = test_config(1024, 27);
    let mut w = world(&cfg);
    let home = viewer_in(ChunkCoord::splat(0));
    inject(&w, ChunkCoord::new(1, 0, 0), mesh(1));
    frame(&mut w, &home);
    assert_eq!(w.device().live_buffers(), 2);

    // Region becomes -3..=-1 on x, so (1, 0, 0) leaves it
    let away = viewer_in(ChunkCoord::new(-2, 0, 0));
    w.update(&away, FrameInput::default());
    assert_eq!(w.registry().count(), 0);
    assert_eq!(w.stats.evicted, 1);
    assert_eq!(w.pending_destroys(), 2);

    let mut sink: RecordingSink<HeadlessBuffer> = RecordingSink::default();
    for _ in 0..2 {
        w.draw(&mut sink, &away);
        assert_eq!(w.device().live_buffers(), 2);
    }
    w.draw(&mut sink, &away);
    assert_eq!(w.device().live_buffers(), 0);
    assert_eq!(w.pending_destroys(), 0);
    assert_eq!(w.device().invalid_destroys(), 0);
    assert!(sink.draws.is_empty());
}

#[test]
fn empty_meshes_occupy_a_slot_without_gpu_memory() {
    let cfg = test_config(1024, 27);
    let mut w = world(&cfg);
    let v = viewer_in(ChunkCoord::splat(0));
    inject(&w, ChunkCoord::new(0, 1, 0), ChunkMesh::default());
    let sink = frame(&mut w, &v);
    assert_eq!(w.registry().count(), 1);
    assert_eq!(w.stats.empty, 1);
    assert_eq!(w.device().created(), 0);
    assert!(sink.copies.is_empty());
    assert!(sink.draws.is_empty());
}

#[test]
fn stale_results_are_never_uploaded() {
    let cfg = test_config(1024, 27);
    let mut w = world(&cfg);
    let v = viewer_in(ChunkCoord::splat(0));
    inject(&w, ChunkCoord::new(5, 0, 0), mesh(3));
    frame(&mut w, &v);
    assert_eq!(w.registry().count(), 0);
    assert_eq!(w.stats.stale, 1);
    assert_eq!(w.device().created(), 0);
}

#[test]
fn results_left_behind_by_this_frames_move_are_never_uploaded() {
    let cfg = test_config(1024, 27);
    let mut w = world(&cfg);
    inject(&w, ChunkCoord::new(1, 0, 0), mesh(1));
    inject(&w, ChunkCoord::new(-1, 0, 0), mesh(1));

    // (1,0,0) is inside the old region but not the one around (-2,0,0)
    let v = viewer_in(ChunkCoord::new(-2, 0, 0));
    let sink = frame(&mut w, &v);
    assert_eq!(w.stats.stale, 1);
    assert_eq!(w.stats.uploaded, 1);
    assert_eq!(w.stats.evicted, 0);
    assert_eq!(w.device().created(), 2);
    assert_eq!(w.pending_destroys(), 0);
    assert_eq!(sink.copies.len(), 2);
    assert_eq!(w.registry().count(), 1);
    assert_eq!(w.registry().positions(), &[ChunkCoord::new(-1, 0, 0)][..]);

    let grid = w.runtime().service().grid();
    assert!(!grid.is_in_flight(ChunkCoord::new(1, 0, 0)));
    assert_eq!(grid.region().center(), ChunkCoord::new(-2, 0, 0));
    assert_eq!(
        grid.cell_state(ChunkCoord::new(-1, 0, 0)),
        Some(terra_runtime::CellState::Generated)
    );
}

#[test]
fn oversized_mesh_is_registered_empty() {
    // Three triangles stage 216 bytes
    let cfg = test_config(200, 27);
    let mut w = world(&cfg);
    let v = viewer_in(ChunkCoord::splat(0));
    inject(&w, ChunkCoord::splat(0), mesh(3));
    inject(&w, ChunkCoord::new(1, 0, 0), mesh(1));
    frame(&mut w, &v);
    assert_eq!(w.stats.oversized, 1);
    assert_eq!(w.stats.uploaded, 1);
    assert_eq!(w.registry().count(), 2);
    assert!(!w.has_carry_over());
    assert_eq!(w.device().live_buffers(), 2);
}

#[test]
fn full_registry_retries_after_eviction() {
    let cfg = test_config(1024, 1);
    let mut w = world(&cfg);
    let home = viewer_in(ChunkCoord::splat(0));
    inject(&w, ChunkCoord::new(1, 0, 0), mesh(1));
    inject(&w, ChunkCoord::new(-1, 0, 0), mesh(1));
    frame(&mut w, &home);
    assert_eq!(w.registry().count(), 1);
    assert!(w.has_carry_over());
    assert_eq!(w.stats.registry_full, 1);
    // Buffers made for the refused chunk are gone right away
    assert_eq!(w.device().live_buffers(), 2);
    assert_eq!(w.device().created(), 4);

    // Region -2..=0 keeps (-1, 0, 0) and evicts (1, 0, 0)
    let left = viewer_in(ChunkCoord::new(-1, 0, 0));
    frame(&mut w, &left);
    assert_eq!(w.stats.evicted, 1);
    assert!(w.has_carry_over());
    frame(&mut w, &left);
    assert!(!w.has_carry_over());
    assert_eq!(w.registry().positions(), &[ChunkCoord::new(-1, 0, 0)]);
}

#[test]
fn allocation_failure_releases_and_retries() {
    let cfg = test_config(1024, 27);
    let mut w = world(&cfg);
    let v = viewer_in(ChunkCoord::splat(0));
    w.device.set_allocation_budget(Some(1));
    inject(&w, ChunkCoord::splat(0), mesh(1));
    w.update(&v, FrameInput::default());
    assert!(w.has_carry_over());
    assert_eq!(w.stats.alloc_failures, 1);
    assert_eq!(w.device().live_buffers(), 0);
    assert_eq!(w.ring.current().used(), 0);

    w.device.set_allocation_budget(None);
    w.update(&v, FrameInput::default());
    assert!(!w.has_carry_over());
    assert_eq!(w.registry().count(), 1);
    assert_eq!(w.device().live_buffers(), 2);
}

#[test]
fn culling_skips_chunks_behind_the_viewer_and_can_freeze() {
    let mut cfg = test_config(1024, 27);
    cfg.gpu.culling = true;
    let mut w = world(&cfg);
    let mut v = viewer_in(ChunkCoord::splat(0));
    v.camera.yaw = 0.0;
    v.camera.pitch = 0.0;
    inject(&w, ChunkCoord::new(1, 0, 0), mesh(1));
    inject(&w, ChunkCoord::new(-1, 0, 0), mesh(1));
    w.update(&v, FrameInput::default());
    let mut sink: RecordingSink<HeadlessBuffer> = RecordingSink::default();
    w.draw(&mut sink, &v);
    assert_eq!(w.debug_stats.draw_calls, 1);
    assert_eq!(w.debug_stats.chunks_culled, 1);

    // Freeze facing +x, then turn around: the frozen frustum still decides
    w.update(&v, FrameInput { toggle_freeze_culling: true });
    assert!(w.culling.is_frozen());
    v.camera.yaw = 180.0;
    sink.clear();
    w.draw(&mut sink, &v);
    assert_eq!(sink.draws.len(), 1);
    let ahead = w
        .registry()
        .positions()
        .iter()
        .position(|c| *c == ChunkCoord::new(1, 0, 0))
        .unwrap();
    let buffers = w.registry().visuals()[ahead].buffers.as_ref().unwrap();
    assert_eq!(sink.draws[0].vertices, buffers.positions);

    w.update(&v, FrameInput { toggle_freeze_culling: true });
    assert!(!w.culling.is_frozen());
}

#[test]
fn shutdown_releases_every_buffer() {
    let cfg = test_config(1024, 27);
    let mut w = world(&cfg);
    let v = viewer_in(ChunkCoord::splat(0));
    for x in -1..=1 {
        inject(&w, ChunkCoord::new(x, 1, 0), mesh(2));
    }
    frame(&mut w, &v);
    w.update(&viewer_in(ChunkCoord::new(0, -2, 0)), FrameInput::default());
    assert!(w.pending_destroys() > 0);
    w.shutdown();
    assert_eq!(w.device().live_buffers(), 0);
    assert_eq!(w.device().created(), 6);
    assert_eq!(w.device().destroyed(), 6);
    assert_eq!(w.device().invalid_destroys(), 0);
    assert_eq!(w.registry().count(), 0);
}

fn settle(w: &mut TerrainWorld<HeadlessDevice>, v: &ScriptedViewer) {
    let start = Instant::now();
    loop {
        frame(w, v);
        let s = w.runtime().stats();
        if w.registry().count() == 27 && s.in_flight == 0 && !w.has_carry_over() {
            return;
        }
        assert!(start.elapsed() < Duration::from_secs(20), "region never filled");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn moving_away_and_back_restores_the_region() {
    let cfg = test_config(256 * 1024, 64);
    let opts = RuntimeOptions {
        workers: 2,
        idle_sleep: Duration::from_millis(1),
        push_timeout: Duration::from_millis(5),
        ..RuntimeOptions::default()
    };
    let home = viewer_in(ChunkCoord::splat(0));
    let mut w = TerrainWorld::with_options(&cfg, opts, HeadlessDevice::new(), &home).unwrap();
    settle(&mut w, &home);
    let mut before: Vec<_> = w.registry().positions().to_vec();
    before.sort();
    let drawable = w.registry().visuals().iter().filter(|v| v.is_drawable()).count();

    let next = viewer_in(ChunkCoord::new(1, 0, 0));
    settle(&mut w, &next);
    assert_eq!(w.stats.evicted, 9);
    settle(&mut w, &home);
    assert_eq!(w.stats.evicted, 18);

    let mut after: Vec<_> = w.registry().positions().to_vec();
    after.sort();
    assert_eq!(before, after);
    assert_eq!(w.registry().count(), 27);

    // Let every deferred destroy come due
    for _ in 0..cfg.gpu.frames_in_flight {
        frame(&mut w, &home);
    }
    assert_eq!(w.pending_destroys(), 0);
    assert_eq!(w.device().live_buffers(), 2 * drawable);
    assert_eq!(w.device().invalid_destroys(), 0);

    w.shutdown();
    assert_eq!(w.device().live_buffers(), 0);
}
