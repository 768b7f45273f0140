mod app;
mod camera;
mod config;

use std::error::Error;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use terra_geom::Vec3;
use terra_gpu::{HeadlessDevice, RecordingSink};
use terra_mesh::build_chunk_mesh;
use terra_world::{ChunkCoord, TerrainField};

use crate::app::TerrainWorld;
use crate::camera::{FrameInput, ScriptedViewer};
use crate::config::{StreamConfig, load_stream_config_from_path};

#[derive(Parser, Debug)]
#[command(name = "terra", version, about = "Streamed marching-cubes terrain")]
struct Cli {
    /// TOML configuration; defaults apply when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Override the field seed
    #[arg(long, global = true)]
    seed: Option<i32>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream terrain headlessly for a number of frames
    Run(RunArgs),
    /// Mesh chunks directly and print their vertex counts and bounds
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, default_value_t = 600)]
    frames: u32,
    /// Override the worker count (0 = one per core minus one)
    #[arg(long)]
    workers: Option<usize>,
    /// Viewer speed along +x in world units per second
    #[arg(long, default_value_t = 40.0)]
    speed: f32,
    /// Target frame time in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,
    /// Log statistics every N frames
    #[arg(long, default_value_t = 60)]
    report_every: u32,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Chunk coordinates as x,y,z
    #[arg(required = true, value_parser = parse_coord, allow_hyphen_values = true)]
    coords: Vec<ChunkCoord>,
}

fn parse_coord(s: &str) -> Result<ChunkCoord, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z, got '{}'", s));
    }
    let mut v = [0i32; 3];
    for (dst, p) in v.iter_mut().zip(&parts) {
        *dst = p.parse().map_err(|e| format!("bad coordinate '{}': {}", p, e))?;
    }
    Ok(ChunkCoord::new(v[0], v[1], v[2]))
}

fn load_config(cli: &Cli) -> Result<StreamConfig, Box<dyn Error>> {
    let mut cfg = match &cli.config {
        Some(path) => load_stream_config_from_path(path)?,
        None => StreamConfig::default(),
    };
    if let Some(seed) = cli.seed {
        cfg.field.seed = seed;
    }
    Ok(cfg)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let mut cfg = load_config(&cli)?;
    match cli.cmd {
        Command::Run(args) => {
            if let Some(w) = args.workers {
                cfg.stream.workers = w;
            }
            cfg.validate()?;
            run(&cfg, &args)
        }
        Command::Probe(args) => {
            cfg.field.validate()?;
            probe(&cfg, &args.coords);
            Ok(())
        }
    }
}

fn run(cfg: &StreamConfig, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let start = Vec3::splat(cfg.field.chunk_world_side() * 0.5);
    let mut viewer = ScriptedViewer::new(start, Vec3::new(args.speed, 0.0, 0.0));
    let mut world = TerrainWorld::new(cfg, HeadlessDevice::new(), &viewer)?;
    let mut sink = RecordingSink::default();
    let frame_time = Duration::from_millis(args.frame_ms);
    let dt = args.frame_ms as f32 / 1000.0;
    let t0 = Instant::now();

    for frame in 1..=args.frames {
        let frame_start = Instant::now();
        viewer.advance(dt);
        world.update(&viewer, FrameInput::default());
        sink.clear();
        world.draw(&mut sink, &viewer);

        if args.report_every > 0 && frame % args.report_every == 0 {
            let rt = world.runtime().stats();
            log::info!(
                target: "events",
                "frame {} at {}: {} chunks, {} drawn, {} verts, queue {}, in flight {}, generated {}, buffers {} (+{} pending), carry {}",
                frame,
                world.viewer_chunk(),
                world.registry().count(),
                world.debug_stats.draw_calls,
                world.debug_stats.total_vertices,
                world.runtime().queue_len(),
                rt.in_flight,
                rt.generated,
                world.device().live_buffers(),
                world.pending_destroys(),
                world.has_carry_over()
            );
        }
        if let Some(rest) = frame_time.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    let rt = world.runtime().stats();
    log::info!(
        target: "events",
        "{} frames in {:.2}s; stream {:?}; runtime {:?}",
        args.frames,
        t0.elapsed().as_secs_f32(),
        world.stats,
        rt
    );
    world.shutdown();
    if world.device().live_buffers() != 0 {
        log::warn!(target: "events", "{} buffers leaked", world.device().live_buffers());
    }
    Ok(())
}

fn probe(cfg: &StreamConfig, coords: &[ChunkCoord]) {
    let field = TerrainField::new(&cfg.field);
    let results: Vec<_> = coords
        .par_iter()
        .map(|c| (*c, build_chunk_mesh(&field, &cfg.field, *c)))
        .collect();
    for (c, mesh) in results {
        match mesh.bounds() {
            Some(b) => println!(
                "{} vertices={} bounds=({:.4}, {:.4}, {:.4})..({:.4}, {:.4}, {:.4})",
                c,
                mesh.vertex_count(),
                b.min.x,
                b.min.y,
                b.min.z,
                b.max.x,
                b.max.y,
                b.max.z
            ),
            None => println!("{} vertices=0", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinates() {
        assert_eq!(parse_coord("1,-2, 3"), Ok(ChunkCoord::new(1, -2, 3)));
        assert!(parse_coord("1,2").is_err());
        assert!(parse_coord("a,b,c").is_err());
    }

    #[test]
    fn cli_accepts_both_subcommands() {
        let cli = Cli::try_parse_from(["terra", "--seed", "7", "run", "--frames", "3"]).unwrap();
        assert_eq!(cli.seed, Some(7));
        assert!(matches!(cli.cmd, Command::Run(RunArgs { frames: 3, .. })));
        let cli = Cli::try_parse_from(["terra", "probe", "0,0,0", "-1,2,3"]).unwrap();
        match cli.cmd {
            Command::Probe(p) => assert_eq!(p.coords, vec![ChunkCoord::new(0, 0, 0), ChunkCoord::new(-1, 2, 3)]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
