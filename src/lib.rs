#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Streamer
//!
//! Streams an unbounded voxel world around a moving observer: decides which
//! chunks live in memory, rebuilds their geometry on worker threads when voxels
//! change, uploads finished geometry at a bounded rate, and selects what is
//! visible each frame.
//!
//! ## Key Modules
//!
//! * `engine_state` - The engine and all of its subsystems
//!
//! ## Architecture
//!
//! * Chunk graph with geometric admission and neighbor-aware dirty tracking
//! * Worker pool running a pure section mesher on owned snapshots
//! * Single-flight build pipeline with generation-based cancellation
//! * Rate-limited upload queue feeding a GPU boundary trait
//! * Frustum-based render set
//!
//! ## Usage
//!
//! The headless binary walks an observer across generated terrain:
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- config.json
//! ```

use std::sync::Arc;

use cgmath::{Deg, Point3, Rad};
use log::{debug, info, warn};
use web_time::{Duration, Instant};

pub mod engine_state;

pub use engine_state::{
    buffer_state::{BufferState, GpuUploader},
    camera_state::{
        camera::{Camera, Projection},
        CameraObserver, Observer,
    },
    config::EngineConfig,
    voxels::{
        block::{BlockMetadata, BlockRegistry},
        populator::{FlatPopulator, NoiseTerrainPopulator, TerrainPopulator},
    },
    EngineContext, EngineError, EngineState, EngineStats,
};

use engine_state::{rendering::RenderableSection, voxels::block::block_type::BlockType};

/// Seed of the terrain generated by [`run`].
const TERRAIN_SEED: u32 = 2024;
/// Ticks the observer walks for.
const WALK_TICKS: u32 = 1200;
/// Voxels the observer moves per tick.
const WALK_SPEED: f32 = 0.5;
/// Radians the observer turns per tick, so the walk curves through fresh terrain.
const WALK_TURN: f32 = 0.002;
/// Target tick length.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

async fn request_headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: wgpu::InstanceFlags::empty(),
        backend_options: wgpu::BackendOptions::from_env_or_default(),
    });

    let adapter = match instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
    {
        Ok(adapter) => adapter,
        Err(err) => {
            warn!("No GPU adapter available: {err}");
            return None;
        }
    };
    info!("Using adapter {:?}", adapter.get_info());

    match adapter
        .request_device(&wgpu::DeviceDescriptor {
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            label: Some("voxel streamer"),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
        })
        .await
    {
        Ok(device_and_queue) => Some(device_and_queue),
        Err(err) => {
            warn!("Failed to open GPU device: {err}");
            None
        }
    }
}

/// Topmost non-air block at or below `position`.
fn ground_below(engine: &EngineState<BufferState>, position: Point3<f32>) -> Option<BlockType> {
    let (x, z) = (position.x.floor() as i32, position.z.floor() as i32);
    (0..=position.y.floor() as i32)
        .rev()
        .map(|y| engine.get_block(x, y, z))
        .find(|id| *id != BlockType::AIR.id())
        .and_then(BlockType::from_id)
}

/// Bytes of vertex and index data bound by this frame's draw calls.
fn visible_bytes(buffers: &BufferState, sections: &[RenderableSection]) -> u64 {
    sections
        .iter()
        .flat_map(|section| [section.solid, section.transparent])
        .flatten()
        .flat_map(|mesh| [mesh.vertex_buffer, mesh.index_buffer])
        .filter_map(|handle| buffers.get_buffer(handle))
        .map(|buffer| buffer.size())
        .sum()
}

fn walk(mut engine: EngineState<BufferState>) {
    let mut observer = CameraObserver::new(
        Camera::new((0.0, 100.0, 0.0), Deg(0.0), Deg(-20.0)),
        Projection::new(1280, 720, Deg(45.0), 0.1, 1000.0),
    );
    let started = Instant::now();

    for tick in 0..WALK_TICKS {
        let tick_start = Instant::now();
        observer.camera.advance(WALK_SPEED);
        observer.camera.turn(Rad(WALK_TURN), Rad(0.0));
        engine.tick(&observer);

        if tick % 120 == 0 {
            let visible = engine.visible_sections(&observer);
            let buffers = engine.uploader();
            info!(
                "Tick {tick}: {:?}, {} sections visible ({} bytes), {} buffers using {} of {} allocated bytes",
                engine.stats(),
                visible.len(),
                visible_bytes(buffers, &visible),
                buffers.buffer_count(),
                buffers.get_total_used_memory(),
                buffers.get_total_allocated_memory()
            );
            debug!(
                "Observer at {:?} over {:?}",
                observer.position(),
                ground_below(&engine, observer.position())
            );
        }

        let elapsed = tick_start.elapsed();
        if elapsed < TICK_INTERVAL {
            std::thread::sleep(TICK_INTERVAL - elapsed);
        }
    }

    info!(
        "Walked {} ticks in {:.2?}: {:?}",
        WALK_TICKS,
        started.elapsed(),
        engine.stats()
    );
}

/// Runs the headless streaming demo.
///
/// Loads the configuration from the path given as the first argument (defaults
/// otherwise), generates noise terrain and walks an observer across it,
/// uploading meshes through a headless `wgpu` device.
///
/// # Returns
/// Configuration and startup errors; a missing GPU is logged and skipped.
pub fn run() -> Result<(), EngineError> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {path}");
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };

    let blocks = BlockRegistry::new(
        BlockType::ALL
            .into_iter()
            .map(|block_type| (block_type.id(), block_type.definition())),
    )?;
    let context = EngineContext::new(
        config,
        Arc::new(blocks),
        Arc::new(NoiseTerrainPopulator::new(TERRAIN_SEED)),
    )?;

    let Some((device, queue)) = pollster::block_on(request_headless_device()) else {
        warn!("Skipping the walk, nothing to upload to");
        return Ok(());
    };

    let engine = EngineState::new(context, BufferState::new(device, queue))?;
    walk(engine);
    Ok(())
}
