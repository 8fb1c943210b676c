//! # Voxel World
//!
//! Voxel data and the rules that keep it consistent around a moving observer.
//!
//! ## Architecture
//!
//! * **Block**: block ids, per-block metadata and the block registry
//! * **Chunk**: one full-height column of voxels with its dirty flags and neighbor links
//! * **Populator**: fills a freshly admitted chunk with terrain
//! * **World**: the chunk graph; admits, evicts and edits chunks and publishes the
//!   resulting events
//!
//! ## Data Flow
//!
//! 1. The engine hands the observer's chunk coordinate to `World::sync`
//! 2. New chunks are populated and linked to their neighbors
//! 3. Population and edits mark sections dirty and publish events
//! 4. The engine collects dirty sections and schedules mesh builds from snapshots

pub mod block;
pub mod chunk;
pub mod populator;
pub mod world;
