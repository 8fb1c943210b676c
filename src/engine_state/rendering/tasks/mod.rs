//! Background tasks for the rendering system.
//!
//! These tasks run on the worker pool so the main thread only ever copies
//! section data in and applies finished results.
//!
//! # Available Tasks
//! - `SectionMeshTask`: Builds the solid and transparent geometry of one section

pub mod section_mesh_task;

pub use section_mesh_task::SectionMeshTask;
