//! Rendering side of the streaming engine.
//!
//! Everything between "a section is dirty" and "a section can be drawn":
//! building geometry on workers, accepting only the newest build per section,
//! uploading at a bounded rate, and selecting what the frustum can see. Draw
//! calls themselves belong to the caller.
//!
//! # Architecture
//! - `meshing`: pure section mesher
//! - `tasks`: worker-side build jobs
//! - `build_pipeline`: single-flight scheduling and stale-result rejection
//! - `upload_queue`: main-thread hand-off to the GPU
//! - `mesh_store`: per-chunk slots of resident meshes
//! - `visibility`: per-frame render set

pub mod build_pipeline;
pub mod mesh_store;
pub mod meshing;
pub mod tasks;
pub mod upload_queue;
pub mod vertex;
pub mod visibility;

// Re-export commonly used types
pub use build_pipeline::{BuildOutcome, BuildPipeline};
pub use mesh_store::MeshStore;
pub use upload_queue::{UploadQueue, UploadTick};
pub use vertex::Vertex;
pub use visibility::{render_set, RenderableSection};
