//! Selection of the sections to draw this frame.
//!
//! [`render_set`] is pure: it reads the mesh store and a frustum and returns one
//! [`RenderableSection`] per drawable section of every chunk whose bounds
//! intersect the frustum. Nothing is cached between frames.

use cgmath::Point3;

use crate::engine_state::{
    buffer_state::GpuMesh,
    camera_state::frustum::Frustum,
    voxels::chunk::{ChunkDimensions, SectionKey},
};

use super::mesh_store::MeshStore;

/// Everything the renderer needs to draw one section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderableSection {
    /// The section
    pub key: SectionKey,
    /// World-space origin `(x·W, s·S, z·W)` added to section-local vertices
    pub world_origin: Point3<i32>,
    /// Opaque geometry, drawn first
    pub solid: Option<GpuMesh>,
    /// Transparent geometry, drawn after all opaque geometry
    pub transparent: Option<GpuMesh>,
}

/// Collects the drawable sections of every chunk inside the frustum.
///
/// # Arguments
/// * `store` - Resident meshes of all loaded chunks
/// * `frustum` - This frame's clip planes
/// * `observer_y` - Observer height, used for chunks with no known extent
/// * `dimensions` - Chunk size
///
/// # Returns
/// The sections sorted by key, so output is stable across frames.
pub fn render_set(
    store: &MeshStore,
    frustum: &Frustum,
    observer_y: f32,
    dimensions: &ChunkDimensions,
) -> Vec<RenderableSection> {
    let width = dimensions.width() as i32;
    let section_height = dimensions.section_height() as i32;

    let mut sections: Vec<RenderableSection> = store
        .bundles()
        .filter(|(position, bundle)| {
            frustum.is_chunk_inside(*position, bundle.occupied_range(), observer_y, dimensions)
        })
        .flat_map(|(position, bundle)| {
            bundle
                .sections()
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_drawable())
                .map(move |(section, slot)| RenderableSection {
                    key: SectionKey::new(position, section as u32),
                    world_origin: Point3::new(
                        position.x * width,
                        section as i32 * section_height,
                        position.z * width,
                    ),
                    solid: slot.solid.drawable(),
                    transparent: slot.transparent.drawable(),
                })
        })
        .collect();
    sections.sort_unstable_by_key(|section| section.key);
    sections
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;
    use crate::engine_state::{
        buffer_state::{recording::RecordingUploader, GpuUploader},
        camera_state::{
            camera::{Camera, Projection},
            CameraObserver, Observer,
        },
        rendering::meshing::{mesh::Face, MeshData},
        voxels::{block::block_side::BlockSide, chunk::ChunkPosition},
    };

    #[test]
    fn only_resident_sections_in_view_are_returned() {
        let dimensions = ChunkDimensions::new(16, 64, 16).unwrap();
        let mut uploader = RecordingUploader::default();
        let mut store = MeshStore::new();
        let mut quad = MeshData::new();
        quad.push_face(&Face::new(0, 0, 0, 1, BlockSide::TOP), 0);

        for x in [-3, 1] {
            let position = ChunkPosition::new(x, 0);
            store.insert_chunk(position, 4);
            let mesh = uploader.upload("quad", &quad).unwrap();
            store.install(SectionKey::new(position, 2), Some(mesh), None, &mut uploader);
        }
        store.insert_chunk(ChunkPosition::new(2, 0), 4);

        let observer = CameraObserver::new(
            Camera::new((0.0, 40.0, 8.0), Deg(0.0), Deg(0.0)),
            Projection::new(100, 100, Deg(90.0), 0.1, 500.0),
        );
        let frustum = Frustum::from_view_projection(observer.view_projection());
        let visible = render_set(&store, &frustum, observer.position().y, &dimensions);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].key, SectionKey::new(ChunkPosition::new(1, 0), 2));
        assert_eq!(visible[0].world_origin, Point3::new(16, 32, 0));
        assert!(visible[0].solid.is_some());
        assert!(visible[0].transparent.is_none());
    }
}
