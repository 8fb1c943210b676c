mod face;
mod greedy;
mod mesh;

pub use face::Face;
pub use greedy::{greedy_faces, is_face_visible, GreedyFaces};
pub use mesh::MeshData;
