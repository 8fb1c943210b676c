//! # Buffer State Module
//!
//! GPU buffer management for section meshes. Everything that creates or destroys
//! GPU resources goes through the [`GpuUploader`] trait, and is only ever called from
//! the main thread.
//!
//! ## Architecture
//!
//! [`BufferState`] is the `wgpu` implementation. It owns every mesh buffer, hands out
//! opaque [`BufferHandle`]s, and keeps per-buffer analytics so memory use can be
//! reported. Each upload creates a vertex and an index buffer sized to the mesh and
//! fills them through the queue.
//!
//! ## Performance Considerations
//!
//! * Buffer sizes are checked against the device limit before anything is allocated
//! * Out-of-memory is detected with an error scope instead of the device's
//!   uncaptured-error handler, so a failed upload does not take the device down

use std::collections::HashMap;

use log::{error, trace};
use thiserror::Error;
use wgpu::{Buffer, BufferUsages, Device, Queue};

use super::rendering::meshing::MeshData;

/// Opaque reference to a buffer owned by a [`GpuUploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// A mesh resident on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    /// Vertex buffer
    pub vertex_buffer: BufferHandle,
    /// Index buffer
    pub index_buffer: BufferHandle,
    /// Number of indices to draw
    pub index_count: u32,
}

/// Why an upload did not produce a resident mesh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// The device ran out of memory while allocating the buffers.
    #[error("out of GPU memory while uploading '{label}'")]
    OutOfMemory {
        /// Label of the failed upload
        label: String,
    },
    /// A buffer would exceed the device's maximum buffer size.
    #[error("'{label}' needs a {size} byte buffer but the device allows {limit}")]
    TooLarge {
        /// Label of the failed upload
        label: String,
        /// Requested size in bytes
        size: u64,
        /// Device limit in bytes
        limit: u64,
    },
}

/// Creates and destroys GPU-resident meshes.
pub trait GpuUploader {
    /// Uploads the vertex and index data of `mesh`.
    ///
    /// # Arguments
    /// * `label` - Debug label for the created buffers
    /// * `mesh` - Non-empty geometry to upload
    fn upload(&mut self, label: &str, mesh: &MeshData) -> Result<GpuMesh, UploadError>;

    /// Destroys a mesh created by [`GpuUploader::upload`].
    fn release(&mut self, mesh: GpuMesh);
}

/// Analytics data for a GPU buffer
#[derive(Debug)]
struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    pub allocated_memory: u64,
    /// Actual memory used in the buffer in bytes (based on writes)
    pub used_memory: u64,
}

/// `wgpu` implementation of [`GpuUploader`].
pub struct BufferState {
    /// The GPU device
    device: Device,
    /// The GPU command queue
    queue: Queue,
    /// Live buffers by handle
    buffers: HashMap<BufferHandle, Buffer>,
    /// Analytics data for each buffer
    buffer_analytics: HashMap<BufferHandle, BufferAnalytics>,
    next_handle: u64,
}

impl BufferState {
    /// Creates a new buffer state manager
    ///
    /// # Arguments
    ///
    /// * `device` - The GPU device
    /// * `queue` - The GPU command queue
    ///
    /// # Returns
    ///
    /// A new `BufferState` instance with empty buffer collections
    pub fn new(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::new(),
            buffer_analytics: HashMap::new(),
            next_handle: 0,
        }
    }

    fn create_buffer(
        &mut self,
        label: &str,
        usage: BufferUsages,
        data: &[u8],
    ) -> Result<BufferHandle, UploadError> {
        let size = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let limit = self.device.limits().max_buffer_size;
        if size > limit {
            return Err(UploadError::TooLarge {
                label: label.to_string(),
                size,
                limit,
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: usage | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            error!("Allocating '{}' failed: {}", label, err);
            buffer.destroy();
            return Err(UploadError::OutOfMemory {
                label: label.to_string(),
            });
        }

        self.queue.write_buffer(&buffer, 0, data);

        self.next_handle += 1;
        let handle = BufferHandle(self.next_handle);
        self.buffers.insert(handle, buffer);
        self.buffer_analytics.insert(
            handle,
            BufferAnalytics {
                allocated_memory: size,
                used_memory: data.len() as u64,
            },
        );
        Ok(handle)
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&handle) {
            buffer.destroy();
        }
        self.buffer_analytics.remove(&handle);
    }

    /// Resolves a handle from a [`GpuMesh`] to the buffer a draw call binds.
    ///
    /// # Returns
    ///
    /// The buffer, or `None` if it was released
    pub fn get_buffer(&self, handle: BufferHandle) -> Option<&Buffer> {
        self.buffers.get(&handle)
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Gets the total allocated memory across all buffers
    ///
    /// # Returns
    ///
    /// Total allocated memory in bytes
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .map(|analytics| analytics.allocated_memory)
            .sum()
    }

    /// Gets the total used memory across all buffers
    ///
    /// # Returns
    ///
    /// Total used memory in bytes
    pub fn get_total_used_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .map(|analytics| analytics.used_memory)
            .sum()
    }
}

impl GpuUploader for BufferState {
    fn upload(&mut self, label: &str, mesh: &MeshData) -> Result<GpuMesh, UploadError> {
        let vertex_buffer = self.create_buffer(
            &format!("{label} vertices"),
            BufferUsages::VERTEX,
            bytemuck::cast_slice(&mesh.vertices),
        )?;
        let index_buffer = match self.create_buffer(
            &format!("{label} indices"),
            BufferUsages::INDEX,
            bytemuck::cast_slice(&mesh.indices),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                self.destroy_buffer(vertex_buffer);
                return Err(err);
            }
        };

        trace!(
            "Uploaded '{}': {} vertices, {} indices",
            label,
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    fn release(&mut self, mesh: GpuMesh) {
        self.destroy_buffer(mesh.vertex_buffer);
        self.destroy_buffer(mesh.index_buffer);
    }
}
