// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rendering lanes - one per draw primitive.
//!
//! Every lane here follows the same shape: `prepare` asks the packer for one
//! layout, uploads it, and `render` loops over its objects recording one draw
//! entry each. None of them has background work, so `step` keeps the default.

use bytemuck::Pod;
use std::collections::HashMap;
use std::sync::Arc;
use tricull_core::{
    packing::{IndexedBuffers, PerObjectAttributes},
    renderer::{
        api::{BufferDescriptor, BufferUsage, Mesh, OwnedBuffer, SceneObject, ViewUniforms},
        GraphicsDevice, ResourceError,
    },
    FrameContext,
};

mod direct_mesh_lane;
mod indexed_procedural_lane;
mod instanced_lane;
mod property_block_lane;
mod unpacked_procedural_lane;

pub use direct_mesh_lane::*;
pub use indexed_procedural_lane::*;
pub use instanced_lane::*;
pub use property_block_lane::*;
pub use unpacked_procedural_lane::*;

/// Uploads a slice of GPU records into a new buffer.
///
/// An empty slice still yields a small zeroed buffer so the handle can be bound.
pub(crate) fn upload_slice<T: Pod>(
    device: &Arc<dyn GraphicsDevice>,
    label: &str,
    usage: BufferUsage,
    data: &[T],
) -> Result<OwnedBuffer, ResourceError> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    if bytes.is_empty() {
        return OwnedBuffer::new(device, &BufferDescriptor::new(label, 16, usage));
    }
    OwnedBuffer::with_data(device, &BufferDescriptor::new(label, 0, usage), bytes)
}

/// Uploads one [`PerObjectAttributes`] record per object, in the given order.
pub(crate) fn upload_objects<'a>(
    device: &Arc<dyn GraphicsDevice>,
    objects: impl IntoIterator<Item = &'a SceneObject>,
) -> Result<OwnedBuffer, ResourceError> {
    let records: Vec<PerObjectAttributes> = objects.into_iter().map(Into::into).collect();
    upload_slice(
        device,
        "per_object_attributes",
        BufferUsage::STORAGE | BufferUsage::COPY_DST,
        &records,
    )
}

/// View uniforms of the main pass.
pub(crate) fn main_view(frame: &FrameContext<'_>) -> ViewUniforms {
    ViewUniforms::new(frame.camera.view_projection(), frame.root)
}

/// An indexed mesh resident on the device.
#[derive(Debug)]
pub struct GpuMesh {
    /// Vertex records, bound as a vertex buffer or as storage.
    pub vertices: OwnedBuffer,
    /// `u32` indices.
    pub indices: OwnedBuffer,
    /// Number of indices.
    pub index_count: u32,
}

impl GpuMesh {
    /// Uploads an indexed layout. Both buffers are also storage-readable so the
    /// procedural lanes can fetch from them.
    pub fn upload(
        device: &Arc<dyn GraphicsDevice>,
        packed: &IndexedBuffers,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            vertices: upload_slice(
                device,
                "mesh_vertices",
                BufferUsage::VERTEX | BufferUsage::STORAGE,
                &packed.attributes,
            )?,
            indices: upload_slice(
                device,
                "mesh_indices",
                BufferUsage::INDEX | BufferUsage::STORAGE,
                &packed.indices,
            )?,
            index_count: packed.index_count(),
        })
    }
}

/// Groups objects sharing the same mesh allocation, in first-seen order.
///
/// Returns `(mesh, object indices)` pairs.
pub(crate) fn group_by_mesh(objects: &[SceneObject]) -> Vec<(Arc<Mesh>, Vec<usize>)> {
    let mut slots: HashMap<*const Mesh, usize> = HashMap::new();
    let mut groups: Vec<(Arc<Mesh>, Vec<usize>)> = Vec::new();
    for (i, object) in objects.iter().enumerate() {
        let key = Arc::as_ptr(&object.mesh);
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push((Arc::clone(&object.mesh), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(i);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use tricull_core::math::{LinearRgba, Mat4, Vec3};

    #[test]
    fn grouping_is_by_allocation_not_content() {
        let a = Arc::new(Mesh::triangle(Vec3::ZERO, Vec3::X, Vec3::Y));
        let b = Arc::new(Mesh::triangle(Vec3::ZERO, Vec3::X, Vec3::Y));
        let objects = vec![
            SceneObject::new(Arc::clone(&a), Mat4::IDENTITY, LinearRgba::RED),
            SceneObject::new(b, Mat4::IDENTITY, LinearRgba::RED),
            SceneObject::new(a, Mat4::IDENTITY, LinearRgba::RED),
        ];
        let groups = group_by_mesh(&objects);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1, vec![0, 2]);
        assert_eq!(groups[1].1, vec![1]);
    }
}
