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

//! Recorded GPU work: command buffer handles, pass descriptors and draw primitives.
//!
//! Commands are semantic rather than API-level. A backend translates each one
//! into its own pipelines and bindings; the software device executes them on
//! the CPU.

use super::buffer::BufferId;
use super::texture::TextureId;
use crate::math::{Extent2D, LinearRgba, Mat4};

/// An opaque handle to a command buffer that has been recorded and is ready for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// Monotonic index of a queue submission, used to query completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionIndex(pub u64);

/// A colour target with its optional depth attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Colour (or ID) attachment.
    pub color: TextureId,
    /// Depth attachment, tested with `Less`.
    pub depth: Option<TextureId>,
    /// Size of both attachments.
    pub extent: Extent2D,
}

/// Per-pass camera data, laid out for a WGSL uniform block.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ViewUniforms {
    /// Projection multiplied by view.
    pub view_proj: [[f32; 4]; 4],
    /// Transform of the root object every drawn object is parented to.
    pub root: [[f32; 4]; 4],
}

impl ViewUniforms {
    /// Builds the uniform block from a view-projection matrix and a root transform.
    pub fn new(view_proj: Mat4, root: Mat4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            root: root.to_cols_array_2d(),
        }
    }

    /// The combined `view_proj * root` matrix.
    pub fn clip_from_root(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_proj) * Mat4::from_cols_array_2d(&self.root)
    }
}

/// Renders an unpacked attribute buffer into an `R32Uint` target.
///
/// The target is cleared to 0 and depth to 1.0; every covered pixel receives
/// `triangle_id + 1` of the nearest triangle, where `triangle_id = vertex_index / 3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdPassDescriptor {
    /// ID target (`R32Uint`) and its depth attachment.
    pub target: RenderTarget,
    /// Unpacked attribute buffer, one record per triangle corner.
    pub attributes: BufferId,
    /// Per-object records, indexed by each corner's `model_id`.
    pub objects: BufferId,
    /// Number of corners to draw (`3 * triangle_count`).
    pub vertex_count: u32,
    /// Camera used for this pass, usually with an inflated field of view.
    pub view: ViewUniforms,
}

/// Counts ID pixels per triangle: `histogram[v - 1] += 1` for every pixel `v != 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramPassDescriptor {
    /// The `R32Uint` ID texture to scan.
    pub ids: TextureId,
    /// Size of the ID texture.
    pub extent: Extent2D,
    /// Destination counters, one `u32` per triangle.
    pub histogram: BufferId,
    /// Number of counters in `histogram`. Values beyond it are ignored.
    pub triangle_count: u32,
}

/// How a procedural draw picks the per-object record for a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSource {
    /// Every vertex of the draw uses the record at this index.
    Instance(u32),
    /// Each vertex uses the record named by its attribute's `model_id`.
    ModelId,
}

/// A single draw primitive. Attribute buffers hold 32-byte `TriangleAttribute` records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    /// Classic indexed mesh draw with an inline transform and colour.
    Mesh {
        /// Per-vertex attribute buffer.
        vertex_buffer: BufferId,
        /// `u32` index buffer.
        index_buffer: BufferId,
        /// Number of indices to draw.
        index_count: u32,
        /// Object-to-root transform.
        transform: Mat4,
        /// Colour of the draw.
        color: LinearRgba,
    },
    /// Indexed mesh drawn once per instance; instance `i` uses `objects[first_instance + i]`.
    MeshInstanced {
        /// Per-vertex attribute buffer.
        vertex_buffer: BufferId,
        /// `u32` index buffer.
        index_buffer: BufferId,
        /// Number of indices per instance.
        index_count: u32,
        /// Per-object records.
        objects: BufferId,
        /// First record used.
        first_instance: u32,
        /// Number of instances.
        instance_count: u32,
    },
    /// Non-indexed draw that fetches `attributes[indices[vertex_index]]` in the vertex stage.
    IndexedProcedural {
        /// `u32` index buffer, read as storage.
        indices: BufferId,
        /// Attribute buffer, read as storage.
        attributes: BufferId,
        /// Number of vertices to draw.
        index_count: u32,
        /// Per-object records.
        objects: BufferId,
        /// Record used by every vertex.
        object_index: u32,
    },
    /// Non-indexed draw that fetches `attributes[vertex_index]`.
    UnpackedProcedural {
        /// Unpacked attribute buffer, read as storage.
        attributes: BufferId,
        /// Number of vertices to draw.
        vertex_count: u32,
        /// Per-object records.
        objects: BufferId,
        /// How each vertex picks its object record.
        object_source: ObjectSource,
    },
    /// Draws `3 * triangle_count` vertices; vertex `v` is corner `v % 3` of
    /// triangle `visible_ids[v / 3]` in the unpacked attribute buffer.
    VisibleProcedural {
        /// Unpacked attribute buffer, read as storage.
        attributes: BufferId,
        /// Compacted list of visible triangle IDs.
        visible_ids: BufferId,
        /// Number of valid entries in `visible_ids`.
        triangle_count: u32,
        /// Per-object records, indexed by `model_id`.
        objects: BufferId,
    },
}

impl DrawCommand {
    /// Number of triangles this command rasterizes.
    pub fn triangle_count(&self) -> u64 {
        match *self {
            DrawCommand::Mesh { index_count, .. } => u64::from(index_count / 3),
            DrawCommand::MeshInstanced {
                index_count,
                instance_count,
                ..
            } => u64::from(index_count / 3) * u64::from(instance_count),
            DrawCommand::IndexedProcedural { index_count, .. } => u64::from(index_count / 3),
            DrawCommand::UnpackedProcedural { vertex_count, .. } => u64::from(vertex_count / 3),
            DrawCommand::VisibleProcedural { triangle_count, .. } => u64::from(triangle_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn clip_from_root_composes_view_proj_then_root() {
        let root = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let view_proj = Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        let uniforms = ViewUniforms::new(view_proj, root);
        let p = uniforms.clip_from_root().transform_point(Vec3::ZERO);
        assert_eq!(p.y, 2.0);
    }

    #[test]
    fn instanced_triangle_count_multiplies_instances() {
        let cmd = DrawCommand::MeshInstanced {
            vertex_buffer: BufferId(0),
            index_buffer: BufferId(1),
            index_count: 36,
            objects: BufferId(2),
            first_instance: 0,
            instance_count: 4,
        };
        assert_eq!(cmd.triangle_count(), 48);
    }
}
