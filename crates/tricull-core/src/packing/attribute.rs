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

//! GPU record layouts shared by every draw path.

use crate::math::{LinearRgba, Mat4, Vec3};
use crate::renderer::api::scene::SceneObject;

/// One vertex (indexed layout) or one triangle corner (unpacked layout).
///
/// Matches the WGSL struct
/// `{ position: vec3<f32>, model_id: u32, normal: vec3<f32>, pad: u32 }`,
/// so the same buffer can be bound as a vertex buffer (stride 32, position at
/// offset 0, normal at offset 16) or as a read-only storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct TriangleAttribute {
    /// Object-space position.
    pub position: [f32; 3],
    /// Index of the source mesh in a batch; 0 outside batch packing.
    pub model_id: u32,
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Keeps the record 16-byte aligned.
    pub _pad: u32,
}

impl TriangleAttribute {
    /// Size of one record in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Builds a record from a position and a normal.
    pub fn new(position: Vec3, normal: Vec3, model_id: u32) -> Self {
        Self {
            position: position.to_array(),
            model_id,
            normal: normal.to_array(),
            _pad: 0,
        }
    }
}

/// Per-object record bound as storage and indexed by `model_id` or instance.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct PerObjectAttributes {
    /// Object-to-root transform, column-major.
    pub world: [[f32; 4]; 4],
    /// Linear RGBA colour.
    pub color: [f32; 4],
}

impl PerObjectAttributes {
    /// Size of one record in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Builds a record from a transform and a colour.
    pub fn new(world: Mat4, color: LinearRgba) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

impl From<&SceneObject> for PerObjectAttributes {
    fn from(object: &SceneObject) -> Self {
        Self::new(object.transform, object.base_color)
    }
}
