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

//! The objects handed to a draw lane.

use super::mesh::Mesh;
use crate::math::{LinearRgba, Mat4};
use std::sync::Arc;

/// One drawable: a shared mesh, its world transform and its base colour.
///
/// Several objects may share the same [`Mesh`]; lanes that batch by mesh
/// compare the `Arc` pointers.
#[derive(Debug, Clone)]
pub struct SceneObject {
    /// The source geometry.
    pub mesh: Arc<Mesh>,
    /// Object-to-root transform.
    pub transform: Mat4,
    /// Flat colour used by every strategy.
    pub base_color: LinearRgba,
}

impl SceneObject {
    /// Creates a new scene object.
    pub fn new(mesh: Arc<Mesh>, transform: Mat4, base_color: LinearRgba) -> Self {
        Self {
            mesh,
            transform,
            base_color,
        }
    }
}
