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

//! Defines the source mesh handed to the packer.

use crate::math::Vec3;

/// An indexed triangle list with per-vertex normals.
///
/// Meshes are immutable inputs; the packer never edits them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,
    /// Vertex normals, one per position
    pub normals: Vec<Vec3>,
    /// Triangle corner indices, three per triangle
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Creates a mesh from its raw arrays. No validation happens here.
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            indices,
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of complete triangles described by the index list.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// A single triangle with a flat normal derived from its winding.
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let n = (b - a).cross(c - a).normalize();
        Self::new(vec![a, b, c], vec![n; 3], vec![0, 1, 2])
    }

    /// An axis-aligned cube centred on the origin, four vertices per face so
    /// normals stay flat.
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (-Vec3::X, Vec3::Y, -Vec3::Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (-Vec3::Y, Vec3::Z, -Vec3::X),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, Vec3::X, -Vec3::Y),
        ];

        let mut mesh = Self::default();
        for (normal, u, v) in faces {
            let base = mesh.positions.len() as u32;
            let centre = normal * h;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                mesh.positions.push(centre + u * (su * h) + v * (sv * h));
                mesh.normals.push(normal);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_normal_follows_counter_clockwise_winding() {
        let mesh = Mesh::triangle(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.normals[0], Vec3::Z);
    }

    #[test]
    fn cube_has_twelve_triangles_with_outward_normals() {
        let mesh = Mesh::cube(1.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.positions[i as usize]);
            let winding = (b - a).cross(c - a);
            assert!(
                winding.dot(mesh.normals[tri[0] as usize]) > 0.0,
                "cube faces must wind counter-clockwise around their normal"
            );
        }
    }
}
