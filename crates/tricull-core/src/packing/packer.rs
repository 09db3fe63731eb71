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

//! Flattens meshes into shader-addressable buffers.
//!
//! Two layouts are produced. The *indexed* layout keeps vertex sharing: one
//! [`TriangleAttribute`] per vertex plus an index list. The *unpacked* layout
//! duplicates attributes per triangle corner so that corner `c` belongs to
//! triangle `c / 3`, which is what the triangle-ID pass relies on.

use super::attribute::TriangleAttribute;
use super::error::GeometryError;
use crate::renderer::api::scene::Mesh;
use std::ops::Range;

/// Indexed layout of a single mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedBuffers {
    /// Triangle corner indices into `attributes`, in the mesh's native winding.
    pub indices: Vec<u32>,
    /// One record per mesh vertex.
    pub attributes: Vec<TriangleAttribute>,
}

impl IndexedBuffers {
    /// Number of indices, i.e. vertices a draw of this layout emits.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Start corner of every mesh in an unpacked batch.
///
/// `offsets[0] == 0`, offsets never decrease, and
/// `offsets[i + 1] - offsets[i] == 3 * triangle_count(mesh_i)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<u32>,
    total_corners: u32,
}

impl OffsetTable {
    /// The per-mesh start corners.
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Number of meshes in the batch.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the table describes no mesh at all.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Total number of corners across the batch.
    pub fn total_corners(&self) -> u32 {
        self.total_corners
    }

    /// Corner range owned by mesh `mesh`, or `None` past the end of the batch.
    pub fn corner_range(&self, mesh: usize) -> Option<Range<u32>> {
        let start = *self.offsets.get(mesh)?;
        let end = self
            .offsets
            .get(mesh + 1)
            .copied()
            .unwrap_or(self.total_corners);
        Some(start..end)
    }

    /// Triangle range owned by mesh `mesh`.
    pub fn triangle_range(&self, mesh: usize) -> Option<Range<u32>> {
        self.corner_range(mesh)
            .map(|corners| corners.start / 3..corners.end / 3)
    }
}

/// Unpacked layout of several meshes concatenated in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnpackedBatch {
    /// One record per triangle corner; `model_id` is the source mesh index.
    pub attributes: Vec<TriangleAttribute>,
    /// Where each mesh starts in `attributes`.
    pub offsets: OffsetTable,
}

impl UnpackedBatch {
    /// Total number of triangles in the batch.
    pub fn triangle_count(&self) -> u32 {
        self.offsets.total_corners() / 3
    }
}

/// Checks the structural invariants every packer relies on.
pub fn validate_mesh(mesh: &Mesh) -> Result<(), GeometryError> {
    if mesh.positions.is_empty() {
        return Err(GeometryError::NoVertices);
    }
    if mesh.positions.len() != mesh.normals.len() {
        return Err(GeometryError::AttributeCountMismatch {
            positions: mesh.positions.len(),
            normals: mesh.normals.len(),
        });
    }
    if mesh.indices.len() % 3 != 0 {
        return Err(GeometryError::IndexCountNotTriangles {
            count: mesh.indices.len(),
        });
    }
    let vertex_count = mesh.positions.len();
    if let Some((position, &index)) = mesh
        .indices
        .iter()
        .enumerate()
        .find(|&(_, &i)| i as usize >= vertex_count)
    {
        return Err(GeometryError::IndexOutOfRange {
            position,
            index,
            vertex_count,
        });
    }
    Ok(())
}

/// Indexed layout: one attribute per vertex, indices copied verbatim.
///
/// A mesh with vertices but no triangles packs to an empty index list.
pub fn pack_indexed(mesh: &Mesh) -> Result<IndexedBuffers, GeometryError> {
    validate_mesh(mesh)?;

    let attributes = mesh
        .positions
        .iter()
        .zip(&mesh.normals)
        .map(|(&p, &n)| TriangleAttribute::new(p, n, 0))
        .collect();

    Ok(IndexedBuffers {
        indices: mesh.indices.clone(),
        attributes,
    })
}

/// Unpacked layout: `entry[t * 3 + k]` is corner `k` of triangle `t`.
pub fn pack_unpacked_single(mesh: &Mesh) -> Result<Vec<TriangleAttribute>, GeometryError> {
    let mut out = Vec::with_capacity(mesh.indices.len());
    append_unpacked(mesh, 0, &mut out)?;
    Ok(out)
}

/// Unpacked layout of several meshes with per-mesh offsets and `model_id` tags.
pub fn pack_unpacked_batch(meshes: &[&Mesh]) -> Result<UnpackedBatch, GeometryError> {
    if meshes.is_empty() {
        return Err(GeometryError::EmptyBatch);
    }

    let total: usize = meshes.iter().map(|m| m.indices.len()).sum();
    let mut attributes = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(meshes.len());

    for (index, mesh) in meshes.iter().enumerate() {
        offsets.push(attributes.len() as u32);
        append_unpacked(mesh, index as u32, &mut attributes).map_err(|source| {
            GeometryError::InBatch {
                index,
                source: Box::new(source),
            }
        })?;
    }

    log::debug!(
        "Packed batch of {} meshes into {} corners",
        meshes.len(),
        attributes.len()
    );

    let total_corners = attributes.len() as u32;
    Ok(UnpackedBatch {
        attributes,
        offsets: OffsetTable {
            offsets,
            total_corners,
        },
    })
}

fn append_unpacked(
    mesh: &Mesh,
    model_id: u32,
    out: &mut Vec<TriangleAttribute>,
) -> Result<(), GeometryError> {
    validate_mesh(mesh)?;
    if mesh.indices.is_empty() {
        return Err(GeometryError::NoTriangles);
    }

    out.extend(mesh.indices.iter().map(|&i| {
        let i = i as usize;
        TriangleAttribute::new(mesh.positions[i], mesh.normals[i], model_id)
    }));
    Ok(())
}
