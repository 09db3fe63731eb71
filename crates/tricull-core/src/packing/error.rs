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

//! Errors raised when a mesh cannot be packed.

use std::fmt;

/// A malformed or unusable source mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// The mesh has no vertices.
    NoVertices,
    /// The mesh has no triangles.
    NoTriangles,
    /// Positions and normals have different lengths.
    AttributeCountMismatch {
        /// Number of positions.
        positions: usize,
        /// Number of normals.
        normals: usize,
    },
    /// The index count is not a multiple of three.
    IndexCountNotTriangles {
        /// The offending index count.
        count: usize,
    },
    /// An index refers past the end of the vertex arrays.
    IndexOutOfRange {
        /// Position of the index in the index list.
        position: usize,
        /// The index value.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },
    /// A batch was requested with no meshes.
    EmptyBatch,
    /// A member of a batch failed to pack.
    InBatch {
        /// Position of the mesh in the batch.
        index: usize,
        /// Why it failed.
        source: Box<GeometryError>,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::NoVertices => write!(f, "Mesh has no vertices."),
            GeometryError::NoTriangles => write!(f, "Mesh has no triangles."),
            GeometryError::AttributeCountMismatch { positions, normals } => write!(
                f,
                "Mesh has {positions} positions but {normals} normals."
            ),
            GeometryError::IndexCountNotTriangles { count } => {
                write!(f, "Index count {count} is not a multiple of 3.")
            }
            GeometryError::IndexOutOfRange {
                position,
                index,
                vertex_count,
            } => write!(
                f,
                "Index {index} at position {position} is out of range for {vertex_count} vertices."
            ),
            GeometryError::EmptyBatch => write!(f, "Cannot pack an empty batch."),
            GeometryError::InBatch { index, source } => {
                write!(f, "Mesh {index} of the batch is invalid: {source}")
            }
        }
    }
}

impl std::error::Error for GeometryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeometryError::InBatch { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
