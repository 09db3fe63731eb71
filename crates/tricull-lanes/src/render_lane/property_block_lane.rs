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

//! Implements the property-block strategy.
//!
//! Same draw primitive as the direct-mesh lane, but every draw shares one
//! material and carries its own colour override.

use super::{group_by_mesh, main_view, GpuMesh};
use std::sync::Arc;
use tricull_core::{
    lane::{DrawLane, FrameContext, LaneError},
    math::{LinearRgba, Mat4},
    packing::pack_indexed,
    renderer::{
        api::{DrawCommand, SceneObject},
        GraphicsDevice,
    },
};

/// Per-draw overrides applied on top of the shared material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyBlock {
    /// Replaces the material colour for this draw.
    pub color: LinearRgba,
}

#[derive(Debug, Clone, Copy)]
struct BlockDraw {
    mesh: usize,
    transform: Mat4,
    block: PropertyBlock,
}

/// Records one `Mesh` draw per object using a single material.
#[derive(Debug)]
pub struct PropertyBlockLane {
    material: LinearRgba,
    meshes: Vec<GpuMesh>,
    draws: Vec<BlockDraw>,
    prepared: bool,
}

impl Default for PropertyBlockLane {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyBlockLane {
    /// Creates an unprepared lane with a white shared material.
    pub fn new() -> Self {
        Self {
            material: LinearRgba::WHITE,
            meshes: Vec::new(),
            draws: Vec::new(),
            prepared: false,
        }
    }

    fn resolve(&self, block: &PropertyBlock) -> LinearRgba {
        LinearRgba::new(
            block.color.r,
            block.color.g,
            block.color.b,
            block.color.a * self.material.a,
        )
    }
}

impl DrawLane for PropertyBlockLane {
    fn strategy_name(&self) -> &'static str {
        "PropertyBlock"
    }

    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError> {
        let mut meshes = Vec::new();
        let mut draws = Vec::with_capacity(objects.len());
        let mut mesh_of_object = vec![0; objects.len()];
        for (mesh, members) in group_by_mesh(objects) {
            for i in members {
                mesh_of_object[i] = meshes.len();
            }
            meshes.push(GpuMesh::upload(device, &pack_indexed(&mesh)?)?);
        }
        for (object, mesh) in objects.iter().zip(mesh_of_object) {
            draws.push(BlockDraw {
                mesh,
                transform: object.transform,
                block: PropertyBlock {
                    color: object.base_color,
                },
            });
        }

        self.meshes = meshes;
        self.draws = draws;
        self.prepared = true;
        Ok(())
    }

    fn set_active(&mut self, _active: bool) -> Result<(), LaneError> {
        Ok(())
    }

    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), LaneError> {
        if !self.prepared {
            return Err(LaneError::NotReady {
                strategy: self.strategy_name(),
            });
        }
        let view = main_view(frame);

        for draw in &self.draws {
            let mesh = &self.meshes[draw.mesh];
            if mesh.index_count == 0 {
                continue;
            }
            frame.encoder.draw(
                &frame.target,
                &view,
                &DrawCommand::Mesh {
                    vertex_buffer: mesh.vertices.id(),
                    index_buffer: mesh.indices.id(),
                    index_count: mesh.index_count,
                    transform: draw.transform,
                    color: self.resolve(&draw.block),
                },
            );
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.prepared {
            log::debug!("PropertyBlockLane: dispose called on a lane with no resources");
            return;
        }
        self.meshes.clear();
        self.draws.clear();
        self.prepared = false;
    }

    fn debug_overlay(&self) -> Vec<String> {
        vec![format!(
            "PropertyBlock: {} draw calls, 1 material, {} property blocks",
            self.draws.len(),
            self.draws.len()
        )]
    }
}
