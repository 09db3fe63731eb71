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

//! Implements the direct-mesh strategy.
//!
//! One indexed draw per object. Objects of the same colour share a material
//! slot, mirroring how a scene would share material assets.

use super::{group_by_mesh, main_view, GpuMesh};
use std::collections::HashMap;
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

#[derive(Debug, Clone, Copy)]
struct MeshDraw {
    mesh: usize,
    transform: Mat4,
    material: usize,
}

/// Records one `Mesh` draw per object, coloured from a de-duplicated material table.
#[derive(Debug, Default)]
pub struct DirectMeshLane {
    meshes: Vec<GpuMesh>,
    materials: Vec<LinearRgba>,
    draws: Vec<MeshDraw>,
    prepared: bool,
}

impl DirectMeshLane {
    /// Creates an unprepared lane.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct materials after de-duplication.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

impl DrawLane for DirectMeshLane {
    fn strategy_name(&self) -> &'static str {
        "DirectMesh"
    }

    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError> {
        let mut meshes = Vec::new();
        let mut mesh_of_object = vec![0; objects.len()];
        for (mesh, members) in group_by_mesh(objects) {
            for i in members {
                mesh_of_object[i] = meshes.len();
            }
            meshes.push(GpuMesh::upload(device, &pack_indexed(&mesh)?)?);
        }

        let mut materials = Vec::new();
        let mut material_slots: HashMap<[u32; 4], usize> = HashMap::new();
        let draws = objects
            .iter()
            .zip(mesh_of_object)
            .map(|(object, mesh)| {
                let material = *material_slots
                    .entry(object.base_color.bits())
                    .or_insert_with(|| {
                        materials.push(object.base_color);
                        materials.len() - 1
                    });
                MeshDraw {
                    mesh,
                    transform: object.transform,
                    material,
                }
            })
            .collect();

        self.meshes = meshes;
        self.materials = materials;
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
                    color: self.materials[draw.material],
                },
            );
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.prepared {
            log::debug!("DirectMeshLane: dispose called on a lane with no resources");
            return;
        }
        self.meshes.clear();
        self.materials.clear();
        self.draws.clear();
        self.prepared = false;
    }

    fn debug_overlay(&self) -> Vec<String> {
        vec![format!(
            "DirectMesh: {} draw calls, {} materials",
            self.draws.len(),
            self.materials.len()
        )]
    }
}
