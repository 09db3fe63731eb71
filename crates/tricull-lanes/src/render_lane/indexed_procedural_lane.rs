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

//! Implements the indexed procedural strategy.
//!
//! Index and attribute buffers are bound as storage and the vertex stage
//! fetches `attributes[indices[vertex_index]]` itself; no vertex buffer is bound.

use super::{main_view, upload_objects, GpuMesh};
use std::sync::Arc;
use tricull_core::{
    lane::{DrawLane, FrameContext, LaneError},
    packing::pack_indexed,
    renderer::{
        api::{DrawCommand, OwnedBuffer, SceneObject},
        GraphicsDevice,
    },
};

/// One procedural draw per object, each with its own packed buffers.
#[derive(Debug, Default)]
pub struct IndexedProceduralLane {
    meshes: Vec<GpuMesh>,
    objects: Option<OwnedBuffer>,
}

impl IndexedProceduralLane {
    /// Creates an unprepared lane.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawLane for IndexedProceduralLane {
    fn strategy_name(&self) -> &'static str {
        "IndexedProcedural"
    }

    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError> {
        let meshes = objects
            .iter()
            .map(|object| -> Result<GpuMesh, LaneError> {
                let packed = pack_indexed(&object.mesh)?;
                Ok(GpuMesh::upload(device, &packed)?)
            })
            .collect::<Result<Vec<_>, LaneError>>()?;

        self.objects = Some(upload_objects(device, objects)?);
        self.meshes = meshes;
        Ok(())
    }

    fn set_active(&mut self, _active: bool) -> Result<(), LaneError> {
        Ok(())
    }

    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), LaneError> {
        let objects = self.objects.as_ref().ok_or(LaneError::NotReady {
            strategy: self.strategy_name(),
        })?;
        let view = main_view(frame);

        for (i, mesh) in self.meshes.iter().enumerate() {
            if mesh.index_count == 0 {
                continue;
            }
            frame.encoder.draw(
                &frame.target,
                &view,
                &DrawCommand::IndexedProcedural {
                    indices: mesh.indices.id(),
                    attributes: mesh.vertices.id(),
                    index_count: mesh.index_count,
                    objects: objects.id(),
                    object_index: i as u32,
                },
            );
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if self.objects.take().is_none() {
            log::debug!("IndexedProceduralLane: dispose called on a lane with no resources");
        }
        self.meshes.clear();
    }

    fn debug_overlay(&self) -> Vec<String> {
        let triangles: u64 = self
            .meshes
            .iter()
            .map(|m| u64::from(m.index_count / 3))
            .sum();
        vec![format!(
            "IndexedProcedural: {} draw calls, {} triangles",
            self.meshes.len(),
            triangles
        )]
    }
}
