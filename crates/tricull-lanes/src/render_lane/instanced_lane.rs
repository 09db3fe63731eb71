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

//! Implements the instanced strategy: one draw per distinct mesh.

use super::{group_by_mesh, main_view, upload_objects, GpuMesh};
use std::sync::Arc;
use tricull_core::{
    lane::{DrawLane, FrameContext, LaneError},
    packing::pack_indexed,
    renderer::{
        api::{DrawCommand, OwnedBuffer, SceneObject},
        GraphicsDevice,
    },
};

#[derive(Debug)]
struct InstanceBatch {
    mesh: GpuMesh,
    first_instance: u32,
    instance_count: u32,
}

/// Draws every object sharing a mesh with a single instanced call.
///
/// Per-object records are laid out grouped by mesh so each batch reads a
/// contiguous `first_instance..first_instance + instance_count` range.
#[derive(Debug, Default)]
pub struct InstancedLane {
    batches: Vec<InstanceBatch>,
    objects: Option<OwnedBuffer>,
}

impl InstancedLane {
    /// Creates an unprepared lane.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawLane for InstancedLane {
    fn strategy_name(&self) -> &'static str {
        "Instanced"
    }

    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError> {
        let groups = group_by_mesh(objects);
        let mut ordered = Vec::with_capacity(objects.len());
        let mut batches = Vec::with_capacity(groups.len());

        for (mesh, members) in &groups {
            let packed = pack_indexed(mesh)?;
            batches.push(InstanceBatch {
                mesh: GpuMesh::upload(device, &packed)?,
                first_instance: ordered.len() as u32,
                instance_count: members.len() as u32,
            });
            ordered.extend(members.iter().map(|&i| &objects[i]));
        }

        self.objects = Some(upload_objects(device, ordered)?);
        self.batches = batches;
        log::debug!(
            "InstancedLane: prepared {} batches for {} objects",
            self.batches.len(),
            objects.len()
        );
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

        for batch in self.batches.iter().filter(|b| b.mesh.index_count > 0) {
            frame.encoder.draw(
                &frame.target,
                &view,
                &DrawCommand::MeshInstanced {
                    vertex_buffer: batch.mesh.vertices.id(),
                    index_buffer: batch.mesh.indices.id(),
                    index_count: batch.mesh.index_count,
                    objects: objects.id(),
                    first_instance: batch.first_instance,
                    instance_count: batch.instance_count,
                },
            );
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if self.objects.is_none() {
            log::debug!("InstancedLane: dispose called on a lane with no resources");
            return;
        }
        self.batches.clear();
        self.objects = None;
    }

    fn debug_overlay(&self) -> Vec<String> {
        let triangles: u64 = self
            .batches
            .iter()
            .map(|b| u64::from(b.mesh.index_count / 3) * u64::from(b.instance_count))
            .sum();
        vec![format!(
            "Instanced: {} draw calls, {} triangles",
            self.batches.len(),
            triangles
        )]
    }
}
