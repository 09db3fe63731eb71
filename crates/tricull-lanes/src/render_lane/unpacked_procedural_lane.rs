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

//! Implements the unpacked procedural strategy.
//!
//! Each object is flattened to one attribute record per triangle corner and
//! drawn without any index buffer.

use super::{main_view, upload_objects, upload_slice};
use std::sync::Arc;
use tricull_core::{
    lane::{DrawLane, FrameContext, LaneError},
    packing::pack_unpacked_single,
    renderer::{
        api::{BufferUsage, DrawCommand, ObjectSource, OwnedBuffer, SceneObject},
        GraphicsDevice,
    },
};

#[derive(Debug)]
struct UnpackedDraw {
    attributes: OwnedBuffer,
    vertex_count: u32,
}

/// One non-indexed procedural draw per object.
#[derive(Debug, Default)]
pub struct UnpackedProceduralLane {
    draws: Vec<UnpackedDraw>,
    objects: Option<OwnedBuffer>,
}

impl UnpackedProceduralLane {
    /// Creates an unprepared lane.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawLane for UnpackedProceduralLane {
    fn strategy_name(&self) -> &'static str {
        "UnpackedProcedural"
    }

    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError> {
        let draws = objects
            .iter()
            .map(|object| -> Result<UnpackedDraw, LaneError> {
                let corners = pack_unpacked_single(&object.mesh)?;
                Ok(UnpackedDraw {
                    attributes: upload_slice(
                        device,
                        "unpacked_attributes",
                        BufferUsage::STORAGE,
                        &corners,
                    )?,
                    vertex_count: corners.len() as u32,
                })
            })
            .collect::<Result<Vec<_>, LaneError>>()?;

        self.objects = Some(upload_objects(device, objects)?);
        self.draws = draws;
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

        for (i, draw) in self.draws.iter().enumerate() {
            frame.encoder.draw(
                &frame.target,
                &view,
                &DrawCommand::UnpackedProcedural {
                    attributes: draw.attributes.id(),
                    vertex_count: draw.vertex_count,
                    objects: objects.id(),
                    object_source: ObjectSource::Instance(i as u32),
                },
            );
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if self.objects.take().is_none() {
            log::debug!("UnpackedProceduralLane: dispose called on a lane with no resources");
        }
        self.draws.clear();
    }

    fn debug_overlay(&self) -> Vec<String> {
        let triangles: u64 = self.draws.iter().map(|d| u64::from(d.vertex_count / 3)).sum();
        vec![format!(
            "UnpackedProcedural: {} draw calls, {} triangles",
            self.draws.len(),
            triangles
        )]
    }
}
