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

//! The closed set of draw strategies the benchmark compares.

use crate::render_lane::{
    DirectMeshLane, IndexedProceduralLane, InstancedLane, PropertyBlockLane,
    UnpackedProceduralLane,
};
use crate::visibility_lane::{VisibilityCulledLane, VisibilitySettings};
use std::sync::Arc;
use tricull_core::{
    lane::{DrawLane, FrameContext, LaneError, StepOutcome},
    math::Mat4,
    renderer::{
        api::{Camera, SceneObject},
        GraphicsDevice,
    },
};

/// One of the draw strategies, dispatched by `match`.
#[derive(Debug)]
pub enum DrawStrategy {
    /// One instanced draw per distinct mesh.
    Instanced(InstancedLane),
    /// One draw per object with a de-duplicated material.
    DirectMesh(DirectMeshLane),
    /// One draw per object with a shared material and a colour override.
    PropertyBlock(PropertyBlockLane),
    /// One non-indexed draw per object fetching through the index buffer.
    IndexedProcedural(IndexedProceduralLane),
    /// One non-indexed draw per object over unpacked corners.
    UnpackedProcedural(UnpackedProceduralLane),
    /// A single draw of the triangles found visible by the ID pass.
    VisibilityCulled(VisibilityCulledLane),
}

impl DrawStrategy {
    /// Every strategy, in benchmark order.
    pub fn all(settings: VisibilitySettings) -> Vec<DrawStrategy> {
        vec![
            DrawStrategy::Instanced(InstancedLane::new()),
            DrawStrategy::DirectMesh(DirectMeshLane::new()),
            DrawStrategy::PropertyBlock(PropertyBlockLane::new()),
            DrawStrategy::IndexedProcedural(IndexedProceduralLane::new()),
            DrawStrategy::UnpackedProcedural(UnpackedProceduralLane::new()),
            DrawStrategy::VisibilityCulled(VisibilityCulledLane::new(settings)),
        ]
    }

    fn lane(&self) -> &dyn DrawLane {
        match self {
            DrawStrategy::Instanced(lane) => lane,
            DrawStrategy::DirectMesh(lane) => lane,
            DrawStrategy::PropertyBlock(lane) => lane,
            DrawStrategy::IndexedProcedural(lane) => lane,
            DrawStrategy::UnpackedProcedural(lane) => lane,
            DrawStrategy::VisibilityCulled(lane) => lane,
        }
    }

    fn lane_mut(&mut self) -> &mut dyn DrawLane {
        match self {
            DrawStrategy::Instanced(lane) => lane,
            DrawStrategy::DirectMesh(lane) => lane,
            DrawStrategy::PropertyBlock(lane) => lane,
            DrawStrategy::IndexedProcedural(lane) => lane,
            DrawStrategy::UnpackedProcedural(lane) => lane,
            DrawStrategy::VisibilityCulled(lane) => lane,
        }
    }
}

impl DrawLane for DrawStrategy {
    fn strategy_name(&self) -> &'static str {
        self.lane().strategy_name()
    }

    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError> {
        self.lane_mut().prepare(device, objects)
    }

    fn set_active(&mut self, active: bool) -> Result<(), LaneError> {
        self.lane_mut().set_active(active)
    }

    fn step(&mut self, camera: &Camera, root: Mat4) -> Result<StepOutcome, LaneError> {
        self.lane_mut().step(camera, root)
    }

    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), LaneError> {
        self.lane_mut().render(frame)
    }

    fn dispose(&mut self) {
        self.lane_mut().dispose()
    }

    fn debug_overlay(&self) -> Vec<String> {
        self.lane().debug_overlay()
    }
}
