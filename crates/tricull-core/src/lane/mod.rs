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

//! # Lane Abstraction
//!
//! A **Lane** is one swappable draw strategy. The benchmark driver prepares
//! every lane once with the same objects, activates exactly one at a time,
//! advances it with [`DrawLane::step`] and records its draws with
//! [`DrawLane::render`].
//!
//! ```rust,ignore
//! lane.prepare(&device, &objects)?;
//! lane.set_active(true)?;
//! loop {
//!     lane.step(&camera, root)?;
//!     let mut encoder = device.create_command_encoder(Some("frame"));
//!     lane.render(&mut FrameContext { encoder: encoder.as_mut(), camera: &camera, root, target })?;
//!     device.submit_command_buffer(encoder.finish())?;
//! }
//! ```

use crate::math::Mat4;
use crate::packing::GeometryError;
use crate::renderer::api::command::RenderTarget;
use crate::renderer::api::scene::{Camera, SceneObject};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::{CommandEncoder, GraphicsDevice};
use std::fmt;
use std::sync::Arc;

/// Error type for lane operations.
#[derive(Debug)]
pub enum LaneError {
    /// The lane was asked to draw before it was prepared or activated.
    NotReady {
        /// Name of the lane.
        strategy: &'static str,
    },
    /// A source mesh could not be packed.
    Geometry(GeometryError),
    /// A device resource operation failed.
    Resource(ResourceError),
    /// Lane configuration is out of range.
    InvalidSettings(String),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::NotReady { strategy } => write!(f, "Lane '{strategy}' is not ready"),
            LaneError::Geometry(e) => write!(f, "Geometry packing failed: {e}"),
            LaneError::Resource(e) => write!(f, "GPU resource operation failed: {e}"),
            LaneError::InvalidSettings(msg) => write!(f, "Invalid lane settings: {msg}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::Geometry(e) => Some(e),
            LaneError::Resource(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GeometryError> for LaneError {
    fn from(err: GeometryError) -> Self {
        LaneError::Geometry(err)
    }
}

impl From<ResourceError> for LaneError {
    fn from(err: ResourceError) -> Self {
        LaneError::Resource(err)
    }
}

/// What a call to [`DrawLane::step`] achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The lane has no background work.
    Idle,
    /// Work is in progress; call again next frame.
    Yielded,
    /// A new visible set became current.
    Published {
        /// Number of triangles in the new set.
        visible: usize,
        /// Whether visible triangles were dropped for lack of capacity.
        truncated: bool,
    },
}

/// Everything a lane needs to record one frame of draws.
pub struct FrameContext<'a> {
    /// Encoder the draws are recorded into.
    pub encoder: &'a mut dyn CommandEncoder,
    /// Camera of the main pass.
    pub camera: &'a Camera,
    /// Transform every object is parented to.
    pub root: Mat4,
    /// Colour and depth target of the main pass.
    pub target: RenderTarget,
}

/// Capability shared by every draw strategy.
pub trait DrawLane {
    /// Human-readable name, used in logs and overlays.
    fn strategy_name(&self) -> &'static str;

    /// Packs `objects` and uploads everything the lane draws from.
    ///
    /// Preparing again replaces the previous buffers.
    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError>;

    /// Activates or deactivates the lane. Deactivation stops all background
    /// work before returning.
    fn set_active(&mut self, active: bool) -> Result<(), LaneError>;

    /// Advances background work by one bounded slice.
    fn step(&mut self, _camera: &Camera, _root: Mat4) -> Result<StepOutcome, LaneError> {
        Ok(StepOutcome::Idle)
    }

    /// Records this frame's draws into `frame.encoder`.
    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), LaneError>;

    /// Releases every GPU resource. Calling it again is a logged no-op.
    fn dispose(&mut self);

    /// Short status lines for a debug overlay.
    fn debug_overlay(&self) -> Vec<String>;
}
