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

//! Implements the visibility-culled strategy.

use super::compaction::CompactionScan;
use super::cycle::CyclePhase;
use super::readback::{ReadbackProgress, StagedReadback};
use super::settings::{DrawMode, VisibilitySettings};
use super::state::{VisibilityState, VisibilityStats};
use crate::render_lane::{main_view, upload_objects, upload_slice};
use std::sync::Arc;
use tricull_core::{
    lane::{DrawLane, FrameContext, LaneError, StepOutcome},
    math::{Extent2D, Mat4},
    packing::{pack_unpacked_batch, OffsetTable},
    renderer::{
        api::{
            BufferDescriptor, BufferUsage, Camera, DrawCommand, HistogramPassDescriptor,
            IdPassDescriptor, Mesh, ObjectSource, OwnedBuffer, OwnedTexture, RenderTarget,
            SceneObject, SubmissionIndex, TextureDescriptor, TextureFormat, TextureId,
            TextureUsage, ViewUniforms,
        },
        GraphicsDevice, ResourceError,
    },
};

/// The packed batch every cycle renders.
#[derive(Debug)]
struct BatchGeometry {
    attributes: OwnedBuffer,
    objects: OwnedBuffer,
    offsets: OffsetTable,
    triangle_count: u32,
}

/// Device resources allocated on first activation.
#[derive(Debug)]
struct CycleResources {
    id_target: OwnedTexture,
    id_depth: OwnedTexture,
    histogram: OwnedBuffer,
    staging: OwnedBuffer,
    visible: [OwnedBuffer; 2],
    front: usize,
    published_count: u32,
}

impl CycleResources {
    fn allocate(
        device: &Arc<dyn GraphicsDevice>,
        settings: &VisibilitySettings,
        triangle_count: u32,
    ) -> Result<Self, ResourceError> {
        let extent = settings.id_target_extent();
        let histogram_bytes = u64::from(triangle_count) * 4;
        let visible_bytes = u64::from(settings.visible_capacity) * 4;
        let visible_usage = BufferUsage::STORAGE | BufferUsage::COPY_DST;

        Ok(Self {
            id_target: OwnedTexture::new(
                device,
                &TextureDescriptor {
                    label: Some("triangle_id_target".into()),
                    size: extent,
                    format: TextureFormat::R32Uint,
                    usage: TextureUsage::RENDER_ATTACHMENT
                        | TextureUsage::TEXTURE_BINDING
                        | TextureUsage::COPY_SRC,
                },
            )?,
            id_depth: OwnedTexture::new(
                device,
                &TextureDescriptor {
                    label: Some("triangle_id_depth".into()),
                    size: extent,
                    format: TextureFormat::Depth32Float,
                    usage: TextureUsage::RENDER_ATTACHMENT,
                },
            )?,
            histogram: OwnedBuffer::new(
                device,
                &BufferDescriptor::new(
                    "presence_histogram",
                    histogram_bytes,
                    BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
                ),
            )?,
            staging: OwnedBuffer::new(
                device,
                &BufferDescriptor::new(
                    "histogram_staging",
                    settings.readback_chunk_bytes.min(histogram_bytes),
                    BufferUsage::MAP_READ | BufferUsage::COPY_DST,
                ),
            )?,
            visible: [
                OwnedBuffer::new(
                    device,
                    &BufferDescriptor::new("visible_ids_a", visible_bytes, visible_usage),
                )?,
                OwnedBuffer::new(
                    device,
                    &BufferDescriptor::new("visible_ids_b", visible_bytes, visible_usage),
                )?,
            ],
            front: 0,
            published_count: 0,
        })
    }

    fn id_target(&self, extent: Extent2D) -> RenderTarget {
        RenderTarget {
            color: self.id_target.id(),
            depth: Some(self.id_depth.id()),
            extent,
        }
    }
}

/// Draws only the triangles seen in a recent triangle-ID pass.
///
/// Each cycle renders the whole batch into an `R32Uint` target with an
/// inflated camera, counts pixels per triangle on the GPU, streams the
/// counters back in chunks, compacts the non-zero ones into a bounded list
/// and publishes it to a double-buffered visible-ID buffer. `render` always
/// draws the last published list, so the visible set lags one cycle behind.
#[derive(Debug)]
pub struct VisibilityCulledLane {
    settings: VisibilitySettings,
    device: Option<Arc<dyn GraphicsDevice>>,
    geometry: Option<BatchGeometry>,
    resources: Option<CycleResources>,
    state: Option<VisibilityState>,
    phase: CyclePhase,
    active: bool,
    cycle_steps: u32,
    stats: VisibilityStats,
}

impl Default for VisibilityCulledLane {
    fn default() -> Self {
        Self::new(VisibilitySettings::default())
    }
}

impl VisibilityCulledLane {
    /// Creates an unprepared lane. Settings are validated on `prepare`.
    pub fn new(settings: VisibilitySettings) -> Self {
        Self {
            settings,
            device: None,
            geometry: None,
            resources: None,
            state: None,
            phase: CyclePhase::RenderIds,
            active: false,
            cycle_steps: 0,
            stats: VisibilityStats::default(),
        }
    }

    /// The lane's settings.
    pub fn settings(&self) -> &VisibilitySettings {
        &self.settings
    }

    /// The visible set `render` currently draws, ascending.
    pub fn published_triangle_ids(&self) -> &[u32] {
        self.state
            .as_ref()
            .map(|s| s.visible_triangle_ids.as_slice())
            .unwrap_or_default()
    }

    /// Cycle counters.
    pub fn stats(&self) -> VisibilityStats {
        self.stats
    }

    /// Name of the current cycle phase.
    pub fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    /// Whether the lane is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Where each source object starts in the unpacked batch.
    pub fn offsets(&self) -> Option<&OffsetTable> {
        self.geometry.as_ref().map(|g| &g.offsets)
    }

    /// Total number of triangles in the prepared batch.
    pub fn triangle_count(&self) -> u32 {
        self.geometry.as_ref().map_or(0, |g| g.triangle_count)
    }

    /// The ID target, once allocated. Pixels hold `triangle_id + 1`, 0 is background.
    pub fn id_target(&self) -> Option<TextureId> {
        self.resources.as_ref().map(|r| r.id_target.id())
    }

    fn cancel_cycle(&mut self) {
        if let (CyclePhase::Readback(readback), Some(device)) = (&mut self.phase, &self.device) {
            readback.cancel(device);
        }
        self.phase = CyclePhase::RenderIds;
        self.cycle_steps = 0;
        if let Some(state) = self.state.as_mut() {
            state.cursor = 0;
        }
    }
}

fn record_id_pass(
    device: &Arc<dyn GraphicsDevice>,
    geometry: &BatchGeometry,
    resources: &CycleResources,
    settings: &VisibilitySettings,
    camera: &Camera,
    root: Mat4,
) -> Result<SubmissionIndex, ResourceError> {
    let extent = settings.id_target_extent();
    let id_camera = camera.with_fov_scale(settings.fov_inflation);

    let mut encoder = device.create_command_encoder(Some("visibility_id_pass"));
    encoder.clear_buffer(resources.histogram.id());
    encoder.render_triangle_ids(&IdPassDescriptor {
        target: resources.id_target(extent),
        attributes: geometry.attributes.id(),
        objects: geometry.objects.id(),
        vertex_count: geometry.triangle_count * 3,
        view: ViewUniforms::new(id_camera.view_projection(), root),
    });
    encoder.accumulate_histogram(&HistogramPassDescriptor {
        ids: resources.id_target.id(),
        extent,
        histogram: resources.histogram.id(),
        triangle_count: geometry.triangle_count,
    });
    device.submit_command_buffer(encoder.finish())
}

/// Advances a readback by one step. A failed transfer restarts the cycle.
fn advance_readback(
    device: &Arc<dyn GraphicsDevice>,
    resources: &CycleResources,
    state: &mut VisibilityState,
    settings: &VisibilitySettings,
    mut readback: StagedReadback,
) -> CyclePhase {
    match readback.advance(
        device,
        resources.histogram.id(),
        resources.staging.id(),
        &mut state.presence_histogram,
    ) {
        Ok(ReadbackProgress::Complete) => {
            state.cursor = 0;
            CyclePhase::Compact(CompactionScan::new(
                state.presence_histogram.len(),
                settings.scan_chunk_fraction,
                settings.visible_capacity as usize,
            ))
        }
        Ok(ReadbackProgress::Chunk { received, total }) => {
            log::trace!("Histogram readback: {received}/{total} chunks");
            CyclePhase::Readback(readback)
        }
        Ok(ReadbackProgress::Pending) => CyclePhase::Readback(readback),
        Err(e) => {
            log::warn!("Histogram readback failed, restarting visibility cycle: {e}");
            readback.cancel(device);
            CyclePhase::RenderIds
        }
    }
}

impl DrawLane for VisibilityCulledLane {
    fn strategy_name(&self) -> &'static str {
        "VisibilityCulled"
    }

    fn prepare(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        objects: &[SceneObject],
    ) -> Result<(), LaneError> {
        self.settings
            .validate()
            .map_err(|e| LaneError::InvalidSettings(e.to_string()))?;

        let meshes: Vec<&Mesh> = objects.iter().map(|o| o.mesh.as_ref()).collect();
        let batch = pack_unpacked_batch(&meshes)?;
        let geometry = BatchGeometry {
            attributes: upload_slice(
                device,
                "unpacked_batch_attributes",
                BufferUsage::STORAGE | BufferUsage::VERTEX,
                &batch.attributes,
            )?,
            objects: upload_objects(device, objects)?,
            triangle_count: batch.triangle_count(),
            offsets: batch.offsets,
        };

        self.cancel_cycle();
        self.resources = None;
        self.state = None;
        log::info!(
            "VisibilityCulledLane: prepared {} objects, {} triangles",
            geometry.offsets.len(),
            geometry.triangle_count
        );
        self.geometry = Some(geometry);
        self.device = Some(Arc::clone(device));

        if self.active {
            self.active = false;
            self.set_active(true)?;
        }
        Ok(())
    }

    fn set_active(&mut self, active: bool) -> Result<(), LaneError> {
        if !active {
            if self.active {
                self.cancel_cycle();
                log::debug!("VisibilityCulledLane deactivated");
            }
            self.active = false;
            return Ok(());
        }

        let not_ready = LaneError::NotReady {
            strategy: self.strategy_name(),
        };
        let (Some(device), Some(geometry)) = (self.device.as_ref(), self.geometry.as_ref()) else {
            return Err(not_ready);
        };

        if self.resources.is_none() {
            self.resources = Some(CycleResources::allocate(
                device,
                &self.settings,
                geometry.triangle_count,
            )?);
        }
        if self.state.is_none() {
            self.state = Some(VisibilityState::new(
                self.settings.id_target_extent(),
                geometry.triangle_count,
            ));
        }
        if !self.active {
            self.phase = CyclePhase::RenderIds;
            self.cycle_steps = 0;
        }
        self.active = true;
        Ok(())
    }

    fn step(&mut self, camera: &Camera, root: Mat4) -> Result<StepOutcome, LaneError> {
        if !self.active {
            return Ok(StepOutcome::Idle);
        }
        let (Some(device), Some(geometry), Some(resources), Some(state)) = (
            self.device.as_ref(),
            self.geometry.as_ref(),
            self.resources.as_mut(),
            self.state.as_mut(),
        ) else {
            return Ok(StepOutcome::Idle);
        };

        device.poll();
        self.cycle_steps += 1;
        let settings = &self.settings;

        let phase = std::mem::replace(&mut self.phase, CyclePhase::RenderIds);
        let (next, outcome) = match phase {
            CyclePhase::RenderIds => {
                let submission =
                    record_id_pass(device, geometry, resources, settings, camera, root)?;
                (CyclePhase::AwaitGpu(submission), StepOutcome::Yielded)
            }
            CyclePhase::AwaitGpu(submission) => {
                if device.is_submission_complete(submission) {
                    let readback = StagedReadback::new(
                        u64::from(geometry.triangle_count) * 4,
                        settings.readback_chunk_bytes,
                    );
                    let next = advance_readback(device, resources, state, settings, readback);
                    (next, StepOutcome::Yielded)
                } else {
                    (CyclePhase::AwaitGpu(submission), StepOutcome::Yielded)
                }
            }
            CyclePhase::Readback(readback) => {
                let next = advance_readback(device, resources, state, settings, readback);
                (next, StepOutcome::Yielded)
            }
            CyclePhase::Compact(mut scan) => {
                let done = scan.advance(&state.presence_histogram);
                state.cursor = scan.cursor();
                if !done {
                    (CyclePhase::Compact(scan), StepOutcome::Yielded)
                } else {
                    let result = scan.finish();
                    let back = 1 - resources.front;
                    if !result.ids.is_empty() {
                        device.write_buffer(
                            resources.visible[back].id(),
                            0,
                            bytemuck::cast_slice(&result.ids),
                        )?;
                    }
                    resources.front = back;
                    resources.published_count = result.ids.len() as u32;

                    if result.truncated {
                        log::warn!(
                            "Visible set truncated to {} triangles; raise visible_capacity",
                            settings.visible_capacity
                        );
                        self.stats.truncated_cycles += 1;
                    }
                    self.stats.cycles_completed += 1;
                    self.stats.last_visible_count = result.ids.len();
                    self.stats.last_cycle_steps = self.cycle_steps;
                    self.cycle_steps = 0;

                    let outcome = StepOutcome::Published {
                        visible: result.ids.len(),
                        truncated: result.truncated,
                    };
                    state.visible_triangle_ids = result.ids;
                    (CyclePhase::RenderIds, outcome)
                }
            }
        };
        if matches!(next, CyclePhase::RenderIds) && outcome == StepOutcome::Yielded {
            self.cycle_steps = 0;
        }
        self.phase = next;
        Ok(outcome)
    }

    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), LaneError> {
        let not_ready = LaneError::NotReady {
            strategy: self.strategy_name(),
        };
        let geometry = self.geometry.as_ref().ok_or(not_ready)?;
        let view = main_view(frame);

        let command = match self.settings.draw_mode {
            DrawMode::FullBuffer => DrawCommand::UnpackedProcedural {
                attributes: geometry.attributes.id(),
                vertex_count: geometry.triangle_count * 3,
                objects: geometry.objects.id(),
                object_source: ObjectSource::ModelId,
            },
            DrawMode::Culled => {
                let resources = self.resources.as_ref().ok_or(LaneError::NotReady {
                    strategy: self.strategy_name(),
                })?;
                if resources.published_count == 0 {
                    return Ok(());
                }
                DrawCommand::VisibleProcedural {
                    attributes: geometry.attributes.id(),
                    visible_ids: resources.visible[resources.front].id(),
                    triangle_count: resources.published_count,
                    objects: geometry.objects.id(),
                }
            }
        };
        frame.encoder.draw(&frame.target, &view, &command);
        Ok(())
    }

    fn dispose(&mut self) {
        if self.geometry.is_none() && self.resources.is_none() {
            log::debug!("VisibilityCulledLane: dispose called on a lane with no resources");
            return;
        }
        self.cancel_cycle();
        self.active = false;
        self.state = None;
        self.resources = None;
        self.geometry = None;
        self.device = None;
        log::debug!("VisibilityCulledLane disposed");
    }

    fn debug_overlay(&self) -> Vec<String> {
        vec![
            format!(
                "VisibilityCulled: {}/{} triangles visible ({:?})",
                self.published_triangle_ids().len(),
                self.triangle_count(),
                self.settings.draw_mode
            ),
            format!(
                "cycles: {} ({} truncated), last cycle {} steps",
                self.stats.cycles_completed,
                self.stats.truncated_cycles,
                self.stats.last_cycle_steps
            ),
            format!("phase: {}", self.phase.name()),
        ]
    }
}
