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

use std::ops::Range;
use std::sync::Arc;
use wgpu::util::DeviceExt;

use tricull_core::math::LinearRgba;
use tricull_core::packing::PerObjectAttributes;
use tricull_core::renderer::api::{
    BufferId, CommandBufferId, DrawCommand, HistogramPassDescriptor, IdPassDescriptor,
    ObjectSource, RenderTarget, TextureFormat, ViewUniforms,
};
use tricull_core::renderer::CommandEncoder;

use super::conversions::IntoWgpu;
use super::device::WgpuDevice;
use super::pipelines::{DrawKind, HISTOGRAM_WORKGROUP};

/// A draw whose bindings are resolved, waiting for its render pass.
struct PreparedDraw {
    kind: DrawKind,
    bind_group: wgpu::BindGroup,
    /// Vertex and index buffers of the mesh path.
    mesh_buffers: Option<(Arc<wgpu::Buffer>, Arc<wgpu::Buffer>)>,
    vertices: Range<u32>,
    instances: Range<u32>,
}

/// Consecutive draws into the same target share one render pass.
struct PendingPass {
    target: RenderTarget,
    draws: Vec<PreparedDraw>,
}

pub struct WgpuCommandEncoder {
    encoder: wgpu::CommandEncoder,
    device: WgpuDevice,
    pending: Option<PendingPass>,
}

impl WgpuCommandEncoder {
    pub(crate) fn new(device: WgpuDevice, encoder: wgpu::CommandEncoder) -> Self {
        Self {
            encoder,
            device,
            pending: None,
        }
    }

    fn buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        let buffer = self.device.get_wgpu_buffer(id);
        if buffer.is_none() {
            log::warn!("WgpuCommandEncoder: BufferId {id:?} not found.");
        }
        buffer
    }

    fn uniform<T: bytemuck::Pod>(&self, label: &str, value: &T) -> wgpu::Buffer {
        self.device
            .wgpu_device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(value),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    fn bind_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        buffers: &[&wgpu::Buffer],
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        self.device
            .wgpu_device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &entries,
            })
    }

    fn prepare_draw(&self, view: &ViewUniforms, command: &DrawCommand) -> Option<PreparedDraw> {
        if command.triangle_count() == 0 {
            return None;
        }
        let view_buffer = self.uniform("draw_view", view);
        let pipelines = self.device.pipelines();

        match *command {
            DrawCommand::Mesh {
                vertex_buffer,
                index_buffer,
                index_count,
                transform,
                color,
            } => {
                let object = PerObjectAttributes::new(transform, color);
                let objects = self.device.wgpu_device().create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some("mesh_draw_object"),
                        contents: bytemuck::bytes_of(&object),
                        usage: wgpu::BufferUsages::STORAGE,
                    },
                );
                Some(PreparedDraw {
                    kind: DrawKind::Mesh,
                    bind_group: self.bind_group(
                        "mesh_bind_group",
                        &pipelines.mesh_layout,
                        &[&view_buffer, &objects],
                    ),
                    mesh_buffers: Some((self.buffer(vertex_buffer)?, self.buffer(index_buffer)?)),
                    vertices: 0..index_count,
                    instances: 0..1,
                })
            }
            DrawCommand::MeshInstanced {
                vertex_buffer,
                index_buffer,
                index_count,
                objects,
                first_instance,
                instance_count,
            } => {
                let objects = self.buffer(objects)?;
                Some(PreparedDraw {
                    kind: DrawKind::Mesh,
                    bind_group: self.bind_group(
                        "mesh_instanced_bind_group",
                        &pipelines.mesh_layout,
                        &[&view_buffer, &*objects],
                    ),
                    mesh_buffers: Some((self.buffer(vertex_buffer)?, self.buffer(index_buffer)?)),
                    vertices: 0..index_count,
                    instances: first_instance..first_instance + instance_count,
                })
            }
            DrawCommand::IndexedProcedural {
                indices,
                attributes,
                index_count,
                objects,
                object_index,
            } => {
                let (objects, attributes, indices) = (
                    self.buffer(objects)?,
                    self.buffer(attributes)?,
                    self.buffer(indices)?,
                );
                Some(PreparedDraw {
                    kind: DrawKind::IndexedProcedural,
                    bind_group: self.bind_group(
                        "indexed_procedural_bind_group",
                        &pipelines.procedural_layout,
                        &[&view_buffer, &*objects, &*attributes, &*indices],
                    ),
                    mesh_buffers: None,
                    vertices: 0..index_count,
                    instances: object_index..object_index + 1,
                })
            }
            DrawCommand::UnpackedProcedural {
                attributes,
                vertex_count,
                objects,
                object_source,
            } => {
                let (objects, attributes) = (self.buffer(objects)?, self.buffer(attributes)?);
                let (kind, instances) = match object_source {
                    ObjectSource::Instance(i) => (DrawKind::UnpackedInstance, i..i + 1),
                    ObjectSource::ModelId => (DrawKind::UnpackedModelId, 0..1),
                };
                Some(PreparedDraw {
                    kind,
                    // Binding 3 is unused on this path; the attributes fill the slot.
                    bind_group: self.bind_group(
                        "unpacked_procedural_bind_group",
                        &pipelines.procedural_layout,
                        &[&view_buffer, &*objects, &*attributes, &*attributes],
                    ),
                    mesh_buffers: None,
                    vertices: 0..vertex_count,
                    instances,
                })
            }
            DrawCommand::VisibleProcedural {
                attributes,
                visible_ids,
                triangle_count,
                objects,
            } => {
                let (objects, attributes, visible_ids) = (
                    self.buffer(objects)?,
                    self.buffer(attributes)?,
                    self.buffer(visible_ids)?,
                );
                Some(PreparedDraw {
                    kind: DrawKind::VisibleProcedural,
                    bind_group: self.bind_group(
                        "visible_procedural_bind_group",
                        &pipelines.procedural_layout,
                        &[&view_buffer, &*objects, &*attributes, &*visible_ids],
                    ),
                    mesh_buffers: None,
                    vertices: 0..triangle_count * 3,
                    instances: 0..1,
                })
            }
        }
    }

    /// Encodes the pending draws, if any, into one render pass.
    fn flush(&mut self) {
        let Some(pass) = self.pending.take() else {
            return;
        };
        let Some((color_view, format, _)) = self.device.get_wgpu_texture(pass.target.color) else {
            log::warn!("WgpuCommandEncoder: colour target {:?} not found.", pass.target.color);
            return;
        };
        if format != TextureFormat::Rgba8Unorm {
            log::warn!("WgpuCommandEncoder: cannot shade into a {format:?} target, draws dropped.");
            return;
        }
        let depth_view = pass
            .target
            .depth
            .and_then(|id| self.device.get_wgpu_texture(id))
            .map(|(view, _, _)| view);

        let pipelines = self.device.pipelines();
        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("draw_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth_view.as_deref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in &pass.draws {
            let Some(pipeline) = pipelines.draw(draw.kind, depth_view.is_some()) else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &draw.bind_group, &[]);
            match &draw.mesh_buffers {
                Some((vertices, indices)) => {
                    render_pass.set_vertex_buffer(0, vertices.slice(..));
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(draw.vertices.clone(), 0, draw.instances.clone());
                }
                None => render_pass.draw(draw.vertices.clone(), draw.instances.clone()),
            }
        }
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn clear_buffer(&mut self, buffer: BufferId) {
        self.flush();
        if let Some(buffer) = self.buffer(buffer) {
            self.encoder.clear_buffer(&buffer, 0, None);
        }
    }

    fn clear_target(&mut self, target: &RenderTarget, color: LinearRgba) {
        self.flush();
        let Some((color_view, _, _)) = self.device.get_wgpu_texture(target.color) else {
            log::warn!("WgpuCommandEncoder: colour target {:?} not found.", target.color);
            return;
        };
        let depth_view = target
            .depth
            .and_then(|id| self.device.get_wgpu_texture(id))
            .map(|(view, _, _)| view);

        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color.into_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth_view.as_deref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    fn render_triangle_ids(&mut self, descriptor: &IdPassDescriptor) {
        self.flush();
        let (Some(objects), Some(attributes)) = (
            self.buffer(descriptor.objects),
            self.buffer(descriptor.attributes),
        ) else {
            return;
        };
        let Some((id_view, _, _)) = self.device.get_wgpu_texture(descriptor.target.color) else {
            log::warn!("WgpuCommandEncoder: ID target not found.");
            return;
        };
        let depth_view = descriptor
            .target
            .depth
            .and_then(|id| self.device.get_wgpu_texture(id))
            .map(|(view, _, _)| view);
        let Some(depth_view) = depth_view else {
            log::warn!("WgpuCommandEncoder: the ID pass needs a depth attachment.");
            return;
        };

        let view_buffer = self.uniform("id_pass_view", &descriptor.view);
        let bind_group = self.bind_group(
            "triangle_id_bind_group",
            &self.device.pipelines().id_layout,
            &[&view_buffer, &*objects, &*attributes],
        );

        let pipelines = self.device.pipelines();
        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("triangle_id_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &id_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if descriptor.vertex_count > 0 {
            pass.set_pipeline(&pipelines.id_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..descriptor.vertex_count, 0..1);
        }
    }

    fn accumulate_histogram(&mut self, descriptor: &HistogramPassDescriptor) {
        self.flush();
        let Some(histogram) = self.buffer(descriptor.histogram) else {
            return;
        };
        let Some((id_view, _, _)) = self.device.get_wgpu_texture(descriptor.ids) else {
            log::warn!("WgpuCommandEncoder: ID texture {:?} not found.", descriptor.ids);
            return;
        };
        let extent = descriptor.extent;
        let params: [u32; 4] = [extent.width, extent.height, descriptor.triangle_count, 0];
        let params_buffer = self.uniform("histogram_params", &params);

        let pipelines = self.device.pipelines();
        let bind_group = self
            .device
            .wgpu_device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("histogram_bind_group"),
                layout: &pipelines.histogram_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&id_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: histogram.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            });

        let mut pass = self
            .encoder
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("histogram_pass"),
                timestamp_writes: None,
            });
        pass.set_pipeline(&pipelines.histogram_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(
            extent.width.div_ceil(HISTOGRAM_WORKGROUP),
            extent.height.div_ceil(HISTOGRAM_WORKGROUP),
            1,
        );
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        self.flush();
        if let (Some(source_buffer), Some(destination_buffer)) =
            (self.buffer(source), self.buffer(destination))
        {
            self.encoder.copy_buffer_to_buffer(
                &source_buffer,
                source_offset,
                &destination_buffer,
                destination_offset,
                size,
            );
        }
    }

    fn draw(&mut self, target: &RenderTarget, view: &ViewUniforms, command: &DrawCommand) {
        if self
            .pending
            .as_ref()
            .is_some_and(|pass| pass.target != *target)
        {
            self.flush();
        }
        let Some(prepared) = self.prepare_draw(view, command) else {
            return;
        };
        self.pending
            .get_or_insert_with(|| PendingPass {
                target: *target,
                draws: Vec::new(),
            })
            .draws
            .push(prepared);
    }

    fn finish(mut self: Box<Self>) -> CommandBufferId {
        self.flush();
        let Self {
            encoder, device, ..
        } = *self;
        device.register_command_buffer(encoder.finish())
    }
}
