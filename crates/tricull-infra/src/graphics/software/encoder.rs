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

//! Command recording and CPU execution for the software device.

use super::device::{SoftwareBuffer, SoftwareDevice, SoftwareTexture};
use super::rasterizer::{draw_triangle, RasterTarget};
use std::collections::HashMap;
use tricull_core::{
    math::{LinearRgba, Mat4, Vec3, Vec4},
    packing::{PerObjectAttributes, TriangleAttribute},
    renderer::{
        api::{
            BufferId, CommandBufferId, DrawCommand, HistogramPassDescriptor, IdPassDescriptor,
            ObjectSource, RenderTarget, TextureId, ViewUniforms,
        },
        CommandEncoder, ResourceError,
    },
};

/// A command captured by [`SoftwareCommandEncoder`], replayed at submit time.
#[derive(Debug, Clone)]
pub(crate) enum RecordedCommand {
    ClearBuffer(BufferId),
    ClearTarget(RenderTarget, LinearRgba),
    RenderTriangleIds(IdPassDescriptor),
    AccumulateHistogram(HistogramPassDescriptor),
    CopyBufferToBuffer {
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    },
    Draw(RenderTarget, ViewUniforms, DrawCommand),
}

/// Records commands into a list owned by the device once finished.
pub struct SoftwareCommandEncoder {
    device: SoftwareDevice,
    label: Option<String>,
    commands: Vec<RecordedCommand>,
}

impl SoftwareCommandEncoder {
    pub(crate) fn new(device: SoftwareDevice, label: Option<&str>) -> Self {
        Self {
            device,
            label: label.map(str::to_owned),
            commands: Vec::new(),
        }
    }
}

impl CommandEncoder for SoftwareCommandEncoder {
    fn clear_buffer(&mut self, buffer: BufferId) {
        self.commands.push(RecordedCommand::ClearBuffer(buffer));
    }

    fn clear_target(&mut self, target: &RenderTarget, color: LinearRgba) {
        self.commands
            .push(RecordedCommand::ClearTarget(*target, color));
    }

    fn render_triangle_ids(&mut self, descriptor: &IdPassDescriptor) {
        self.commands
            .push(RecordedCommand::RenderTriangleIds(*descriptor));
    }

    fn accumulate_histogram(&mut self, descriptor: &HistogramPassDescriptor) {
        self.commands
            .push(RecordedCommand::AccumulateHistogram(*descriptor));
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        self.commands.push(RecordedCommand::CopyBufferToBuffer {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        });
    }

    fn draw(&mut self, target: &RenderTarget, view: &ViewUniforms, command: &DrawCommand) {
        self.commands
            .push(RecordedCommand::Draw(*target, *view, *command));
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        log::trace!(
            "SoftwareCommandEncoder '{}' finished with {} commands",
            self.label.as_deref().unwrap_or("unlabelled"),
            self.commands.len()
        );
        let Self {
            device, commands, ..
        } = *self;
        device.register_command_buffer(commands)
    }
}

/// Mutable view of every resource a command buffer may touch.
pub(crate) struct Executor<'a> {
    pub buffers: &'a mut HashMap<BufferId, SoftwareBuffer>,
    pub textures: &'a mut HashMap<TextureId, SoftwareTexture>,
}

impl Executor<'_> {
    pub(crate) fn run(&mut self, command: &RecordedCommand) -> Result<(), ResourceError> {
        match command {
            RecordedCommand::ClearBuffer(id) => {
                self.buffer_mut(*id)?.data.fill(0);
                Ok(())
            }
            RecordedCommand::ClearTarget(target, color) => {
                self.clear(target, color.to_rgba8())
            }
            RecordedCommand::RenderTriangleIds(desc) => self.render_ids(desc),
            RecordedCommand::AccumulateHistogram(desc) => self.histogram(desc),
            RecordedCommand::CopyBufferToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } => {
                let bytes = read_range(self.buffer(*source)?, *source_offset, *size)?.to_vec();
                let dst = self.buffer_mut(*destination)?;
                let start = *destination_offset as usize;
                dst.data
                    .get_mut(start..start + bytes.len())
                    .ok_or(ResourceError::OutOfBounds)?
                    .copy_from_slice(&bytes);
                Ok(())
            }
            RecordedCommand::Draw(target, view, draw) => self.draw(target, view, draw),
        }
    }

    fn buffer(&self, id: BufferId) -> Result<&SoftwareBuffer, ResourceError> {
        self.buffers.get(&id).ok_or(ResourceError::NotFound)
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut SoftwareBuffer, ResourceError> {
        self.buffers.get_mut(&id).ok_or(ResourceError::NotFound)
    }

    fn records<T: bytemuck::Pod>(&self, id: BufferId) -> Result<Vec<T>, ResourceError> {
        let data = &self.buffer(id)?.data;
        let whole = data.len() - data.len() % std::mem::size_of::<T>();
        Ok(bytemuck::pod_collect_to_vec(&data[..whole]))
    }

    fn clear(&mut self, target: &RenderTarget, color: u32) -> Result<(), ResourceError> {
        self.textures
            .get_mut(&target.color)
            .ok_or(ResourceError::NotFound)?
            .texels
            .fill(color);
        if let Some(depth) = target.depth {
            self.textures
                .get_mut(&depth)
                .ok_or(ResourceError::NotFound)?
                .texels
                .fill(1.0f32.to_bits());
        }
        Ok(())
    }

    /// Runs `visit` with the colour and depth texels of `target` borrowed mutably.
    fn with_target<R>(
        &mut self,
        target: &RenderTarget,
        visit: impl FnOnce(&mut RasterTarget<'_>) -> R,
    ) -> Result<R, ResourceError> {
        let mut color = self
            .textures
            .remove(&target.color)
            .ok_or(ResourceError::NotFound)?;
        let mut depth = match target.depth {
            Some(id) => match self.textures.remove(&id) {
                Some(texture) => Some((id, texture)),
                None => {
                    self.textures.insert(target.color, color);
                    return Err(ResourceError::NotFound);
                }
            },
            None => None,
        };

        let mut raster = RasterTarget {
            width: color.extent.width,
            height: color.extent.height,
            color: &mut color.texels,
            depth: depth.as_mut().map(|(_, t)| t.texels.as_mut_slice()),
        };
        let result = visit(&mut raster);

        self.textures.insert(target.color, color);
        if let Some((id, texture)) = depth {
            self.textures.insert(id, texture);
        }
        Ok(result)
    }

    fn render_ids(&mut self, desc: &IdPassDescriptor) -> Result<(), ResourceError> {
        self.clear(&desc.target, 0)?;
        let corners: Vec<TriangleAttribute> = self.records(desc.attributes)?;
        let objects: Vec<PerObjectAttributes> = self.records(desc.objects)?;
        let clip_from_root = desc.view.clip_from_root();

        let triangle_count = (desc.vertex_count / 3) as usize;
        let mut triangles = Vec::with_capacity(triangle_count);
        for (t, tri) in corners.chunks_exact(3).take(triangle_count).enumerate() {
            let Some(object) = objects.get(tri[0].model_id as usize) else {
                continue;
            };
            let clip_from_object = clip_from_root * Mat4::from_cols_array_2d(&object.world);
            triangles.push((project(&clip_from_object, tri), t as u32 + 1));
        }

        self.with_target(&desc.target, |raster| {
            for (clip, value) in triangles {
                draw_triangle(raster, clip, value);
            }
        })
    }

    fn histogram(&mut self, desc: &HistogramPassDescriptor) -> Result<(), ResourceError> {
        let ids = self
            .textures
            .get(&desc.ids)
            .ok_or(ResourceError::NotFound)?
            .texels
            .clone();
        let mut counters: Vec<u32> = self.records(desc.histogram)?;
        let limit = (desc.triangle_count as usize).min(counters.len());
        for v in ids.into_iter().filter(|&v| v != 0) {
            let slot = (v - 1) as usize;
            if slot < limit {
                counters[slot] += 1;
            }
        }
        let bytes: &[u8] = bytemuck::cast_slice(&counters);
        self.buffer_mut(desc.histogram)?.data[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn draw(
        &mut self,
        target: &RenderTarget,
        view: &ViewUniforms,
        command: &DrawCommand,
    ) -> Result<(), ResourceError> {
        let triangles = self.assemble(command)?;
        let clip_from_root = view.clip_from_root();
        self.with_target(target, |raster| {
            for (world, corners, color) in triangles {
                let clip = project(&(clip_from_root * world), &corners);
                draw_triangle(raster, clip, color.to_rgba8());
            }
        })
    }

    /// Resolves a draw command into `(object transform, corners, colour)` triples.
    ///
    /// Fetches outside a buffer skip the triangle, like robust buffer access
    /// yielding a degenerate primitive.
    fn assemble(
        &self,
        command: &DrawCommand,
    ) -> Result<Vec<(Mat4, [TriangleAttribute; 3], LinearRgba)>, ResourceError> {
        let mut out = Vec::new();
        match *command {
            DrawCommand::Mesh {
                vertex_buffer,
                index_buffer,
                index_count,
                transform,
                color,
            } => {
                let vertices: Vec<TriangleAttribute> = self.records(vertex_buffer)?;
                let indices: Vec<u32> = self.records(index_buffer)?;
                for tri in indexed_triangles(&vertices, &indices, index_count) {
                    out.push((transform, tri, color));
                }
            }
            DrawCommand::MeshInstanced {
                vertex_buffer,
                index_buffer,
                index_count,
                objects,
                first_instance,
                instance_count,
            } => {
                let vertices: Vec<TriangleAttribute> = self.records(vertex_buffer)?;
                let indices: Vec<u32> = self.records(index_buffer)?;
                let objects: Vec<PerObjectAttributes> = self.records(objects)?;
                let tris = indexed_triangles(&vertices, &indices, index_count);
                for instance in first_instance..first_instance + instance_count {
                    let Some(object) = objects.get(instance as usize) else {
                        continue;
                    };
                    let (world, color) = decode(object);
                    out.extend(tris.iter().map(|&tri| (world, tri, color)));
                }
            }
            DrawCommand::IndexedProcedural {
                indices,
                attributes,
                index_count,
                objects,
                object_index,
            } => {
                let vertices: Vec<TriangleAttribute> = self.records(attributes)?;
                let indices: Vec<u32> = self.records(indices)?;
                let objects: Vec<PerObjectAttributes> = self.records(objects)?;
                if let Some(object) = objects.get(object_index as usize) {
                    let (world, color) = decode(object);
                    for tri in indexed_triangles(&vertices, &indices, index_count) {
                        out.push((world, tri, color));
                    }
                }
            }
            DrawCommand::UnpackedProcedural {
                attributes,
                vertex_count,
                objects,
                object_source,
            } => {
                let corners: Vec<TriangleAttribute> = self.records(attributes)?;
                let objects: Vec<PerObjectAttributes> = self.records(objects)?;
                let count = (vertex_count / 3) as usize;
                for tri in corners.chunks_exact(3).take(count) {
                    let slot = match object_source {
                        ObjectSource::Instance(i) => i,
                        ObjectSource::ModelId => tri[0].model_id,
                    };
                    if let Some(object) = objects.get(slot as usize) {
                        let (world, color) = decode(object);
                        out.push((world, [tri[0], tri[1], tri[2]], color));
                    }
                }
            }
            DrawCommand::VisibleProcedural {
                attributes,
                visible_ids,
                triangle_count,
                objects,
            } => {
                let corners: Vec<TriangleAttribute> = self.records(attributes)?;
                let ids: Vec<u32> = self.records(visible_ids)?;
                let objects: Vec<PerObjectAttributes> = self.records(objects)?;
                for &id in ids.iter().take(triangle_count as usize) {
                    let base = id as usize * 3;
                    let Some(tri) = corners.get(base..base + 3) else {
                        continue;
                    };
                    if let Some(object) = objects.get(tri[0].model_id as usize) {
                        let (world, color) = decode(object);
                        out.push((world, [tri[0], tri[1], tri[2]], color));
                    }
                }
            }
        }
        Ok(out)
    }
}

fn read_range(buffer: &SoftwareBuffer, offset: u64, size: u64) -> Result<&[u8], ResourceError> {
    let start = offset as usize;
    buffer
        .data
        .get(start..start + size as usize)
        .ok_or(ResourceError::OutOfBounds)
}

fn indexed_triangles(
    vertices: &[TriangleAttribute],
    indices: &[u32],
    index_count: u32,
) -> Vec<[TriangleAttribute; 3]> {
    indices
        .chunks_exact(3)
        .take((index_count / 3) as usize)
        .filter_map(|tri| {
            Some([
                *vertices.get(tri[0] as usize)?,
                *vertices.get(tri[1] as usize)?,
                *vertices.get(tri[2] as usize)?,
            ])
        })
        .collect()
}

fn decode(object: &PerObjectAttributes) -> (Mat4, LinearRgba) {
    let [r, g, b, a] = object.color;
    (
        Mat4::from_cols_array_2d(&object.world),
        LinearRgba::new(r, g, b, a),
    )
}

fn project(clip_from_object: &Mat4, corners: &[TriangleAttribute]) -> [Vec4; 3] {
    let corner = |i: usize| clip_from_object.transform_point(Vec3::from(corners[i].position));
    [corner(0), corner(1), corner(2)]
}
