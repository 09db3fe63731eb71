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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use wgpu::util::DeviceExt;

use tricull_core::math::Extent2D;
use tricull_core::renderer::api::{
    BufferDescriptor, BufferId, CommandBufferId, ReadbackId, SubmissionIndex, TextureDescriptor,
    TextureFormat, TextureId, TextureUsage,
};
use tricull_core::renderer::{CommandEncoder, GraphicsDevice, ResourceError};

use super::context::WgpuGraphicsContext;
use super::conversions::IntoWgpu;
use super::encoder::WgpuCommandEncoder;
use super::pipelines::Pipelines;

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: Arc<wgpu::Buffer>,
}

#[derive(Debug)]
pub(crate) struct WgpuTextureEntry {
    pub(crate) wgpu_texture: Arc<wgpu::Texture>,
    pub(crate) wgpu_view: Arc<wgpu::TextureView>,
    pub(crate) format: TextureFormat,
    pub(crate) extent: Extent2D,
    pub(crate) usage: TextureUsage,
}

type MapState = Arc<Mutex<Option<Result<(), wgpu::BufferAsyncError>>>>;

#[derive(Debug)]
struct ReadbackSlot {
    buffer: Arc<wgpu::Buffer>,
    offset: u64,
    size: u64,
    state: MapState,
}

/// The internal, non-clonable state of the WgpuDevice.
#[derive(Debug)]
struct WgpuDeviceInternal {
    context: WgpuGraphicsContext,
    pub(crate) pipelines: Pipelines,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    readbacks: Mutex<HashMap<ReadbackId, ReadbackSlot>>,

    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_readback_id: AtomicU64,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,
    /// A thread-safe counter to generate unique command buffer IDs.
    command_buffer_id_counter: AtomicU64,
    next_submission: AtomicU64,
    /// One past the highest submission the queue reported as done.
    completed_submissions: Arc<AtomicU64>,
}

/// A clonable, thread-safe handle to the WGPU graphics device.
/// It wraps the actual device state (`WgpuDeviceInternal`) in an Arc,
/// allowing it to be shared with command encoders.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

impl WgpuDevice {
    /// Wraps a context and builds every pipeline the backend needs.
    pub fn new(context: WgpuGraphicsContext) -> Self {
        let pipelines = Pipelines::new(&context.device);
        log::info!(
            "WgpuDevice ready on \"{}\" ({:?}, {:?})",
            context.adapter_name,
            context.adapter_backend,
            context.adapter_device_type
        );
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                pipelines,
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                readbacks: Mutex::new(HashMap::new()),
                next_buffer_id: AtomicUsize::new(0),
                next_texture_id: AtomicUsize::new(0),
                next_readback_id: AtomicU64::new(0),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicU64::new(0),
                next_submission: AtomicU64::new(0),
                completed_submissions: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Creates a headless context and a device on it.
    pub fn new_headless() -> anyhow::Result<Self> {
        Ok(Self::new(WgpuGraphicsContext::new_headless()?))
    }

    pub(crate) fn wgpu_device(&self) -> &wgpu::Device {
        &self.internal.context.device
    }

    pub(crate) fn pipelines(&self) -> &Pipelines {
        &self.internal.pipelines
    }

    /// Retrieves a reference-counted pointer to the internal WGPU buffer.
    /// Returns `None` if the ID is invalid.
    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        let buffers = lock(&self.internal.buffers, "buffers").ok()?;
        buffers.get(&id).map(|entry| Arc::clone(&entry.wgpu_buffer))
    }

    /// Retrieves the view and metadata of a texture.
    pub(crate) fn get_wgpu_texture(
        &self,
        id: TextureId,
    ) -> Option<(Arc<wgpu::TextureView>, TextureFormat, Extent2D)> {
        let textures = lock(&self.internal.textures, "textures").ok()?;
        textures
            .get(&id)
            .map(|entry| (Arc::clone(&entry.wgpu_view), entry.format, entry.extent))
    }

    /// Polls the underlying wgpu::Device until the queue is idle.
    pub fn poll_device_blocking(&self) {
        let _ = self.wgpu_device().poll(wgpu::Maintain::Wait);
    }

    /// (crate-internal) Registers a finished wgpu::CommandBuffer, storing it
    /// in a map and returning an abstract ID for it.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let new_id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        match lock(&self.internal.pending_command_buffers, "command buffers") {
            Ok(mut guard) => {
                guard.insert(new_id, buffer);
            }
            Err(e) => log::error!("WgpuDevice: dropping command buffer {new_id:?}: {e}"),
        }
        new_id
    }

    fn insert_buffer(&self, buffer: wgpu::Buffer) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(buffer),
            },
        );
        Ok(id)
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        if descriptor.size == 0 {
            return Err(ResourceError::InvalidSize { size: 0 });
        }
        let buffer = self.wgpu_device().create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: false,
        });
        let id = self.insert_buffer(buffer)?;
        log::debug!(
            "WgpuDevice: Created buffer '{}' ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        if data.is_empty() {
            return Err(ResourceError::InvalidSize { size: 0 });
        }
        let buffer = self
            .wgpu_device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: descriptor.label.as_deref(),
                contents: data,
                usage: descriptor.usage.into_wgpu(),
            });
        let id = self.insert_buffer(buffer)?;
        log::debug!(
            "WgpuDevice: Created buffer '{}' with initial data. ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            data.len()
        );
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > buffer.size() {
            return Err(ResourceError::OutOfBounds);
        }
        self.internal.context.queue.write_buffer(&buffer, offset, data);
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        entry.wgpu_buffer.destroy();
        log::debug!("WgpuDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.area() == 0 {
            return Err(ResourceError::InvalidSize { size: 0 });
        }
        let texture = self.wgpu_device().create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size.into_wgpu(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.into_wgpu(),
            usage: descriptor.usage.into_wgpu(),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId(self.internal.next_texture_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.textures, "textures")?.insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(texture),
                wgpu_view: Arc::new(view),
                format: descriptor.format,
                extent: descriptor.size,
                usage: descriptor.usage,
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.textures, "textures")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        entry.wgpu_texture.destroy();
        Ok(())
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = self
            .wgpu_device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Box::new(WgpuCommandEncoder::new(self.clone(), encoder))
    }

    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionIndex, ResourceError> {
        let buffer = lock(&self.internal.pending_command_buffers, "command buffers")?
            .remove(&command_buffer)
            .ok_or(ResourceError::InvalidHandle)?;

        let index = self.internal.next_submission.fetch_add(1, Ordering::SeqCst);
        let queue = &self.internal.context.queue;
        queue.submit(std::iter::once(buffer));

        let completed = Arc::clone(&self.internal.completed_submissions);
        queue.on_submitted_work_done(move || {
            completed.fetch_max(index + 1, Ordering::SeqCst);
        });
        Ok(SubmissionIndex(index))
    }

    fn is_submission_complete(&self, submission: SubmissionIndex) -> bool {
        self.internal.completed_submissions.load(Ordering::SeqCst) > submission.0
    }

    fn poll(&self) {
        let _ = self.wgpu_device().poll(wgpu::Maintain::Poll);
    }

    fn request_readback(
        &self,
        buffer: BufferId,
        offset: u64,
        size: u64,
    ) -> Result<ReadbackId, ResourceError> {
        let wgpu_buffer = self.get_wgpu_buffer(buffer).ok_or(ResourceError::NotFound)?;
        if !wgpu_buffer.usage().contains(wgpu::BufferUsages::MAP_READ) {
            return Err(ResourceError::Readback(format!(
                "buffer {buffer:?} was not created with MAP_READ"
            )));
        }
        if size == 0 || offset + size > wgpu_buffer.size() {
            return Err(ResourceError::OutOfBounds);
        }

        let state: MapState = Arc::new(Mutex::new(None));
        let state_for_callback = Arc::clone(&state);
        wgpu_buffer
            .slice(offset..offset + size)
            .map_async(wgpu::MapMode::Read, move |result| {
                if let Ok(mut slot) = state_for_callback.lock() {
                    *slot = Some(result);
                }
            });

        let id = ReadbackId(self.internal.next_readback_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.readbacks, "readbacks")?.insert(
            id,
            ReadbackSlot {
                buffer: wgpu_buffer,
                offset,
                size,
                state,
            },
        );
        Ok(id)
    }

    fn try_take_readback(&self, id: ReadbackId) -> Option<Result<Vec<u8>, ResourceError>> {
        let mut readbacks = match lock(&self.internal.readbacks, "readbacks") {
            Ok(guard) => guard,
            Err(e) => return Some(Err(e)),
        };
        let Some(slot) = readbacks.get(&id) else {
            return Some(Err(ResourceError::NotFound));
        };
        let outcome = match slot.state.lock() {
            Ok(mut state) => state.take(),
            Err(e) => {
                return Some(Err(ResourceError::BackendError(format!(
                    "Mutex poisoned (readback): {e}"
                ))))
            }
        }?;

        let slot = readbacks.remove(&id)?;
        Some(match outcome {
            Ok(()) => {
                let data = slot
                    .buffer
                    .slice(slot.offset..slot.offset + slot.size)
                    .get_mapped_range()
                    .to_vec();
                slot.buffer.unmap();
                Ok(data)
            }
            Err(e) => Err(ResourceError::Readback(format!("map_async failed: {e}"))),
        })
    }

    fn cancel_readback(&self, id: ReadbackId) {
        if let Ok(mut readbacks) = lock(&self.internal.readbacks, "readbacks") {
            if let Some(slot) = readbacks.remove(&id) {
                slot.buffer.unmap();
                log::debug!("WgpuDevice: Cancelled readback {id:?}");
            }
        }
    }

    fn read_texture(&self, id: TextureId) -> Result<Vec<u32>, ResourceError> {
        let (texture, format, extent, usage) = {
            let textures = lock(&self.internal.textures, "textures")?;
            let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
            (
                Arc::clone(&entry.wgpu_texture),
                entry.format,
                entry.extent,
                entry.usage,
            )
        };
        if !usage.contains(TextureUsage::COPY_SRC) {
            return Err(ResourceError::Readback(format!(
                "texture {id:?} was not created with COPY_SRC"
            )));
        }

        let bytes_per_row = padded_bytes_per_row(extent.width);
        let staging = self.wgpu_device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("read_texture_staging"),
            size: u64::from(bytes_per_row) * u64::from(extent.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .wgpu_device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read_texture"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: if format.is_depth() {
                    wgpu::TextureAspect::DepthOnly
                } else {
                    wgpu::TextureAspect::All
                },
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(extent.height),
                },
            },
            extent.into_wgpu(),
        );
        self.internal
            .context
            .queue
            .submit(std::iter::once(encoder.finish()));

        let state: MapState = Arc::new(Mutex::new(None));
        let state_for_callback = Arc::clone(&state);
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                if let Ok(mut slot) = state_for_callback.lock() {
                    *slot = Some(result);
                }
            });
        self.poll_device_blocking();

        let mapped = lock(&state, "read_texture")?.take();
        match mapped {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(ResourceError::Readback(format!("map_async failed: {e}"))),
            None => return Err(ResourceError::Readback("mapping did not complete".into())),
        }

        let texels = {
            let data = staging.slice(..).get_mapped_range();
            let row_len = (extent.width * 4) as usize;
            let mut texels = Vec::with_capacity(extent.area() as usize);
            for row in data.chunks(bytes_per_row as usize) {
                texels.extend(bytemuck::pod_collect_to_vec::<u8, u32>(&row[..row_len]));
            }
            texels
        };
        staging.unmap();
        Ok(texels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }
}
