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

use super::encoder::{Executor, RecordedCommand, SoftwareCommandEncoder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tricull_core::{
    math::Extent2D,
    renderer::{
        api::{
            BufferDescriptor, BufferId, BufferUsage, CommandBufferId, ReadbackId,
            SubmissionIndex, TextureDescriptor, TextureFormat, TextureId,
        },
        CommandEncoder, GraphicsDevice, ResourceError,
    },
};

#[derive(Debug)]
pub(crate) struct SoftwareBuffer {
    pub(crate) data: Vec<u8>,
    pub(crate) usage: BufferUsage,
}

#[derive(Debug)]
pub(crate) struct SoftwareTexture {
    pub(crate) extent: Extent2D,
    pub(crate) format: TextureFormat,
    /// One `u32` per pixel: an ID, packed `rgba8`, or `f32` depth bits.
    pub(crate) texels: Vec<u32>,
}

#[derive(Debug)]
struct PendingReadback {
    result: Result<Vec<u8>, ResourceError>,
    polls_remaining: u32,
}

/// Work that becomes visible to the host only after enough polls.
#[derive(Debug, Default)]
struct Timeline {
    /// Submissions still "in flight" with the polls they still need.
    in_flight: Vec<(SubmissionIndex, u32)>,
    readbacks: HashMap<ReadbackId, PendingReadback>,
}

#[derive(Debug)]
struct SoftwareDeviceInternal {
    buffers: Mutex<HashMap<BufferId, SoftwareBuffer>>,
    textures: Mutex<HashMap<TextureId, SoftwareTexture>>,
    pending_command_buffers: Mutex<HashMap<CommandBufferId, Vec<RecordedCommand>>>,
    timeline: Mutex<Timeline>,

    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    command_buffer_id_counter: AtomicU64,
    next_submission: AtomicU64,
    next_readback: AtomicU64,

    latency_polls: u32,
}

/// A CPU implementation of [`GraphicsDevice`].
///
/// Commands run synchronously at submit time, but completion of submissions
/// and readbacks is only reported after `latency_polls` calls to
/// [`GraphicsDevice::poll`], so callers exercise the same non-blocking paths
/// they take against a real GPU. Cloning shares the device state.
#[derive(Clone, Debug)]
pub struct SoftwareDevice {
    internal: Arc<SoftwareDeviceInternal>,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

impl SoftwareDevice {
    /// Creates a device whose asynchronous work completes after one poll.
    pub fn new() -> Self {
        Self::with_latency(1)
    }

    /// Creates a device whose asynchronous work completes after `polls` polls.
    /// With zero, work is complete as soon as it is submitted.
    pub fn with_latency(polls: u32) -> Self {
        Self {
            internal: Arc::new(SoftwareDeviceInternal {
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                pending_command_buffers: Mutex::new(HashMap::new()),
                timeline: Mutex::new(Timeline::default()),
                next_buffer_id: AtomicUsize::new(0),
                next_texture_id: AtomicUsize::new(0),
                command_buffer_id_counter: AtomicU64::new(0),
                next_submission: AtomicU64::new(0),
                next_readback: AtomicU64::new(0),
                latency_polls: polls,
            }),
        }
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        lock(&self.internal.buffers, "buffers").map_or(0, |b| b.len())
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        lock(&self.internal.textures, "textures").map_or(0, |t| t.len())
    }

    /// Number of readbacks requested but neither taken nor cancelled.
    pub fn pending_readback_count(&self) -> usize {
        lock(&self.internal.timeline, "timeline").map_or(0, |t| t.readbacks.len())
    }

    /// Copy of a buffer's contents.
    pub fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        let buffers = lock(&self.internal.buffers, "buffers")?;
        Ok(buffers.get(&id).ok_or(ResourceError::NotFound)?.data.clone())
    }

    pub(crate) fn register_command_buffer(
        &self,
        commands: Vec<RecordedCommand>,
    ) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        match lock(&self.internal.pending_command_buffers, "command buffers") {
            Ok(mut pending) => {
                pending.insert(id, commands);
            }
            Err(e) => log::error!("SoftwareDevice: dropping command buffer {id:?}: {e}"),
        }
        id
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        if descriptor.size == 0 {
            return Err(ResourceError::InvalidSize { size: 0 });
        }
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            SoftwareBuffer {
                data: vec![0; descriptor.size as usize],
                usage: descriptor.usage,
            },
        );
        log::trace!(
            "SoftwareDevice: created buffer '{}' {id:?} ({} bytes)",
            descriptor.label.as_deref().unwrap_or_default(),
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
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            SoftwareBuffer {
                data: data.to_vec(),
                usage: descriptor.usage,
            },
        );
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        buffer
            .data
            .get_mut(start..start + data.len())
            .ok_or(ResourceError::OutOfBounds)?
            .copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let area = descriptor.size.area();
        if area == 0 {
            return Err(ResourceError::InvalidSize { size: 0 });
        }
        let initial = if descriptor.format.is_depth() {
            1.0f32.to_bits()
        } else {
            0
        };
        let id = TextureId(self.internal.next_texture_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.textures, "textures")?.insert(
            id,
            SoftwareTexture {
                extent: descriptor.size,
                format: descriptor.format,
                texels: vec![initial; area as usize],
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        lock(&self.internal.textures, "textures")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(SoftwareCommandEncoder::new(self.clone(), label))
    }

    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionIndex, ResourceError> {
        let commands = lock(&self.internal.pending_command_buffers, "command buffers")?
            .remove(&command_buffer)
            .ok_or(ResourceError::InvalidHandle)?;

        {
            let mut buffers = lock(&self.internal.buffers, "buffers")?;
            let mut textures = lock(&self.internal.textures, "textures")?;
            let mut executor = Executor {
                buffers: &mut *buffers,
                textures: &mut *textures,
            };
            for command in &commands {
                executor.run(command)?;
            }
        }

        let index = SubmissionIndex(self.internal.next_submission.fetch_add(1, Ordering::SeqCst));
        if self.internal.latency_polls > 0 {
            lock(&self.internal.timeline, "timeline")?
                .in_flight
                .push((index, self.internal.latency_polls));
        }
        Ok(index)
    }

    fn is_submission_complete(&self, submission: SubmissionIndex) -> bool {
        if submission.0 >= self.internal.next_submission.load(Ordering::SeqCst) {
            return false;
        }
        lock(&self.internal.timeline, "timeline")
            .map(|t| t.in_flight.iter().all(|(index, _)| *index != submission))
            .unwrap_or(false)
    }

    fn poll(&self) {
        let Ok(mut timeline) = lock(&self.internal.timeline, "timeline") else {
            log::error!("SoftwareDevice: timeline mutex poisoned during poll");
            return;
        };
        timeline.in_flight.retain_mut(|(_, polls)| {
            *polls -= 1;
            *polls > 0
        });
        for readback in timeline.readbacks.values_mut() {
            readback.polls_remaining = readback.polls_remaining.saturating_sub(1);
        }
    }

    fn request_readback(
        &self,
        buffer: BufferId,
        offset: u64,
        size: u64,
    ) -> Result<ReadbackId, ResourceError> {
        let result = {
            let buffers = lock(&self.internal.buffers, "buffers")?;
            let source = buffers.get(&buffer).ok_or(ResourceError::NotFound)?;
            if !source.usage.contains(BufferUsage::MAP_READ) {
                return Err(ResourceError::Readback(format!(
                    "buffer {buffer:?} was not created with MAP_READ"
                )));
            }
            let start = offset as usize;
            source
                .data
                .get(start..start + size as usize)
                .map(<[u8]>::to_vec)
                .ok_or(ResourceError::OutOfBounds)?
        };

        let id = ReadbackId(self.internal.next_readback.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.timeline, "timeline")?.readbacks.insert(
            id,
            PendingReadback {
                result: Ok(result),
                polls_remaining: self.internal.latency_polls,
            },
        );
        Ok(id)
    }

    fn try_take_readback(&self, id: ReadbackId) -> Option<Result<Vec<u8>, ResourceError>> {
        let mut timeline = match lock(&self.internal.timeline, "timeline") {
            Ok(t) => t,
            Err(e) => return Some(Err(e)),
        };
        let ready = match timeline.readbacks.get(&id) {
            None => return Some(Err(ResourceError::NotFound)),
            Some(pending) => pending.polls_remaining == 0,
        };
        if !ready {
            return None;
        }
        timeline.readbacks.remove(&id).map(|p| p.result)
    }

    fn cancel_readback(&self, id: ReadbackId) {
        if let Ok(mut timeline) = lock(&self.internal.timeline, "timeline") {
            timeline.readbacks.remove(&id);
        }
    }

    fn read_texture(&self, id: TextureId) -> Result<Vec<u32>, ResourceError> {
        let textures = lock(&self.internal.textures, "textures")?;
        let texture = textures.get(&id).ok_or(ResourceError::NotFound)?;
        log::trace!(
            "SoftwareDevice: reading {:?} texture {id:?} ({}x{})",
            texture.format,
            texture.extent.width,
            texture.extent.height
        );
        Ok(texture.texels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tricull_core::math::LinearRgba;
    use tricull_core::renderer::api::{RenderTarget, TextureUsage};

    fn device() -> Arc<dyn GraphicsDevice> {
        Arc::new(SoftwareDevice::new())
    }

    #[test]
    fn submission_completes_after_one_poll() {
        let device = device();
        let encoder = device.create_command_encoder(None);
        let index = device.submit_command_buffer(encoder.finish()).unwrap();
        assert!(!device.is_submission_complete(index));
        device.poll();
        assert!(device.is_submission_complete(index));
    }

    #[test]
    fn zero_latency_completes_on_submit() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::with_latency(0));
        let encoder = device.create_command_encoder(None);
        let index = device.submit_command_buffer(encoder.finish()).unwrap();
        assert!(device.is_submission_complete(index));
        assert!(!device.is_submission_complete(SubmissionIndex(index.0 + 1)));
    }

    #[test]
    fn readback_sees_copies_submitted_before_it() {
        let device = device();
        let source = device
            .create_buffer_with_data(
                &BufferDescriptor::new("src", 0, BufferUsage::COPY_SRC),
                &[1, 2, 3, 4, 5, 6, 7, 8],
            )
            .unwrap();
        let staging = device
            .create_buffer(&BufferDescriptor::new(
                "staging",
                4,
                BufferUsage::MAP_READ | BufferUsage::COPY_DST,
            ))
            .unwrap();

        let mut encoder = device.create_command_encoder(Some("copy"));
        encoder.copy_buffer_to_buffer(source, 4, staging, 0, 4);
        device.submit_command_buffer(encoder.finish()).unwrap();

        let readback = device.request_readback(staging, 0, 4).unwrap();
        assert!(device.try_take_readback(readback).is_none());
        device.poll();
        assert_eq!(device.try_take_readback(readback), Some(Ok(vec![5, 6, 7, 8])));
        assert_eq!(
            device.try_take_readback(readback),
            Some(Err(ResourceError::NotFound))
        );
    }

    #[test]
    fn readback_requires_map_read() {
        let device = device();
        let buffer = device
            .create_buffer(&BufferDescriptor::new("storage", 4, BufferUsage::STORAGE))
            .unwrap();
        assert!(matches!(
            device.request_readback(buffer, 0, 4),
            Err(ResourceError::Readback(_))
        ));
    }

    #[test]
    fn cancelled_readback_is_forgotten() {
        let software = SoftwareDevice::new();
        let device: Arc<dyn GraphicsDevice> = Arc::new(software.clone());
        let staging = device
            .create_buffer(&BufferDescriptor::new("staging", 4, BufferUsage::MAP_READ))
            .unwrap();
        let readback = device.request_readback(staging, 0, 4).unwrap();
        assert_eq!(software.pending_readback_count(), 1);
        device.cancel_readback(readback);
        assert_eq!(software.pending_readback_count(), 0);
    }

    #[test]
    fn clear_target_writes_rgba8_and_resets_depth() {
        let device = device();
        let extent = Extent2D::new(2, 2);
        let color = device
            .create_texture(&TextureDescriptor {
                label: None,
                size: extent,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::RENDER_ATTACHMENT,
            })
            .unwrap();
        let depth = device
            .create_texture(&TextureDescriptor {
                label: None,
                size: extent,
                format: TextureFormat::Depth32Float,
                usage: TextureUsage::RENDER_ATTACHMENT,
            })
            .unwrap();
        let target = RenderTarget {
            color,
            depth: Some(depth),
            extent,
        };

        let mut encoder = device.create_command_encoder(None);
        encoder.clear_target(&target, LinearRgba::RED);
        device.submit_command_buffer(encoder.finish()).unwrap();

        assert_eq!(device.read_texture(color).unwrap(), vec![0xFF00_00FF; 4]);
        assert_eq!(device.read_texture(depth).unwrap(), vec![1.0f32.to_bits(); 4]);
    }

    #[test]
    fn unknown_command_buffer_is_rejected() {
        let device = device();
        assert_eq!(
            device.submit_command_buffer(CommandBufferId(999)),
            Err(ResourceError::InvalidHandle)
        );
    }
}
