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

use crate::renderer::api::buffer::{BufferDescriptor, BufferId, ReadbackId};
use crate::renderer::api::command::{CommandBufferId, SubmissionIndex};
use crate::renderer::api::texture::{TextureDescriptor, TextureId};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The main interface for creating and managing GPU resources and submitting work.
///
/// Every query on this trait is non-blocking. Asynchronous work (queue
/// submissions, buffer mappings) makes progress when [`GraphicsDevice::poll`]
/// is called, which a lane does once per step.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new zero-initialised GPU buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer and initializes it with the provided data.
    /// The buffer is exactly `data.len()` bytes long.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Writes data to a GPU buffer. The write is ordered before the next submission.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Creates a new GPU texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a GPU texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a new command encoder to record GPU commands.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a recorded command buffer to the queue.
    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionIndex, ResourceError>;

    /// Whether the GPU has finished executing `submission`.
    fn is_submission_complete(&self, submission: SubmissionIndex) -> bool;

    /// Drives pending callbacks without blocking.
    fn poll(&self);

    /// Starts an asynchronous copy of `size` bytes of a `MAP_READ` buffer to the host.
    ///
    /// The data reflects every submission made before the request.
    fn request_readback(
        &self,
        buffer: BufferId,
        offset: u64,
        size: u64,
    ) -> Result<ReadbackId, ResourceError>;

    /// Returns the readback result once it is available, consuming it.
    /// `None` means the transfer is still in flight.
    fn try_take_readback(&self, id: ReadbackId) -> Option<Result<Vec<u8>, ResourceError>>;

    /// Abandons an in-flight readback and releases its mapping.
    fn cancel_readback(&self, id: ReadbackId);

    /// Blocking copy of a texture's texels, one `u32` per pixel in row-major order.
    ///
    /// Meant for debugging and tests, never for the frame loop.
    fn read_texture(&self, id: TextureId) -> Result<Vec<u32>, ResourceError>;
}
