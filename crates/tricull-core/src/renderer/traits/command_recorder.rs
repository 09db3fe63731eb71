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

use crate::math::LinearRgba;
use crate::renderer::api::buffer::BufferId;
use crate::renderer::api::command::{
    CommandBufferId, DrawCommand, HistogramPassDescriptor, IdPassDescriptor, RenderTarget,
    ViewUniforms,
};

/// A trait for an object that records a sequence of GPU commands.
///
/// A `CommandEncoder` is the main tool for building a [`CommandBufferId`]. Recording
/// is deferred: nothing runs until the finished buffer is handed to
/// `GraphicsDevice::submit_command_buffer`, and missing resources are reported there.
///
/// Commands execute in recording order.
pub trait CommandEncoder: Send {
    /// Fills a whole buffer with zeros.
    fn clear_buffer(&mut self, buffer: BufferId);

    /// Clears a colour target to `color` and its depth attachment to 1.0.
    fn clear_target(&mut self, target: &RenderTarget, color: LinearRgba);

    /// Renders triangle IDs (`triangle_id + 1`) into an `R32Uint` target.
    fn render_triangle_ids(&mut self, descriptor: &IdPassDescriptor);

    /// Accumulates the per-triangle pixel histogram of an ID target.
    fn accumulate_histogram(&mut self, descriptor: &HistogramPassDescriptor);

    /// Copies `size` bytes between two buffers.
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Records one shaded draw into `target`, loading its current contents.
    fn draw(&mut self, target: &RenderTarget, view: &ViewUniforms, command: &DrawCommand);

    /// Finalizes the recording and returns a handle to the command buffer.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
