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

//! Owning handles that release their device resource when dropped.

use super::buffer::{BufferDescriptor, BufferId};
use super::texture::{TextureDescriptor, TextureId};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::fmt;
use std::sync::Arc;

/// A buffer owned by a lane. Destroyed on the device when dropped.
pub struct OwnedBuffer {
    id: BufferId,
    size: u64,
    device: Arc<dyn GraphicsDevice>,
}

impl OwnedBuffer {
    /// Allocates an uninitialised (zeroed) buffer.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &BufferDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_buffer(descriptor)?;
        Ok(Self {
            id,
            size: descriptor.size,
            device: Arc::clone(device),
        })
    }

    /// Allocates a buffer initialised with `data`. The descriptor size is ignored.
    pub fn with_data(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<Self, ResourceError> {
        let id = device.create_buffer_with_data(descriptor, data)?;
        Ok(Self {
            id,
            size: data.len() as u64,
            device: Arc::clone(device),
        })
    }

    /// The device handle.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_buffer(self.id) {
            log::warn!("Failed to destroy buffer {:?}: {}", self.id, e);
        }
    }
}

impl fmt::Debug for OwnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

/// A texture owned by a lane. Destroyed on the device when dropped.
pub struct OwnedTexture {
    id: TextureId,
    device: Arc<dyn GraphicsDevice>,
}

impl OwnedTexture {
    /// Allocates a texture.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &TextureDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_texture(descriptor)?;
        Ok(Self {
            id,
            device: Arc::clone(device),
        })
    }

    /// The device handle.
    pub fn id(&self) -> TextureId {
        self.id
    }
}

impl Drop for OwnedTexture {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_texture(self.id) {
            log::warn!("Failed to destroy texture {:?}: {}", self.id, e);
        }
    }
}

impl fmt::Debug for OwnedTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedTexture").field("id", &self.id).finish()
    }
}
