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

//! Usage flags for buffers and textures.

/// A set of flags describing the allowed usages of a buffer.
///
/// The bit values match `wgpu::BufferUsages`, so backends can convert with a plain
/// `from_bits_truncate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferUsage {
    bits: u32,
}

impl BufferUsage {
    /// No usage.
    pub const NONE: Self = Self { bits: 0 };
    /// The buffer can be mapped for reading on the CPU.
    pub const MAP_READ: Self = Self { bits: 1 << 0 };
    /// The buffer can be mapped for writing on the CPU.
    pub const MAP_WRITE: Self = Self { bits: 1 << 1 };
    /// The buffer can be used as the source of a copy operation.
    pub const COPY_SRC: Self = Self { bits: 1 << 2 };
    /// The buffer can be used as the destination of a copy operation.
    pub const COPY_DST: Self = Self { bits: 1 << 3 };
    /// The buffer can be bound as an index buffer.
    pub const INDEX: Self = Self { bits: 1 << 4 };
    /// The buffer can be bound as a vertex buffer.
    pub const VERTEX: Self = Self { bits: 1 << 5 };
    /// The buffer can be bound as a uniform buffer.
    pub const UNIFORM: Self = Self { bits: 1 << 6 };
    /// The buffer can be bound as a storage buffer.
    pub const STORAGE: Self = Self { bits: 1 << 7 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks if every flag of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// A set of flags describing the allowed usages of a texture.
///
/// Bit values match `wgpu::TextureUsages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureUsage {
    bits: u32,
}

impl TextureUsage {
    /// The texture can be used as the source of a copy operation.
    pub const COPY_SRC: Self = Self { bits: 1 << 0 };
    /// The texture can be used as the destination of a copy operation.
    pub const COPY_DST: Self = Self { bits: 1 << 1 };
    /// The texture can be bound in a shader for reading.
    pub const TEXTURE_BINDING: Self = Self { bits: 1 << 2 };
    /// The texture can be used as a storage texture.
    pub const STORAGE_BINDING: Self = Self { bits: 1 << 3 };
    /// The texture can be used as a colour or depth attachment in a render pass.
    pub const RENDER_ATTACHMENT: Self = Self { bits: 1 << 4 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks if every flag of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_usage_contains_its_parts() {
        let usage = BufferUsage::MAP_READ | BufferUsage::COPY_DST;
        assert!(usage.contains(BufferUsage::MAP_READ));
        assert!(usage.contains(BufferUsage::COPY_DST));
        assert!(!usage.contains(BufferUsage::STORAGE));
    }
}
