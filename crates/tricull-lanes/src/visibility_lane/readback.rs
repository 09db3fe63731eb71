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

//! Chunked device-to-host transfer of the presence histogram.

use std::sync::Arc;
use tricull_core::renderer::{
    api::{BufferId, ReadbackId},
    GraphicsDevice, ResourceError,
};

/// Progress reported by [`StagedReadback::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackProgress {
    /// The current chunk is still in flight.
    Pending,
    /// A chunk landed and the next one was issued.
    Chunk {
        /// Chunks received so far.
        received: u64,
        /// Total number of chunks.
        total: u64,
    },
    /// Every chunk has been received.
    Complete,
}

#[derive(Debug, Clone, Copy)]
struct InFlightChunk {
    offset: u64,
    size: u64,
    readback: ReadbackId,
}

/// Copies a source buffer to the host through a small staging buffer,
/// one chunk at a time.
///
/// Each chunk is copied into the staging buffer, submitted, and mapped
/// asynchronously. [`advance`](Self::advance) never blocks: it either finds
/// the chunk still in flight or stores it and issues the next one.
#[derive(Debug)]
pub struct StagedReadback {
    total_bytes: u64,
    chunk_bytes: u64,
    next_offset: u64,
    received: u64,
    in_flight: Option<InFlightChunk>,
}

impl StagedReadback {
    /// Plans the transfer of `total_bytes` in chunks of at most `chunk_bytes`.
    pub fn new(total_bytes: u64, chunk_bytes: u64) -> Self {
        Self {
            total_bytes,
            chunk_bytes: chunk_bytes.max(4),
            next_offset: 0,
            received: 0,
            in_flight: None,
        }
    }

    /// Number of chunks the transfer is split into.
    pub fn chunk_count(&self) -> u64 {
        self.total_bytes.div_ceil(self.chunk_bytes)
    }

    /// Whether a chunk is currently mapped or being mapped.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn issue_next(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        source: BufferId,
        staging: BufferId,
    ) -> Result<(), ResourceError> {
        let offset = self.next_offset;
        let size = self.chunk_bytes.min(self.total_bytes - offset);

        let mut encoder = device.create_command_encoder(Some("histogram_readback_chunk"));
        encoder.copy_buffer_to_buffer(source, offset, staging, 0, size);
        device.submit_command_buffer(encoder.finish())?;
        let readback = device.request_readback(staging, 0, size)?;

        self.next_offset += size;
        self.in_flight = Some(InFlightChunk {
            offset,
            size,
            readback,
        });
        log::trace!("Readback chunk issued: {size} bytes at offset {offset}");
        Ok(())
    }

    /// Moves the transfer forward without blocking, writing landed chunks into `host`.
    ///
    /// `host` must hold `total_bytes / 4` words.
    pub fn advance(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        source: BufferId,
        staging: BufferId,
        host: &mut [u32],
    ) -> Result<ReadbackProgress, ResourceError> {
        let Some(chunk) = self.in_flight else {
            if self.next_offset >= self.total_bytes {
                return Ok(ReadbackProgress::Complete);
            }
            self.issue_next(device, source, staging)?;
            return Ok(ReadbackProgress::Pending);
        };

        let bytes = match device.try_take_readback(chunk.readback) {
            None => return Ok(ReadbackProgress::Pending),
            Some(result) => result?,
        };
        self.in_flight = None;

        if bytes.len() as u64 != chunk.size {
            return Err(ResourceError::Readback(format!(
                "expected {} bytes, received {}",
                chunk.size,
                bytes.len()
            )));
        }
        let start = (chunk.offset / 4) as usize;
        let words: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes);
        host.get_mut(start..start + words.len())
            .ok_or(ResourceError::OutOfBounds)?
            .copy_from_slice(&words);
        self.received += 1;

        if self.next_offset >= self.total_bytes {
            return Ok(ReadbackProgress::Complete);
        }
        self.issue_next(device, source, staging)?;
        Ok(ReadbackProgress::Chunk {
            received: self.received,
            total: self.chunk_count(),
        })
    }

    /// Abandons the chunk in flight, if any.
    pub fn cancel(&mut self, device: &Arc<dyn GraphicsDevice>) {
        if let Some(chunk) = self.in_flight.take() {
            device.cancel_readback(chunk.readback);
            log::debug!("Cancelled readback chunk at offset {}", chunk.offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(StagedReadback::new(100, 32).chunk_count(), 4);
        assert_eq!(StagedReadback::new(64, 32).chunk_count(), 2);
        assert_eq!(StagedReadback::new(0, 32).chunk_count(), 0);
    }
}
