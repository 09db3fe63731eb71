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

//! Error type for GPU resource operations.

use std::fmt;

/// An error related to the creation or use of a GPU resource (buffers, textures, readbacks).
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An attempt was made to access a resource out of its bounds (e.g., in a buffer).
    OutOfBounds,
    /// A zero-sized or misaligned resource was requested.
    InvalidSize {
        /// The offending size in bytes.
        size: u64,
    },
    /// A device-to-host readback failed or was cancelled.
    Readback(String),
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::InvalidSize { size } => {
                write!(f, "Invalid resource size: {size} bytes")
            }
            ResourceError::Readback(msg) => write!(f, "Readback failed: {msg}"),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_error_display() {
        assert_eq!(
            format!("{}", ResourceError::InvalidSize { size: 3 }),
            "Invalid resource size: 3 bytes"
        );
        assert_eq!(
            format!("{}", ResourceError::Readback("cancelled".to_string())),
            "Readback failed: cancelled"
        );
    }
}
