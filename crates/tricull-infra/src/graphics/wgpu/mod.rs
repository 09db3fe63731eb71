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

//! Headless wgpu backend.
//!
//! Every semantic command maps onto a fixed WGSL pipeline: the triangle-ID
//! pass, the atomic histogram compute kernel and four shading paths.

mod context;
mod conversions;
mod device;
mod encoder;
mod pipelines;

pub use context::WgpuGraphicsContext;
pub use conversions::IntoWgpu;
pub use device::WgpuDevice;
pub use encoder::WgpuCommandEncoder;
