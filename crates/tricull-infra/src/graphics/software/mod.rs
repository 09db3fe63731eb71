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

//! CPU reference implementation of the graphics device.
//!
//! Used by tests and by hosts without a GPU. It executes the same semantic
//! commands as the wgpu backend: the triangle-ID pass, the presence
//! histogram, buffer copies, staged readbacks and the five draw primitives.

mod device;
mod encoder;
mod rasterizer;

pub use device::SoftwareDevice;
pub use encoder::SoftwareCommandEncoder;
