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

//! Visibility lane - GPU-driven triangle culling through a triangle-ID buffer.
//!
//! The extraction cycle runs cooperatively inside [`DrawLane::step`]:
//!
//! 1. `RenderIds`: clear the histogram, render the unpacked batch with an
//!    inflated camera into an `R32Uint` target, count pixels per triangle.
//! 2. `AwaitGpu`: wait for that submission without blocking.
//! 3. `Readback`: stream the histogram to the host, one chunk per step.
//! 4. `Compact`: scan a fraction of the histogram per step, then publish.
//!
//! [`DrawLane::step`]: tricull_core::DrawLane::step

mod compaction;
mod culled_lane;
mod cycle;
mod readback;
mod settings;
mod state;

pub use compaction::*;
pub use culled_lane::*;
pub use cycle::*;
pub use readback::*;
pub use settings::*;
pub use state::*;
