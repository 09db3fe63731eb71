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

//! # Tricull Core
//!
//! Foundational crate containing math, mesh packing and the interface
//! contracts (graphics device, command encoder, draw lane) shared by the
//! lanes and the device backends.

#![warn(missing_docs)]

pub mod lane;
pub mod math;
pub mod packing;
pub mod renderer;

pub use lane::{DrawLane, FrameContext, LaneError, StepOutcome};
