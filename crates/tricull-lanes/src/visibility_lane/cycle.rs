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

use super::compaction::CompactionScan;
use super::readback::StagedReadback;
use tricull_core::renderer::api::SubmissionIndex;

/// Where the extraction cycle currently stands.
///
/// Each call to `step` performs at most one bounded piece of work and then
/// either stays in the same phase or moves to the next one.
#[derive(Debug)]
pub enum CyclePhase {
    /// Record and submit the ID pass and the histogram pass.
    RenderIds,
    /// Wait for the ID and histogram work to finish on the GPU.
    AwaitGpu(SubmissionIndex),
    /// Bring the histogram to the host chunk by chunk.
    Readback(StagedReadback),
    /// Scan the host histogram into a visible list, then publish it.
    Compact(CompactionScan),
}

impl CyclePhase {
    /// Short name for overlays and logs.
    pub fn name(&self) -> &'static str {
        match self {
            CyclePhase::RenderIds => "RenderIds",
            CyclePhase::AwaitGpu(_) => "AwaitGpu",
            CyclePhase::Readback(_) => "Readback",
            CyclePhase::Compact(_) => "Compact",
        }
    }
}
