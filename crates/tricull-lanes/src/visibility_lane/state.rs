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

//! Host-side state of the visibility pipeline.

use tricull_core::math::Extent2D;

/// Data mutated by the extraction cycle. Lives from first activation until
/// the lane is disposed or prepared again.
#[derive(Debug, Clone)]
pub struct VisibilityState {
    /// Size of the ID target the histogram was built from.
    pub id_target_size: Extent2D,
    /// Host copy of the per-triangle pixel counters.
    pub presence_histogram: Vec<u32>,
    /// The last published visible set, ascending.
    pub visible_triangle_ids: Vec<u32>,
    /// Compaction position inside `presence_histogram`.
    pub cursor: usize,
}

impl VisibilityState {
    /// Creates an empty state for `triangle_count` triangles.
    pub fn new(id_target_size: Extent2D, triangle_count: u32) -> Self {
        Self {
            id_target_size,
            presence_histogram: vec![0; triangle_count as usize],
            visible_triangle_ids: Vec::new(),
            cursor: 0,
        }
    }
}

/// Counters reported by the culled lane's overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityStats {
    /// Cycles that reached publish.
    pub cycles_completed: u64,
    /// Published cycles that dropped visible triangles.
    pub truncated_cycles: u64,
    /// Size of the last published set.
    pub last_visible_count: usize,
    /// Steps taken by the last completed cycle.
    pub last_cycle_steps: u32,
}
