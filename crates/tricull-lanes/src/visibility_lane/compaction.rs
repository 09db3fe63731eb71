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

//! Host-side compaction of the presence histogram into a visible-ID list.

/// Result of a finished scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactedIds {
    /// Triangle IDs with a non-zero count, ascending.
    pub ids: Vec<u32>,
    /// Whether non-zero IDs were dropped because the capacity was reached.
    pub truncated: bool,
}

/// Compacts a whole histogram in one go.
pub fn compact(histogram: &[u32], capacity: usize) -> CompactedIds {
    let mut scan = CompactionScan::new(histogram.len(), 1.0, capacity);
    while !scan.advance(histogram) {}
    scan.finish()
}

/// A resumable scan over the histogram, a bounded slice per step.
///
/// IDs are appended in ascending order. Once `capacity` IDs are held, the
/// next non-zero entry marks the result as truncated and ends the scan, so
/// the lowest IDs are the ones kept.
#[derive(Debug, Clone)]
pub struct CompactionScan {
    cursor: usize,
    len: usize,
    chunk_len: usize,
    capacity: usize,
    ids: Vec<u32>,
    truncated: bool,
}

impl CompactionScan {
    /// Prepares a scan of `len` entries that covers `fraction` of them per step.
    pub fn new(len: usize, fraction: f32, capacity: usize) -> Self {
        let chunk_len = ((len as f64 * f64::from(fraction)).ceil() as usize).max(1);
        Self {
            cursor: 0,
            len,
            chunk_len,
            capacity,
            ids: Vec::new(),
            truncated: false,
        }
    }

    /// Scans the next slice. Returns `true` once the scan is complete.
    pub fn advance(&mut self, histogram: &[u32]) -> bool {
        if self.is_done() {
            return true;
        }
        let end = (self.cursor + self.chunk_len).min(self.len);
        let slice = histogram.get(self.cursor..end).unwrap_or_default();
        for (offset, &count) in slice.iter().enumerate() {
            if count == 0 {
                continue;
            }
            if self.ids.len() == self.capacity {
                self.truncated = true;
                break;
            }
            self.ids.push((self.cursor + offset) as u32);
        }
        self.cursor = if self.truncated { self.len } else { end };
        self.is_done()
    }

    /// Whether every entry has been scanned or the capacity overflowed.
    pub fn is_done(&self) -> bool {
        self.cursor >= self.len
    }

    /// Entries scanned so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Consumes the scan and returns the compacted list.
    pub fn finish(self) -> CompactedIds {
        CompactedIds {
            ids: self.ids,
            truncated: self.truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn zero_counts_are_excluded_and_order_is_ascending() {
        let result = compact(&[0, 3, 0, 0, 1, 7, 0], 16);
        assert_eq!(result.ids, vec![1, 4, 5]);
        assert!(!result.truncated);
    }

    #[test]
    fn compacting_its_own_output_is_a_fixed_point() {
        let histogram = [2, 0, 5, 0, 0, 9, 1];
        let first = compact(&histogram, 16);

        let mut rebuilt = vec![0u32; histogram.len()];
        for &id in &first.ids {
            rebuilt[id as usize] = 1;
        }
        assert_eq!(compact(&rebuilt, 16), first);
    }

    #[test]
    fn unchanged_histogram_compacts_to_the_same_list() {
        let histogram = [2, 0, 5, 0, 0, 9, 1];
        assert_eq!(compact(&histogram, 16), compact(&histogram, 16));
        assert_eq!(compact(&histogram, 2), compact(&histogram, 2));
    }

    #[test]
    fn chunked_scan_matches_one_shot_compaction() {
        let mut rng = StdRng::seed_from_u64(0x7c0ffee);
        for _ in 0..2000 {
            let len: usize = rng.gen_range(0..300);
            let histogram: Vec<u32> = (0..len)
                .map(|_| if rng.gen_bool(0.3) { rng.gen_range(1..50) } else { 0 })
                .collect();
            let capacity = rng.gen_range(0..=len + 1);
            let fraction: f32 = rng.gen_range(0.01..=1.0);

            let one_shot = compact(&histogram, capacity);
            let mut scan = CompactionScan::new(len, fraction, capacity);
            while !scan.advance(&histogram) {}
            let chunked = scan.finish();
            assert_eq!(
                chunked, one_shot,
                "len {len}, capacity {capacity}, fraction {fraction}"
            );
            assert_eq!(compact(&histogram, capacity), one_shot);

            let non_zero = histogram.iter().filter(|&&count| count != 0).count();
            assert_eq!(one_shot.ids.len(), non_zero.min(capacity));
            assert_eq!(one_shot.truncated, non_zero > capacity);
            assert!(one_shot.ids.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn capacity_keeps_lowest_ids_and_flags_truncation() {
        let result = compact(&[1, 1, 1, 1, 1], 3);
        assert_eq!(result.ids, vec![0, 1, 2]);
        assert!(result.truncated);
    }

    #[test]
    fn exact_capacity_is_not_truncation() {
        let result = compact(&[0, 1, 1, 0], 2);
        assert_eq!(result.ids, vec![1, 2]);
        assert!(!result.truncated);
    }

    #[test]
    fn scan_takes_ceil_of_fraction_steps() {
        let histogram = vec![1u32; 25];
        let mut scan = CompactionScan::new(histogram.len(), 0.1, 100);
        let mut steps = 1;
        while !scan.advance(&histogram) {
            steps += 1;
        }
        assert_eq!(steps, 9, "3 entries per step over 25 entries");
        assert_eq!(scan.finish().ids.len(), 25);
    }

    #[test]
    fn empty_histogram_finishes_immediately() {
        let mut scan = CompactionScan::new(0, 0.1, 4);
        assert!(scan.is_done());
        assert!(scan.advance(&[]));
        assert_eq!(scan.finish(), CompactedIds::default());
    }
}
