//! Streaming Multiprocessor: a fixed-size group of warps plus a
//! local-memory buffer that gathers per-lane results in (warp, lane)
//! order before they are flattened back to the device.

use rayon::prelude::*;

use crate::alu::OverflowPolicy;
use crate::error::Result;
use crate::warp::Warp;
use crate::workload::OperandPair;

/// How a work chunk was fitted to lane capacity during `distribute`.
///
/// Oversized chunks lose their trailing entries (fixed-lane hardware
/// semantics, silent at this level); undersized chunks are padded with
/// `(0, 0)` pairs whose products are always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkFit {
    pub padded: usize,
    pub truncated: usize,
}

pub struct StreamingMultiprocessor {
    pub id: usize,
    warps: Vec<Warp>,
    /// Result gather buffer, `warps_per_sm * lanes_per_warp` cells in
    /// (warp, lane) order.
    local_mem: Vec<u32>,
    lanes_per_warp: usize,
}

impl StreamingMultiprocessor {
    pub fn new(
        id: usize,
        warps_per_sm: usize,
        lanes_per_warp: usize,
        bit_width: usize,
        policy: OverflowPolicy,
    ) -> Self {
        StreamingMultiprocessor {
            id,
            warps: (0..warps_per_sm)
                .map(|_| Warp::new(lanes_per_warp, bit_width, policy))
                .collect(),
            local_mem: vec![0; warps_per_sm * lanes_per_warp],
            lanes_per_warp,
        }
    }

    /// Total lane capacity: every dispatch fills exactly this many slots.
    pub fn capacity(&self) -> usize {
        self.warps.len() * self.lanes_per_warp
    }

    pub fn warps(&self) -> usize {
        self.warps.len()
    }

    /// Fit a chunk to lane capacity (truncate or zero-pad), then hand each
    /// warp its contiguous group of `lanes_per_warp` pairs.
    pub fn distribute(&mut self, chunk: &[OperandPair]) -> Result<ChunkFit> {
        let capacity = self.capacity();
        let fit = ChunkFit {
            padded: capacity.saturating_sub(chunk.len()),
            truncated: chunk.len().saturating_sub(capacity),
        };

        let mut fitted = chunk[..chunk.len().min(capacity)].to_vec();
        fitted.resize(capacity, OperandPair::default());

        for (warp, group) in self.warps.iter_mut().zip(fitted.chunks(self.lanes_per_warp)) {
            warp.load_work(group)?;
        }
        Ok(fit)
    }

    /// Run every warp; warps share no state and execute in parallel.
    pub fn run(&mut self, code: u8) -> Result<()> {
        self.warps.par_iter_mut().try_for_each(|warp| warp.run(code))
    }

    /// Gather each warp's lane results into local memory at their
    /// (warp, lane) position and return the buffer flattened row-major.
    pub fn gather_results(&mut self) -> &[u32] {
        for (w, warp) in self.warps.iter().enumerate() {
            let base = w * self.lanes_per_warp;
            let results = warp.gather_results();
            self.local_mem[base..base + self.lanes_per_warp].copy_from_slice(&results);
        }
        &self.local_mem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::MUL_CODE;

    fn pairs(raw: &[(u32, u32)]) -> Vec<OperandPair> {
        raw.iter().map(|&(a, b)| OperandPair::new(a, b)).collect()
    }

    fn sm(warps: usize, lanes: usize) -> StreamingMultiprocessor {
        StreamingMultiprocessor::new(0, warps, lanes, 8, OverflowPolicy::Truncate)
    }

    #[test]
    fn undersized_chunk_is_zero_padded() {
        let mut sm = sm(2, 2);
        let fit = sm.distribute(&pairs(&[(2, 3), (4, 5)])).unwrap();
        assert_eq!(fit, ChunkFit { padded: 2, truncated: 0 });
        sm.run(MUL_CODE).unwrap();
        assert_eq!(sm.gather_results(), &[6, 20, 0, 0]);
    }

    #[test]
    fn oversized_chunk_drops_trailing_entries() {
        let mut sm = sm(1, 2);
        let fit = sm
            .distribute(&pairs(&[(2, 2), (3, 3), (4, 4), (5, 5)]))
            .unwrap();
        assert_eq!(fit, ChunkFit { padded: 0, truncated: 2 });
        sm.run(MUL_CODE).unwrap();
        assert_eq!(sm.gather_results(), &[4, 9]);
    }

    #[test]
    fn results_flatten_in_warp_then_lane_order() {
        let mut sm = sm(2, 3);
        sm.distribute(&pairs(&[(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)]))
            .unwrap();
        sm.run(MUL_CODE).unwrap();
        assert_eq!(sm.gather_results(), &[1, 4, 9, 16, 25, 36]);
    }

    #[test]
    fn empty_chunk_fills_capacity_with_padding() {
        let mut sm = sm(2, 2);
        let fit = sm.distribute(&[]).unwrap();
        assert_eq!(fit, ChunkFit { padded: 4, truncated: 0 });
        sm.run(MUL_CODE).unwrap();
        assert_eq!(sm.gather_results(), &[0, 0, 0, 0]);
    }
}
