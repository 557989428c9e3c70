//! SIMT lane groups.
//!
//! A warp is a fixed-size group of lanes executing the same opcode in
//! lock-step, each over its own operand pair. Lanes never read each
//! other's state, so the per-lane loop is a rayon fan-out whose join is
//! the only synchronization point.

use rayon::prelude::*;

use crate::alu::{Alu, OverflowPolicy};
use crate::error::{Result, SimError};
use crate::workload::OperandPair;

/// One SIMT lane: an ALU, its current operand pair, and a result slot.
/// Reassigned on every dispatch.
#[derive(Debug, Clone)]
struct Lane {
    alu: Alu,
    pair: OperandPair,
    result: u32,
}

impl Lane {
    fn new(bit_width: usize, policy: OverflowPolicy) -> Self {
        Lane {
            alu: Alu::new(bit_width, policy),
            pair: OperandPair::default(),
            result: 0,
        }
    }

    fn execute(&mut self, code: u8) -> Result<()> {
        self.result = self.alu.execute(self.pair.a, self.pair.b, code)?;
        Ok(())
    }
}

/// A fixed-size group of lanes executing the same instruction.
pub struct Warp {
    lanes: Vec<Lane>,
}

impl Warp {
    pub fn new(lanes_per_warp: usize, bit_width: usize, policy: OverflowPolicy) -> Self {
        Warp {
            lanes: (0..lanes_per_warp)
                .map(|_| Lane::new(bit_width, policy))
                .collect(),
        }
    }

    /// Number of lanes in this warp.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Assign one operand pair per lane. The SM pre-pads chunks to lane
    /// capacity, so a length mismatch here is a programming invariant
    /// violation, not a user-facing condition.
    pub fn load_work(&mut self, pairs: &[OperandPair]) -> Result<()> {
        if pairs.len() != self.lanes.len() {
            return Err(SimError::ShapeMismatch {
                context: "warp work assignment",
                expected: self.lanes.len(),
                actual: pairs.len(),
            });
        }
        for (lane, &pair) in self.lanes.iter_mut().zip(pairs) {
            lane.pair = pair;
            lane.result = 0;
        }
        Ok(())
    }

    /// Execute the opcode on every lane in parallel.
    pub fn run(&mut self, code: u8) -> Result<()> {
        self.lanes
            .par_iter_mut()
            .try_for_each(|lane| lane.execute(code))
    }

    /// Per-lane results in lane order.
    pub fn gather_results(&self) -> Vec<u32> {
        self.lanes.iter().map(|lane| lane.result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::MUL_CODE;

    fn pairs(raw: &[(u32, u32)]) -> Vec<OperandPair> {
        raw.iter().map(|&(a, b)| OperandPair::new(a, b)).collect()
    }

    #[test]
    fn rejects_wrong_sized_work() {
        let mut warp = Warp::new(4, 8, OverflowPolicy::Truncate);
        let err = warp.load_work(&pairs(&[(1, 2), (3, 4)])).unwrap_err();
        assert_eq!(
            err,
            SimError::ShapeMismatch {
                context: "warp work assignment",
                expected: 4,
                actual: 2,
            }
        );
    }

    #[test]
    fn lanes_execute_independently_in_lane_order() {
        let mut warp = Warp::new(4, 8, OverflowPolicy::Truncate);
        warp.load_work(&pairs(&[(2, 3), (5, 5), (0, 9), (7, 1)]))
            .unwrap();
        warp.run(MUL_CODE).unwrap();
        assert_eq!(warp.gather_results(), vec![6, 25, 0, 7]);
    }

    #[test]
    fn reload_overwrites_previous_results() {
        let mut warp = Warp::new(2, 8, OverflowPolicy::Truncate);
        warp.load_work(&pairs(&[(3, 3), (4, 4)])).unwrap();
        warp.run(MUL_CODE).unwrap();
        warp.load_work(&pairs(&[(0, 0), (0, 0)])).unwrap();
        assert_eq!(warp.gather_results(), vec![0, 0]);
    }

    #[test]
    fn reject_mode_failure_propagates_out_of_run() {
        let mut warp = Warp::new(2, 4, OverflowPolicy::Reject);
        warp.load_work(&pairs(&[(3, 3), (15, 2)])).unwrap();
        let err = warp.run(MUL_CODE).unwrap_err();
        assert_eq!(err, SimError::Encoding { value: 30, width: 4 });
    }
}
