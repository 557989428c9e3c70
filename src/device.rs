//! Top-level device: owns global memory and the SM array, partitions a
//! dot-product or matmul workload into per-SM multiply-accumulate chunks,
//! drives lock-step execution, and folds the per-lane results back into
//! the output buffer.
//!
//! The caller protocol is strictly `load → partition → execute →
//! reconstruct`; out-of-order calls fail with typed errors. Internals are
//! parallel (SMs fan out under rayon, joined before accumulation), but
//! the protocol itself is sequential.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alu::OverflowPolicy;
use crate::control::Opcode;
use crate::error::{Result, SimError};
use crate::memory::GlobalMemory;
use crate::sm::{ChunkFit, StreamingMultiprocessor};
use crate::workload::{Matrix, Operand, OperandPair, Output, TaskCoord, Workload};

/// Device geometry and policies, fixed at construction.
///
/// The default is a deliberately small part: 2 SMs of 4 warps by 8
/// lanes, 8-bit ALUs, 1024 global-memory cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub num_sms: usize,
    pub warps_per_sm: usize,
    pub lanes_per_warp: usize,
    pub bit_width: usize,
    pub global_memory_size: usize,
    pub overflow: OverflowPolicy,
    /// Log a warning when an SM drops trailing work. Off by default;
    /// truncation is otherwise silent.
    pub warn_on_truncation: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            num_sms: 2,
            warps_per_sm: 4,
            lanes_per_warp: 8,
            bit_width: 8,
            global_memory_size: 1024,
            overflow: OverflowPolicy::default(),
            warn_on_truncation: false,
        }
    }
}

impl DeviceConfig {
    /// Lane capacity of a single SM.
    pub fn sm_capacity(&self) -> usize {
        self.warps_per_sm * self.lanes_per_warp
    }

    fn validate(&self) -> Result<()> {
        if self.num_sms == 0 {
            return Err(SimError::Config("num_sms must be at least 1"));
        }
        if self.warps_per_sm == 0 {
            return Err(SimError::Config("warps_per_sm must be at least 1"));
        }
        if self.lanes_per_warp == 0 {
            return Err(SimError::Config("lanes_per_warp must be at least 1"));
        }
        if !(1..=32).contains(&self.bit_width) {
            return Err(SimError::Config("bit_width must be in 1..=32"));
        }
        if self.global_memory_size == 0 {
            return Err(SimError::Config("global_memory_size must be at least 1"));
        }
        Ok(())
    }
}

/// Statistics collected during one `execute` call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub operation: String,
    pub opcode: String,
    /// Length of the flattened pair stream before SM padding.
    pub pairs_total: usize,
    /// Zero pairs added to fill lane capacity across all SMs.
    pub pairs_padded: usize,
    /// Real pairs dropped because a chunk exceeded lane capacity.
    pub pairs_truncated: usize,
    /// SMs that received a non-empty chunk.
    pub sms_engaged: usize,
    pub warps_run: usize,
    pub lanes_run: usize,
}

struct LoadedWorkload {
    workload: Workload,
    a: Operand,
    b: Operand,
    out_rows: usize,
    out_cols: usize,
    /// Matmul reduction depth (`a.cols == b.rows`); 0 for dot product.
    inner: usize,
}

struct Plan {
    /// Flattened operand-pair stream in canonical order.
    pairs: Vec<OperandPair>,
    /// Chunk boundaries: SM `s` owns `pairs[bounds[s]..bounds[s + 1]]`.
    bounds: Vec<usize>,
    /// Matmul only: output coordinate per pair, aligned index-for-index
    /// with `pairs` (before any SM-level padding).
    task_map: Vec<TaskCoord>,
}

pub struct Device {
    config: DeviceConfig,
    sms: Vec<StreamingMultiprocessor>,
    global_memory: GlobalMemory,
    loaded: Option<LoadedWorkload>,
    plan: Option<Plan>,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        let sms = (0..config.num_sms)
            .map(|id| {
                StreamingMultiprocessor::new(
                    id,
                    config.warps_per_sm,
                    config.lanes_per_warp,
                    config.bit_width,
                    config.overflow,
                )
            })
            .collect();
        Ok(Device {
            global_memory: GlobalMemory::new(config.global_memory_size),
            sms,
            config,
            loaded: None,
            plan: None,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Load a pair of operands for the named operation (`"dot"` or
    /// `"matmul"`). Shape checks happen eagerly; on failure the device
    /// state is untouched. Success clears any previous plan and zeroes
    /// global memory.
    pub fn load(
        &mut self,
        a: impl Into<Operand>,
        b: impl Into<Operand>,
        operation: &str,
    ) -> Result<()> {
        let workload = Workload::parse(operation)?;
        let (a, b) = (a.into(), b.into());

        let (out_rows, out_cols, inner) = match workload {
            Workload::Dot => {
                // 1-D or 2-D operands are both fine as long as they
                // flatten to equal lengths.
                if a.len() != b.len() {
                    return Err(SimError::ShapeMismatch {
                        context: "dot operand lengths",
                        expected: a.len(),
                        actual: b.len(),
                    });
                }
                (1, 1, 0)
            }
            Workload::Matmul => {
                let (ma, mb) = match (a.as_matrix(), b.as_matrix()) {
                    (Some(ma), Some(mb)) => (ma, mb),
                    _ => {
                        return Err(SimError::ShapeMismatch {
                            context: "matmul operand rank",
                            expected: 2,
                            actual: 1,
                        });
                    }
                };
                if ma.cols() != mb.rows() {
                    return Err(SimError::ShapeMismatch {
                        context: "matmul inner dimensions",
                        expected: ma.cols(),
                        actual: mb.rows(),
                    });
                }
                let (m, n) = (ma.rows(), mb.cols());
                if m * n > self.global_memory.len() {
                    return Err(SimError::GlobalMemory {
                        required: m * n,
                        capacity: self.global_memory.len(),
                    });
                }
                (m, n, ma.cols())
            }
        };

        self.plan = None;
        self.global_memory.reset();
        self.loaded = Some(LoadedWorkload {
            workload,
            a,
            b,
            out_rows,
            out_cols,
            inner,
        });
        Ok(())
    }

    /// Derive the per-SM work partition from the loaded operands.
    pub fn partition(&mut self) -> Result<()> {
        let loaded = self.loaded.as_ref().ok_or(SimError::NothingLoaded)?;
        let num_sms = self.config.num_sms;

        let plan = match loaded.workload {
            Workload::Dot => {
                // Pairwise zip of the flattened operands, then a
                // near-equal contiguous split: the first N mod num_sms
                // chunks carry one extra element.
                let pairs: Vec<OperandPair> = loaded
                    .a
                    .flattened()
                    .iter()
                    .zip(loaded.b.flattened())
                    .map(|(&x, &y)| OperandPair::new(x, y))
                    .collect();

                let base = pairs.len() / num_sms;
                let extra = pairs.len() % num_sms;
                let mut bounds = Vec::with_capacity(num_sms + 1);
                bounds.push(0);
                for s in 0..num_sms {
                    bounds.push(bounds[s] + base + usize::from(s < extra));
                }

                Plan {
                    pairs,
                    bounds,
                    task_map: Vec::new(),
                }
            }
            Workload::Matmul => {
                // Canonical enumeration: outer index over output cells in
                // row-major order, inner index over the reduction. Linear
                // pair index p recovers (i, j, k) via t = p / k,
                // k_idx = p mod k, i = t / n, j = t mod n.
                let (m, n, k) = (loaded.out_rows, loaded.out_cols, loaded.inner);
                let total = m * n * k;
                let a = loaded.a.flattened();
                let b = loaded.b.flattened();

                let mut pairs = Vec::with_capacity(total);
                let mut task_map = Vec::with_capacity(total);
                for p in 0..total {
                    let t = p / k;
                    let k_idx = p % k;
                    let (i, j) = (t / n, t % n);
                    pairs.push(OperandPair::new(a[i * k + k_idx], b[k_idx * n + j]));
                    task_map.push(TaskCoord {
                        row: i,
                        col: j,
                        k: k_idx,
                    });
                }

                let pairs_per_sm = total.div_ceil(num_sms);
                let bounds = (0..=num_sms)
                    .map(|s| (s * pairs_per_sm).min(total))
                    .collect();

                Plan {
                    pairs,
                    bounds,
                    task_map,
                }
            }
        };

        debug!(
            operation = loaded.workload.name(),
            pairs = plan.pairs.len(),
            sms = num_sms,
            "workload partitioned"
        );
        self.plan = Some(plan);
        Ok(())
    }

    /// Dispatch the partitioned workload to every SM and accumulate the
    /// gathered results into global memory. Only the multiply opcode
    /// (`0b101`) is wired through the device-level workflow.
    pub fn execute(&mut self, code: u8) -> Result<ExecutionStats> {
        let opcode = Opcode::decode(code);
        if opcode != Opcode::Mul {
            return Err(SimError::UnsupportedOperation(format!(
                "opcode {code:03b} ({opcode}) is not wired through the device"
            )));
        }
        let loaded = self.loaded.as_ref().ok_or(SimError::NothingLoaded)?;
        let plan = self.plan.as_ref().ok_or(SimError::NotPartitioned)?;

        info!(
            operation = loaded.workload.name(),
            pairs = plan.pairs.len(),
            sms = self.config.num_sms,
            "dispatching workload"
        );

        // Fan out: each SM distributes, runs, and gathers its own chunk.
        // SMs share no mutable state; the collect below is the join.
        let pairs = &plan.pairs;
        let bounds = &plan.bounds;
        let per_sm: Vec<(Vec<u32>, ChunkFit, usize)> = self
            .sms
            .par_iter_mut()
            .map(|sm| {
                let chunk = &pairs[bounds[sm.id]..bounds[sm.id + 1]];
                let fit = sm.distribute(chunk)?;
                sm.run(code)?;
                Ok((sm.gather_results().to_vec(), fit, chunk.len()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut stats = ExecutionStats {
            operation: loaded.workload.name().to_string(),
            opcode: opcode.to_string(),
            pairs_total: plan.pairs.len(),
            warps_run: self.config.num_sms * self.config.warps_per_sm,
            lanes_run: self.config.num_sms * self.config.sm_capacity(),
            ..ExecutionStats::default()
        };
        for (s, (_, fit, chunk_len)) in per_sm.iter().enumerate() {
            stats.pairs_padded += fit.padded;
            stats.pairs_truncated += fit.truncated;
            if *chunk_len > 0 {
                stats.sms_engaged += 1;
            }
            if fit.truncated > 0 && self.config.warn_on_truncation {
                warn!(
                    sm = s,
                    dropped = fit.truncated,
                    capacity = self.config.sm_capacity(),
                    "chunk exceeds lane capacity, trailing work dropped"
                );
            }
        }

        match loaded.workload {
            Workload::Dot => {
                // Sum the whole concatenated result stream; zero-valued
                // padding lanes contribute nothing.
                let mut sum = 0u32;
                for (results, _, _) in &per_sm {
                    for &r in results {
                        sum = sum.wrapping_add(r);
                    }
                }
                self.global_memory.store(0, &[sum])?;
            }
            Workload::Matmul => {
                let n = loaded.out_cols;
                let capacity = self.config.sm_capacity();
                let mut acc = vec![0u32; loaded.out_rows * n];
                for (s, (results, _, _)) in per_sm.iter().enumerate() {
                    for (local, p) in (bounds[s]..bounds[s + 1]).enumerate() {
                        if local >= capacity {
                            // Dropped inside the SM; there is no result
                            // to fold in.
                            break;
                        }
                        let coord = plan.task_map[p];
                        let cell = coord.row * n + coord.col;
                        acc[cell] = acc[cell].wrapping_add(results[local]);
                    }
                }
                self.global_memory.store(0, &acc)?;
            }
        }

        info!(
            operation = %stats.operation,
            padded = stats.pairs_padded,
            truncated = stats.pairs_truncated,
            "workload complete"
        );
        Ok(stats)
    }

    /// Read the output back from global memory: cell 0 for dot product,
    /// cells `[0, m*n)` reshaped row-major for matmul. Before any
    /// `execute` this yields all-zero data; between executes it is
    /// idempotent.
    pub fn reconstruct(&self) -> Result<Output> {
        let loaded = self.loaded.as_ref().ok_or(SimError::NothingLoaded)?;
        match loaded.workload {
            Workload::Dot => Ok(Output::Scalar(self.global_memory.read(0, 1)?[0])),
            Workload::Matmul => {
                let (m, n) = (loaded.out_rows, loaded.out_cols);
                let cells = self.global_memory.read(0, m * n)?;
                Ok(Output::Matrix(Matrix::from_vec(m, n, cells.to_vec())?))
            }
        }
    }
}
