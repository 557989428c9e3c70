//! Software model of a simplified GPU execution pipeline.
//!
//! Fixed-width binary ALUs compose into SIMT lanes, lanes into warps,
//! warps into streaming multiprocessors, and a top-level [`Device`]
//! partitions a matmul or dot-product workload across the SMs and folds
//! the per-lane results back into global memory.

pub mod adder;
pub mod alu;
pub mod control;
pub mod device;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod sm;
pub mod warp;
pub mod workload;

pub use device::{Device, DeviceConfig, ExecutionStats};
pub use error::{Result, SimError};
