//! Error types for the simulator.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors surfaced by the device and its compute units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Operand, chunk, or bit-vector dimensions do not match.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unknown workload name, or an opcode the device does not drive.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A value cannot be represented in the configured bit width
    /// (reject-mode encoding only; truncate mode never fails).
    #[error("value {value} does not fit in {width} bits")]
    Encoding { value: u64, width: usize },

    /// The workload's output does not fit in global memory.
    #[error("global memory too small: need {required} cells, have {capacity}")]
    GlobalMemory { required: usize, capacity: usize },

    /// Invalid device configuration.
    #[error("invalid configuration: {0}")]
    Config(&'static str),

    /// `partition` was called before `load`.
    #[error("no workload loaded")]
    NothingLoaded,

    /// `execute` was called before `partition`.
    #[error("workload not partitioned")]
    NotPartitioned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_display() {
        let err = SimError::ShapeMismatch {
            context: "ripple adder",
            expected: 8,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "shape mismatch in ripple adder: expected 8, got 4"
        );
    }

    #[test]
    fn encoding_display() {
        let err = SimError::Encoding {
            value: 256,
            width: 8,
        };
        assert_eq!(err.to_string(), "value 256 does not fit in 8 bits");
    }

    #[test]
    fn unsupported_operation_display() {
        let err = SimError::UnsupportedOperation("conv2d".to_string());
        assert_eq!(err.to_string(), "unsupported operation: conv2d");
    }
}
