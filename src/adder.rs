//! Bit-level adder circuits.
//!
//! A half adder combines two bits into a sum and a carry; a full-adder
//! stage is two half adders chained, and the ripple-carry adder strings
//! one stage per bit, feeding each stage's carry-out into the next.

use crate::error::{Result, SimError};

/// 1-bit half adder: sum = A XOR B, carry = A AND B.
#[inline]
pub fn half_add(a: u8, b: u8) -> (u8, u8) {
    (a ^ b, a & b)
}

/// Ripple-carry adder over fixed-width bit vectors (index 0 = LSB).
#[derive(Debug, Clone)]
pub struct RippleAdder {
    width: usize,
}

impl RippleAdder {
    pub fn new(width: usize) -> Self {
        RippleAdder { width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Add two `width`-bit numbers, returning the sum bits and the final
    /// carry-out. Inputs of any other length are a contract violation.
    pub fn add(&self, a: &[u8], b: &[u8]) -> Result<(Vec<u8>, u8)> {
        for bits in [a, b] {
            if bits.len() != self.width {
                return Err(SimError::ShapeMismatch {
                    context: "ripple adder",
                    expected: self.width,
                    actual: bits.len(),
                });
            }
        }

        let mut sum = Vec::with_capacity(self.width);
        let mut carry = 0u8;
        for i in 0..self.width {
            // First half adder combines the input bits, the second folds
            // in the carry from the previous stage.
            let (s1, c1) = half_add(a[i], b[i]);
            let (s, c2) = half_add(s1, carry);
            sum.push(s);
            // c1 and c2 can never both be set.
            carry = c1 | c2;
        }
        Ok((sum, carry))
    }
}
