//! Arithmetic logic unit over fixed-width binary words.
//!
//! Every value entering or leaving the ALU round-trips through exactly
//! `width` bits (index 0 = LSB). Addition and subtraction run through the
//! ripple-carry adder at bit level; multiply and divide decode to integers,
//! compute, and re-encode under the configured overflow policy.

use serde::{Deserialize, Serialize};

use crate::adder::RippleAdder;
use crate::control::Opcode;
use crate::error::{Result, SimError};

/// What happens when a value does not fit the configured bit width.
///
/// `Truncate` keeps the low `width` bits (modulo-2^W, hardware ALU
/// semantics) and is the default; `Reject` fails the encode with
/// [`SimError::Encoding`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    #[default]
    Truncate,
    Reject,
}

/// A fixed-width ALU: one per lane.
#[derive(Debug, Clone)]
pub struct Alu {
    width: usize,
    policy: OverflowPolicy,
    adder: RippleAdder,
}

impl Alu {
    /// Build an ALU for `width`-bit words, 1..=32.
    pub fn new(width: usize, policy: OverflowPolicy) -> Self {
        assert!((1..=32).contains(&width), "bit width must be in 1..=32");
        Alu {
            width,
            policy,
            adder: RippleAdder::new(width),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn mask(&self) -> u64 {
        if self.width >= 32 {
            u64::from(u32::MAX)
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Encode a value into `width` bits, LSB first.
    pub fn encode(&self, value: u32) -> Result<Vec<u8>> {
        self.encode_wide(u64::from(value))
    }

    fn encode_wide(&self, value: u64) -> Result<Vec<u8>> {
        if value > self.mask() && self.policy == OverflowPolicy::Reject {
            return Err(SimError::Encoding {
                value,
                width: self.width,
            });
        }
        Ok((0..self.width).map(|i| ((value >> i) & 1) as u8).collect())
    }

    /// Decode an LSB-first bit vector back to an integer.
    pub fn decode(bits: &[u8]) -> u32 {
        bits.iter()
            .enumerate()
            .fold(0u32, |acc, (i, &bit)| acc | (u32::from(bit) << i))
    }

    /// Execute one operation: encode both operands, decode the control
    /// code, apply the operation at bit level, decode the result.
    ///
    /// Division by zero yields 0 by definition. `Nop` and `Invalid`
    /// produce an all-zero word.
    pub fn execute(&self, a: u32, b: u32, code: u8) -> Result<u32> {
        let a_bits = self.encode(a)?;
        let b_bits = self.encode(b)?;

        let result_bits = match Opcode::decode(code) {
            Opcode::Add => self.adder.add(&a_bits, &b_bits)?.0,
            Opcode::Sub => {
                let negated = self.twos_complement(&b_bits)?;
                self.adder.add(&a_bits, &negated)?.0
            }
            Opcode::And => Self::bitwise(&a_bits, &b_bits, |x, y| x & y),
            Opcode::Or => Self::bitwise(&a_bits, &b_bits, |x, y| x | y),
            Opcode::Xor => Self::bitwise(&a_bits, &b_bits, |x, y| x ^ y),
            Opcode::Mul => {
                let product =
                    u64::from(Self::decode(&a_bits)) * u64::from(Self::decode(&b_bits));
                self.encode_wide(product)?
            }
            Opcode::Div => {
                let dividend = Self::decode(&a_bits);
                let divisor = Self::decode(&b_bits);
                let quotient = if divisor == 0 { 0 } else { dividend / divisor };
                self.encode(quotient)?
            }
            Opcode::Nop | Opcode::Invalid => vec![0; self.width],
        };

        Ok(Self::decode(&result_bits))
    }

    /// Invert every bit, then ripple-add 1.
    fn twos_complement(&self, bits: &[u8]) -> Result<Vec<u8>> {
        let inverted: Vec<u8> = bits.iter().map(|&b| 1 - b).collect();
        let mut one = vec![0u8; self.width];
        one[0] = 1;
        Ok(self.adder.add(&inverted, &one)?.0)
    }

    fn bitwise(a: &[u8], b: &[u8], op: impl Fn(u8, u8) -> u8) -> Vec<u8> {
        a.iter().zip(b).map(|(&x, &y)| op(x, y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::MUL_CODE;

    const ADD: u8 = 0b000;
    const SUB: u8 = 0b001;
    const AND: u8 = 0b010;
    const OR: u8 = 0b011;
    const XOR: u8 = 0b100;
    const DIV: u8 = 0b110;
    const NOP: u8 = 0b111;

    fn alu8() -> Alu {
        Alu::new(8, OverflowPolicy::Truncate)
    }

    #[test]
    fn encode_decode_round_trip() {
        let alu = alu8();
        for v in [0u32, 1, 42, 128, 255] {
            assert_eq!(Alu::decode(&alu.encode(v).unwrap()), v);
        }
    }

    #[test]
    fn add_wraps_modulo_two_pow_w() {
        let alu = alu8();
        assert_eq!(alu.execute(13, 5, ADD).unwrap(), 18);
        assert_eq!(alu.execute(200, 100, ADD).unwrap(), 300 % 256);
        assert_eq!(alu.execute(255, 1, ADD).unwrap(), 0);
    }

    #[test]
    fn sub_uses_twos_complement() {
        let alu = alu8();
        assert_eq!(alu.execute(9, 4, SUB).unwrap(), 5);
        assert_eq!(alu.execute(4, 4, SUB).unwrap(), 0);
        // Negative differences wrap, as in hardware.
        assert_eq!(alu.execute(5, 7, SUB).unwrap(), 254);
    }

    #[test]
    fn bitwise_operations() {
        let alu = alu8();
        assert_eq!(alu.execute(0b1100, 0b1010, AND).unwrap(), 0b1000);
        assert_eq!(alu.execute(0b1100, 0b1010, OR).unwrap(), 0b1110);
        assert_eq!(alu.execute(0b1100, 0b1010, XOR).unwrap(), 0b0110);
    }

    #[test]
    fn mul_truncates_to_width() {
        let alu = alu8();
        assert_eq!(alu.execute(13, 1, MUL_CODE).unwrap(), 13);
        assert_eq!(alu.execute(14, 15, MUL_CODE).unwrap(), 210);
        assert_eq!(alu.execute(16, 16, MUL_CODE).unwrap(), 256 % 256);
        assert_eq!(alu.execute(100, 3, MUL_CODE).unwrap(), 300 % 256);
    }

    #[test]
    fn div_floors_and_zero_divisor_yields_zero() {
        let alu = alu8();
        assert_eq!(alu.execute(17, 5, DIV).unwrap(), 3);
        assert_eq!(alu.execute(42, 0, DIV).unwrap(), 0);
    }

    #[test]
    fn nop_and_invalid_yield_zero() {
        let alu = alu8();
        assert_eq!(alu.execute(99, 7, NOP).unwrap(), 0);
        assert_eq!(alu.execute(99, 7, 0b1011).unwrap(), 0);
    }

    #[test]
    fn reject_policy_fails_oversized_operand() {
        let alu = Alu::new(8, OverflowPolicy::Reject);
        let err = alu.execute(256, 1, ADD).unwrap_err();
        assert_eq!(
            err,
            SimError::Encoding {
                value: 256,
                width: 8,
            }
        );
    }

    #[test]
    fn reject_policy_fails_mul_overflow() {
        let alu = Alu::new(8, OverflowPolicy::Reject);
        assert_eq!(alu.execute(14, 15, MUL_CODE).unwrap(), 210);
        let err = alu.execute(16, 16, MUL_CODE).unwrap_err();
        assert_eq!(
            err,
            SimError::Encoding {
                value: 256,
                width: 8,
            }
        );
    }

    #[test]
    fn full_width_words_do_not_overflow_the_mask() {
        let alu = Alu::new(32, OverflowPolicy::Truncate);
        assert_eq!(alu.execute(u32::MAX, 1, ADD).unwrap(), 0);
        assert_eq!(
            alu.execute(u32::MAX, u32::MAX, AND).unwrap(),
            u32::MAX
        );
    }
}
