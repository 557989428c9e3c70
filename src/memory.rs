//! Global device memory: a fixed-capacity array of int32-sized cells.
//!
//! Cells are zero-initialized and stay zero until explicitly written, so
//! reading back an output region before any execute yields all-zero data.

use crate::error::{Result, SimError};

pub struct GlobalMemory {
    cells: Vec<u32>,
}

impl GlobalMemory {
    pub fn new(size: usize) -> Self {
        GlobalMemory {
            cells: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read `len` cells starting at `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Result<&[u32]> {
        self.check(offset, len)?;
        Ok(&self.cells[offset..offset + len])
    }

    /// Write a run of cells starting at `offset`.
    pub fn store(&mut self, offset: usize, values: &[u32]) -> Result<()> {
        self.check(offset, values.len())?;
        self.cells[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Zero every cell.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        let required = offset + len;
        if required > self.cells.len() {
            return Err(SimError::GlobalMemory {
                required,
                capacity: self.cells.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_to_zero() {
        let mem = GlobalMemory::new(8);
        assert_eq!(mem.read(0, 8).unwrap(), &[0; 8]);
    }

    #[test]
    fn store_then_read() {
        let mut mem = GlobalMemory::new(8);
        mem.store(2, &[10, 20, 30]).unwrap();
        assert_eq!(mem.read(0, 6).unwrap(), &[0, 0, 10, 20, 30, 0]);
    }

    #[test]
    fn out_of_capacity_store_fails() {
        let mut mem = GlobalMemory::new(4);
        let err = mem.store(2, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            SimError::GlobalMemory {
                required: 5,
                capacity: 4,
            }
        );
    }

    #[test]
    fn reset_restores_zeros() {
        let mut mem = GlobalMemory::new(4);
        mem.store(0, &[1, 2, 3, 4]).unwrap();
        mem.reset();
        assert_eq!(mem.read(0, 4).unwrap(), &[0; 4]);
    }
}
