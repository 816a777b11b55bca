//! Main memory: a fixed-size array of word-length-masked cells.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Word-addressed memory.
///
/// Every cell holds an unsigned value masked to the active word length.
/// Writes mask before storing; a word-length change re-masks every cell in
/// place (values are clipped, not sign-extended).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u32>,
    word_length: u32,
}

impl Memory {
    /// Create a zero-filled memory of `size` cells.
    pub fn new(size: usize, word_length: u32) -> Self {
        Self {
            cells: vec![0; size],
            word_length,
        }
    }

    /// Number of cells.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Clip a value to the active word length.
    pub fn mask_value(&self, value: u32) -> u32 {
        value & ((1u32 << self.word_length) - 1)
    }

    /// Change the active word length and re-mask every stored cell.
    pub fn set_word_length(&mut self, bits: u32) {
        self.word_length = bits;
        let mask = (1u32 << bits) - 1;
        for cell in &mut self.cells {
            *cell &= mask;
        }
    }

    /// Zero every cell.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// Read the cell at `address`.
    pub fn read(&self, address: usize) -> Result<u32, MemoryError> {
        self.cells
            .get(address)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange {
                address,
                size: self.cells.len(),
            })
    }

    /// Write `value` (masked) to the cell at `address`.
    pub fn write(&mut self, address: usize, value: u32) -> Result<(), MemoryError> {
        let masked = self.mask_value(value);
        let size = self.cells.len();
        let cell = self
            .cells
            .get_mut(address)
            .ok_or(MemoryError::AddressOutOfRange { address, size })?;
        *cell = masked;
        Ok(())
    }

    /// Deep copy of all cells, for state snapshots.
    pub fn snapshot(&self) -> Vec<u32> {
        self.cells.clone()
    }
}

/// Errors from direct memory access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("invalid memory address: {address} (memory has {size} cells)")]
    AddressOutOfRange { address: usize, size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut mem = Memory::new(64, 16);
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10).unwrap(), 42);
        assert_eq!(mem.read(11).unwrap(), 0);
    }

    #[test]
    fn test_bounds() {
        let mut mem = Memory::new(64, 16);
        assert!(mem.read(63).is_ok());
        assert_eq!(
            mem.read(64),
            Err(MemoryError::AddressOutOfRange { address: 64, size: 64 })
        );
        assert!(mem.write(64, 1).is_err());
    }

    #[test]
    fn test_write_masks_value() {
        let mut mem = Memory::new(64, 10);
        mem.write(0, 0x1_ffff).unwrap();
        assert_eq!(mem.read(0).unwrap(), 0x3ff);
    }

    #[test]
    fn test_set_word_length_remasks_cells() {
        let mut mem = Memory::new(64, 16);
        mem.write(3, 0xffff).unwrap();
        mem.set_word_length(10);
        assert_eq!(mem.read(3).unwrap(), 0x3ff);
    }

    #[test]
    fn test_reset_zeroes() {
        let mut mem = Memory::new(64, 16);
        mem.write(5, 9).unwrap();
        mem.reset();
        assert_eq!(mem.snapshot(), vec![0; 64]);
    }
}
