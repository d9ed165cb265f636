//! Simulator framework shared by the multicycle core and the reference ISA
//! interpreter: the memory store, the termination status and the clocked
//! storage primitives.
mod clocked;

pub use clocked::{Clocked, Latch};

use crate::error::SimError;

/// Number of 32-bit words in the memory that stores instructions and data.
pub const MEM_WORDS: usize = 1 << 14;

/// Word-organised memory. Addresses are byte addresses; the two low bits
/// are ignored, as the memory port only transfers aligned words.
#[derive(Clone, PartialEq, Eq)]
pub struct MemData {
    words: Vec<u32>,
}

impl MemData {
    pub fn new() -> Self {
        Self {
            words: vec![0; MEM_WORDS],
        }
    }

    /// Word index of a byte address, if it is inside the memory.
    pub fn index(addr: u32) -> Result<usize, SimError> {
        let idx = (addr >> 2) as usize;
        if idx >= MEM_WORDS {
            return Err(SimError::InvalidAddress { addr });
        }
        Ok(idx)
    }

    pub fn read(&self, addr: u32) -> Result<u32, SimError> {
        Ok(self.words[Self::index(addr)?])
    }

    pub fn write(&mut self, addr: u32, val: u32) -> Result<(), SimError> {
        let idx = Self::index(addr)?;
        self.words[idx] = val;
        Ok(())
    }

    /// Copy `words` into memory starting at byte address `base`.
    pub fn load(&mut self, base: u32, words: &[u32]) -> Result<(), SimError> {
        for (i, &w) in words.iter().enumerate() {
            self.write(base.wrapping_add(i as u32 * 4), w)?;
        }
        Ok(())
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

impl Default for MemData {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.words.iter().filter(|w| **w != 0).count();
        f.debug_struct("MemData")
            .field("words", &MEM_WORDS)
            .field("nonzero", &used)
            .finish()
    }
}

/// Simulator status, reported once the machine stops advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum Stat {
    /// Indicates that everything is fine.
    #[default]
    Aok,
    /// A taken branch to its own address (`b .`). The machine would spin on
    /// it forever, so the simulator stops here.
    Idle,
    /// The decoder met an instruction outside the supported subset.
    Ins,
    /// Instruction fetch or data access outside the memory.
    Adr,
}

impl Stat {
    pub fn is_terminal(self) -> bool {
        self != Stat::Aok
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::utils::{GRN, RED};
        let (name, s) = match self {
            Stat::Aok => ("aok", GRN.normal()),
            Stat::Idle => ("idle", GRN.bold()),
            Stat::Ins => ("ins", RED.bold()),
            Stat::Adr => ("adr", RED.bold()),
        };
        write!(f, "{}", s.paint(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_addressing_ignores_low_bits() {
        let mut mem = MemData::new();
        mem.write(100, 9).unwrap();
        assert_eq!(mem.read(100).unwrap(), 9);
        assert_eq!(mem.read(102).unwrap(), 9);
        assert_eq!(mem.read(104).unwrap(), 0);
    }

    #[test]
    fn out_of_range_access() {
        let mut mem = MemData::new();
        let end = (MEM_WORDS * 4) as u32;
        assert_eq!(mem.read(end), Err(SimError::InvalidAddress { addr: end }));
        assert!(mem.write(end - 4, 1).is_ok());
        assert!(mem.load(end - 4, &[1, 2]).is_err());
    }
}
