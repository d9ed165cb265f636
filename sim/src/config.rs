//! Simulator configuration.

/// How a branch turns its 24-bit offset into a target address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum BranchTarget {
    /// The scaled offset is the target itself (`b 40` lands on 40).
    #[default]
    Absolute,
    /// The scaled offset is added to the address of the next instruction.
    PcRelative,
}

impl BranchTarget {
    /// Target of a branch at `addr` whose sign-extended, scaled offset is
    /// `ext_imm`.
    pub fn resolve(self, addr: u32, ext_imm: u32) -> u32 {
        match self {
            BranchTarget::Absolute => ext_imm,
            BranchTarget::PcRelative => addr.wrapping_add(4).wrapping_add(ext_imm),
        }
    }

    /// Inverse of [`BranchTarget::resolve`]: the byte offset to encode for a
    /// branch at `addr` reaching `target`.
    pub fn offset(self, addr: u32, target: u32) -> i64 {
        match self {
            BranchTarget::Absolute => target as i64,
            BranchTarget::PcRelative => target as i64 - (addr as i64 + 4),
        }
    }
}

/// Options of the multicycle simulator.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub(crate) branch_target: BranchTarget,
    pub(crate) reset_cycles: u32,
    pub(crate) max_cycles: u64,
    pub(crate) tty_out: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            branch_target: BranchTarget::default(),
            reset_cycles: 1,
            max_cycles: 3_000_000,
            tty_out: false,
        }
    }
}

impl SimConfig {
    pub fn set_branch_target(mut self, branch_target: BranchTarget) -> Self {
        self.branch_target = branch_target;
        self
    }
    /// Number of clock edges the reset line is held by [`crate::McSim::reset`].
    pub fn set_reset_cycles(mut self, cycles: u32) -> Self {
        self.reset_cycles = cycles.max(1);
        self
    }
    /// Upper bound on the cycles [`crate::McSim::run`] may spend.
    pub fn set_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = cycles;
        self
    }
    /// Print every cycle to the terminal while running.
    pub fn set_tty_out(mut self, tty_out: bool) -> Self {
        self.tty_out = tty_out;
        self
    }

    pub fn branch_target(&self) -> BranchTarget {
        self.branch_target
    }
    pub fn reset_cycles(&self) -> u32 {
        self.reset_cycles
    }
    pub fn max_cycles(&self) -> u64 {
        self.max_cycles
    }
}
