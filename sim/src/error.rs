//! Errors raised by the decoder and the simulated machine. None of them is
//! transient: each one stops the machine until it is reset.

use thiserror::Error;

use crate::{architectures::control::State, isa::Opcode};

/// The instruction word is not covered by the supported encoding table.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
pub enum DecodeError {
    #[error("unsupported instruction class {class:#04b} in {word:#010x}")]
    UnsupportedClass { word: u32, class: u8 },
    #[error("unsupported opcode {opcode:#06b} in {word:#010x}")]
    UnsupportedOpcode { word: u32, opcode: u8 },
    #[error("unsupported condition {cond:#06b} in {word:#010x}")]
    UnsupportedCondition { word: u32, cond: u8 },
    #[error("unsupported operand form in {word:#010x}")]
    UnsupportedOperand { word: u32 },
}

impl DecodeError {
    pub fn word(&self) -> u32 {
        match *self {
            DecodeError::UnsupportedClass { word, .. }
            | DecodeError::UnsupportedOpcode { word, .. }
            | DecodeError::UnsupportedCondition { word, .. }
            | DecodeError::UnsupportedOperand { word } => word,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    /// The control unit has no transition for this combination.
    #[error("no transition from state {state} for {op:?}")]
    IllegalState { state: State, op: Option<Opcode> },
    #[error("memory address {addr:#010x} out of range")]
    InvalidAddress { addr: u32 },
    #[error("exceed maximum CPU cycle limit ({limit})")]
    CycleLimit { limit: u64 },
}

impl SimError {
    /// Status the machine stops with after this error.
    pub fn stat(&self) -> crate::framework::Stat {
        use crate::framework::Stat;
        match self {
            SimError::Decode(_) | SimError::IllegalState { .. } => Stat::Ins,
            SimError::InvalidAddress { .. } => Stat::Adr,
            SimError::CycleLimit { .. } => Stat::Aok,
        }
    }
}
