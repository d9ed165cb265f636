//! The control unit: a finite-state sequencer that, for each cycle, emits
//! the control vector configuring the datapath and chooses the next state.
//!
//! Both outputs are pure functions of {state, decoded opcode, branch target
//! mode}. Operand values never take part; the only data-dependent decision
//! is made afterwards by [`ControlSignals::gate`], which masks the
//! architectural write enables with the condition check.

use crate::{
    config::BranchTarget,
    dsl::mtc,
    error::SimError,
    isa::{InstrClass, Opcode},
};

/// Phase of the instruction being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum State {
    #[default]
    Fetch = 0,
    Decode,
    MemAdr,
    MemRead,
    MemWriteback,
    MemWrite,
    ExecuteR,
    AluWriteback,
    BranchAdr,
    BranchComplete,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::Fetch => "Fetch",
            State::Decode => "Decode",
            State::MemAdr => "MemAdr",
            State::MemRead => "MemRead",
            State::MemWriteback => "MemWB",
            State::MemWrite => "MemWrite",
            State::ExecuteR => "ExecuteR",
            State::AluWriteback => "ALUWB",
            State::BranchAdr => "BranchAdr",
            State::BranchComplete => "BranchDone",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Memory address source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum AdrSrc {
    #[default]
    Pc,
    Result,
}

/// Extension mode of the immediate unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum ImmSrc {
    /// `[11:0]` zero-extended.
    #[default]
    Mem12,
    /// `[23:0]` sign-extended and scaled by 4.
    Branch24,
    /// `[11:7]` shift amount.
    Shift5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum Ra1Src {
    #[default]
    Rn,
    Rm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum Ra2Src {
    #[default]
    Rm,
    Rd,
}

/// Selects which instruction fields address the two register read ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct RegSrc {
    pub ra1: Ra1Src,
    pub ra2: Ra2Src,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum AluSrcA {
    /// The A latch (register read port 1).
    #[default]
    Register,
    Pc,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum AluSrcB {
    /// The WriteData latch (register read port 2).
    #[default]
    Register,
    ExtImm,
    Four,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum AluControl {
    #[default]
    Add,
    Sub,
    And,
    Orr,
    /// Shift operand A by operand B, in the direction encoded in the
    /// instruction.
    Shift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum ResultSrc {
    /// The ALUOut latch.
    #[default]
    AluOut,
    /// The memory data latch.
    MemData,
    /// The ALU output of this cycle.
    AluResult,
}

/// The control vector of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct ControlSignals {
    pub pc_write: bool,
    pub adr_src: AdrSrc,
    pub mem_write: bool,
    pub ir_write: bool,
    pub reg_write: bool,
    pub imm_src: ImmSrc,
    pub reg_src: RegSrc,
    pub alu_src_a: AluSrcA,
    pub alu_src_b: AluSrcB,
    pub alu_control: AluControl,
    pub result_src: ResultSrc,
    pub flag_write: bool,
}

impl ControlSignals {
    /// Mask the architectural write enables with the condition check.
    pub fn gate(self, cond_ex: bool) -> Self {
        Self {
            pc_write: self.pc_write && cond_ex,
            reg_write: self.reg_write && cond_ex,
            mem_write: self.mem_write && cond_ex,
            flag_write: self.flag_write && cond_ex,
            ..self
        }
    }

    /// Whether the memory port is used this cycle. The port is shared:
    /// fetch uses it with the PC as address, data accesses with the result.
    pub fn mem_port_active(&self) -> bool {
        self.ir_write || self.adr_src == AdrSrc::Result
    }
}

const IDLE: ControlSignals = ControlSignals {
    pc_write: false,
    adr_src: AdrSrc::Pc,
    mem_write: false,
    ir_write: false,
    reg_write: false,
    imm_src: ImmSrc::Mem12,
    reg_src: RegSrc {
        ra1: Ra1Src::Rn,
        ra2: Ra2Src::Rm,
    },
    alu_src_a: AluSrcA::Register,
    alu_src_b: AluSrcB::Register,
    alu_control: AluControl::Add,
    result_src: ResultSrc::AluOut,
    flag_write: false,
};

/// Fetch: IR <- Mem[PC], PC <- PC + 4.
const FETCH: ControlSignals = ControlSignals {
    pc_write: true,
    ir_write: true,
    alu_src_a: AluSrcA::Pc,
    alu_src_b: AluSrcB::Four,
    result_src: ResultSrc::AluResult,
    ..IDLE
};

/// Decode: registers are read into the A and WriteData latches.
const DECODE: ControlSignals = ControlSignals {
    alu_src_a: AluSrcA::Pc,
    alu_src_b: AluSrcB::Four,
    result_src: ResultSrc::AluResult,
    ..IDLE
};

const MEM_ADR: ControlSignals = ControlSignals {
    alu_src_b: AluSrcB::ExtImm,
    ..IDLE
};

const MEM_READ: ControlSignals = ControlSignals {
    adr_src: AdrSrc::Result,
    ..IDLE
};

const MEM_WRITEBACK: ControlSignals = ControlSignals {
    reg_write: true,
    result_src: ResultSrc::MemData,
    ..IDLE
};

const MEM_WRITE: ControlSignals = ControlSignals {
    adr_src: AdrSrc::Result,
    mem_write: true,
    ..IDLE
};

const EXECUTE_R: ControlSignals = ControlSignals {
    flag_write: true,
    ..IDLE
};

const ALU_WRITEBACK: ControlSignals = ControlSignals {
    reg_write: true,
    ..IDLE
};

const BRANCH_ADR: ControlSignals = ControlSignals {
    imm_src: ImmSrc::Branch24,
    alu_src_b: AluSrcB::ExtImm,
    ..IDLE
};

const BRANCH_COMPLETE: ControlSignals = ControlSignals {
    pc_write: true,
    ..IDLE
};

/// The base vector of every state, before the opcode is layered on.
pub const fn base_signals(state: State) -> ControlSignals {
    match state {
        State::Fetch => FETCH,
        State::Decode => DECODE,
        State::MemAdr => MEM_ADR,
        State::MemRead => MEM_READ,
        State::MemWriteback => MEM_WRITEBACK,
        State::MemWrite => MEM_WRITE,
        State::ExecuteR => EXECUTE_R,
        State::AluWriteback => ALU_WRITEBACK,
        State::BranchAdr => BRANCH_ADR,
        State::BranchComplete => BRANCH_COMPLETE,
    }
}

/// Opcode-dependent part of the control vector, applied in every state
/// after decode.
fn layer_opcode(mut sig: ControlSignals, state: State, op: Opcode) -> ControlSignals {
    match op {
        Opcode::Str => sig.reg_src.ra2 = Ra2Src::Rd,
        Opcode::Mov => {
            sig.reg_src.ra1 = Ra1Src::Rm;
            sig.imm_src = ImmSrc::Shift5;
        }
        Opcode::B => sig.imm_src = ImmSrc::Branch24,
        _ => {}
    }
    if state == State::ExecuteR {
        (sig.alu_control, sig.alu_src_b) = match op {
            Opcode::Add => (AluControl::Add, AluSrcB::Register),
            Opcode::Sub | Opcode::Cmp => (AluControl::Sub, AluSrcB::Register),
            Opcode::And => (AluControl::And, AluSrcB::Register),
            Opcode::Orr => (AluControl::Orr, AluSrcB::Register),
            Opcode::Mov => (AluControl::Shift, AluSrcB::ExtImm),
            _ => (sig.alu_control, sig.alu_src_b),
        };
    }
    // compare only updates the flag
    if mtc(op, [Opcode::Cmp]) {
        sig.reg_write = false;
    }
    sig
}

/// The control vector of `state` for the instruction `op` (`None` before
/// the instruction is decoded).
pub fn signals(
    state: State,
    op: Option<Opcode>,
    branch_target: BranchTarget,
) -> Result<ControlSignals, SimError> {
    let sig = base_signals(state);
    let Some(op) = op else {
        return match state {
            State::Fetch | State::Decode => Ok(sig),
            _ => Err(SimError::IllegalState { state, op }),
        };
    };
    let mut sig = layer_opcode(sig, state, op);
    if state == State::BranchAdr {
        sig.alu_src_a = match branch_target {
            BranchTarget::Absolute => AluSrcA::Zero,
            // PC already holds the address of the next instruction
            BranchTarget::PcRelative => AluSrcA::Pc,
        };
    }
    Ok(sig)
}

/// Transition function. `op` is the instruction decoded in this cycle
/// (during Decode) or cached from it (afterwards).
pub fn next_state(state: State, op: Option<Opcode>) -> Result<State, SimError> {
    let class = op.map(Opcode::class);
    Ok(match (state, class) {
        (State::Fetch, _) => State::Decode,
        (State::Decode, Some(InstrClass::Memory)) => State::MemAdr,
        (State::Decode, Some(InstrClass::DataProcessing)) => State::ExecuteR,
        (State::Decode, Some(InstrClass::Branch)) => State::BranchAdr,
        (State::MemAdr, Some(InstrClass::Memory)) => match op {
            Some(Opcode::Ldr) => State::MemRead,
            _ => State::MemWrite,
        },
        (State::MemRead, Some(InstrClass::Memory)) => State::MemWriteback,
        (State::MemWriteback | State::MemWrite, Some(InstrClass::Memory)) => State::Fetch,
        (State::ExecuteR, Some(InstrClass::DataProcessing)) => State::AluWriteback,
        (State::AluWriteback, Some(InstrClass::DataProcessing)) => State::Fetch,
        (State::BranchAdr, Some(InstrClass::Branch)) => State::BranchComplete,
        (State::BranchComplete, Some(InstrClass::Branch)) => State::Fetch,
        _ => return Err(SimError::IllegalState { state, op }),
    })
}
