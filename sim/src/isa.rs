//! Instruction set definition for the ARM subset: encoding tables, the
//! decoder shared by the hardware and the reference interpreter, and the
//! reference interpreter itself.

use crate::{
    config::BranchTarget,
    error::{DecodeError, SimError},
    framework::MemData,
    utils::mem_diff,
};

macro_rules! define_code {
    {
        @mod $modname:ident;
        @type $typ:ty;
        $( $cname:ident = $cval:expr; )*
    } => {
        pub mod $modname {
            $(pub const $cname : $typ = $cval; )*
            #[allow(unused)]
            pub fn name_of(code: $typ) -> &'static str {
                match code {
                    $($cname => stringify!($cname), )*
                    _ => "no name"
                }
            }
        }
    };
}

define_code! {
    @mod cond_code;
    @type u8;
    EQ = 0b0000;
    AL = 0b1110;
}

define_code! {
    @mod class_code;
    @type u8;
    DP = 0b00;
    MEM = 0b01;
    BRANCH = 0b10;
}

define_code! {
    @mod dp_cmd;
    @type u8;
    AND = 0b0000;
    SUB = 0b0010;
    ADD = 0b0100;
    CMP = 0b1010;
    ORR = 0b1100;
    MOV = 0b1101;
}

define_code! {
    @mod shift_code;
    @type u8;
    LSL = 0b00;
    LSR = 0b01;
}

define_code! {
    @mod reg_code;
    @type u8;
    R0 = 0;
    R1 = 1;
    R2 = 2;
    R3 = 3;
    R4 = 4;
    R5 = 5;
    R6 = 6;
    R7 = 7;
    R8 = 8;
    R9 = 9;
    R10 = 10;
    R11 = 11;
    R12 = 12;
    R13 = 13;
    R14 = 14;
    R15 = 15;
}

/// Sixteen 32-bit registers. R15 is an ordinary register here.
pub type RegFile = [u32; 16];

/// Extract bits `hi..=lo` of `word`.
pub const fn bits(word: u32, hi: u32, lo: u32) -> u32 {
    (word >> lo) & (u32::MAX >> (31 - (hi - lo)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum Condition {
    /// Executed only if the Zero flag is set.
    Eq,
    #[default]
    Al,
}

impl Condition {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            cond_code::EQ => Some(Self::Eq),
            cond_code::AL => Some(Self::Al),
            _ => None,
        }
    }
    pub fn code(self) -> u8 {
        match self {
            Self::Eq => cond_code::EQ,
            Self::Al => cond_code::AL,
        }
    }
    /// Whether an instruction with this condition executes under the given
    /// Zero flag.
    pub fn holds(self, zf: bool) -> bool {
        match self {
            Self::Eq => zf,
            Self::Al => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum InstrClass {
    DataProcessing,
    Memory,
    Branch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum Opcode {
    And,
    Sub,
    #[default]
    Add,
    Cmp,
    Orr,
    Mov,
    Ldr,
    Str,
    B,
}

impl Opcode {
    pub fn class(self) -> InstrClass {
        match self {
            Opcode::And | Opcode::Sub | Opcode::Add | Opcode::Cmp | Opcode::Orr | Opcode::Mov => {
                InstrClass::DataProcessing
            }
            Opcode::Ldr | Opcode::Str => InstrClass::Memory,
            Opcode::B => InstrClass::Branch,
        }
    }

    fn from_dp_cmd(cmd: u8) -> Option<Self> {
        Some(match cmd {
            dp_cmd::AND => Opcode::And,
            dp_cmd::SUB => Opcode::Sub,
            dp_cmd::ADD => Opcode::Add,
            dp_cmd::CMP => Opcode::Cmp,
            dp_cmd::ORR => Opcode::Orr,
            dp_cmd::MOV => Opcode::Mov,
            _ => return None,
        })
    }

    /// The `cmd` field of a data-processing opcode.
    pub fn dp_cmd(self) -> Option<u8> {
        Some(match self {
            Opcode::And => dp_cmd::AND,
            Opcode::Sub => dp_cmd::SUB,
            Opcode::Add => dp_cmd::ADD,
            Opcode::Cmp => dp_cmd::CMP,
            Opcode::Orr => dp_cmd::ORR,
            Opcode::Mov => dp_cmd::MOV,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::And => "and",
            Opcode::Sub => "sub",
            Opcode::Add => "add",
            Opcode::Cmp => "cmp",
            Opcode::Orr => "orr",
            Opcode::Mov => "mov",
            Opcode::Ldr => "ldr",
            Opcode::Str => "str",
            Opcode::B => "b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum ShiftKind {
    #[default]
    Lsl,
    Lsr,
}

impl ShiftKind {
    pub fn apply(self, val: u32, amount: u32) -> u32 {
        match self {
            ShiftKind::Lsl => val.checked_shl(amount).unwrap_or(0),
            ShiftKind::Lsr => val.checked_shr(amount).unwrap_or(0),
        }
    }
}

/// A decoded instruction word. Register fields that an opcode does not use
/// are still extracted, as the hardware wires them to the register file
/// regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Instruction {
    pub word: u32,
    pub cond: Condition,
    pub op: Opcode,
    pub rn: u8,
    pub rd: u8,
    pub rm: u8,
    pub shift: ShiftKind,
}

impl Instruction {
    pub fn class(&self) -> InstrClass {
        self.op.class()
    }
    /// Zero-extended memory offset.
    pub fn imm12(&self) -> u32 {
        bits(self.word, 11, 0)
    }
    /// Sign-extended branch offset, scaled by 4.
    pub fn branch_offset(&self) -> u32 {
        (((self.word & 0x00ff_ffff) << 8) as i32 >> 6) as u32
    }
    pub fn shamt(&self) -> u32 {
        bits(self.word, 11, 7)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { rn, rd, rm, .. } = *self;
        match self.op {
            Opcode::Ldr | Opcode::Str => write!(
                f,
                "{} r{rd}, [r{rn}, #{}]",
                self.op.mnemonic(),
                self.imm12()
            ),
            Opcode::Mov => {
                let kind = match self.shift {
                    ShiftKind::Lsl => "lsl",
                    ShiftKind::Lsr => "lsr",
                };
                write!(f, "mov r{rd}, r{rm}, {kind} #{}", self.shamt())
            }
            Opcode::B => {
                let suffix = if self.cond == Condition::Eq { "eq" } else { "" };
                write!(f, "b{suffix} #{}", self.branch_offset() as i32)
            }
            op => write!(f, "{} r{rd}, r{rn}, r{rm}", op.mnemonic()),
        }
    }
}

/// Decode an instruction word. Every word either maps to exactly one
/// supported instruction or to a [`DecodeError`].
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let cond_bits = bits(word, 31, 28) as u8;
    let cond = Condition::from_code(cond_bits).ok_or(DecodeError::UnsupportedCondition {
        word,
        cond: cond_bits,
    })?;
    let mut inst = Instruction {
        word,
        cond,
        op: Opcode::default(),
        rn: bits(word, 19, 16) as u8,
        rd: bits(word, 15, 12) as u8,
        rm: bits(word, 3, 0) as u8,
        shift: ShiftKind::default(),
    };
    let class = bits(word, 27, 26) as u8;
    match class {
        class_code::DP => {
            // only the register operand form is supported
            if bits(word, 25, 25) != 0 {
                return Err(DecodeError::UnsupportedOperand { word });
            }
            let cmd = bits(word, 24, 21) as u8;
            inst.op =
                Opcode::from_dp_cmd(cmd).ok_or(DecodeError::UnsupportedOpcode { word, opcode: cmd })?;
            if inst.op == Opcode::Mov {
                inst.shift = match bits(word, 6, 5) as u8 {
                    shift_code::LSL => ShiftKind::Lsl,
                    shift_code::LSR => ShiftKind::Lsr,
                    _ => return Err(DecodeError::UnsupportedOperand { word }),
                };
                if bits(word, 4, 4) != 0 {
                    return Err(DecodeError::UnsupportedOperand { word });
                }
            } else if bits(word, 11, 4) != 0 {
                return Err(DecodeError::UnsupportedOperand { word });
            }
        }
        class_code::MEM => {
            // immediate offset, added, no write-back
            if bits(word, 25, 21) != 0 {
                return Err(DecodeError::UnsupportedOperand { word });
            }
            inst.op = if bits(word, 20, 20) != 0 {
                Opcode::Ldr
            } else {
                Opcode::Str
            };
        }
        class_code::BRANCH => {
            let opcode = bits(word, 25, 24) as u8;
            if opcode != 0 {
                return Err(DecodeError::UnsupportedOpcode { word, opcode });
            }
            inst.op = Opcode::B;
        }
        _ => return Err(DecodeError::UnsupportedClass { word, class }),
    }
    if inst.op != Opcode::B && cond != Condition::Al {
        return Err(DecodeError::UnsupportedCondition {
            word,
            cond: cond_bits,
        });
    }
    Ok(inst)
}

/// Memory operand `[rn, #offset]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr(pub u8, pub u32);

/// Instructions as written in assembly.
///
/// During assembling, the type of immediate can change: branch targets
/// start as labels and are resolved to addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst<ImmType: Clone> {
    /// `ldr rd, [rn, #imm]`
    Ldr(u8, Addr),
    /// `str rd, [rn, #imm]`
    Str(u8, Addr),
    /// `add/sub/and/orr/cmp rd, rn, rm`
    Op(Opcode, u8, u8, u8),
    /// `mov rd, rm, lsl|lsr #n`
    Mov(u8, u8, ShiftKind, u8),
    /// `b/beq target`
    B(Condition, ImmType),
}

impl Inst<u32> {
    /// Encode the instruction placed at byte address `addr`.
    pub fn encode(&self, addr: u32, branch_target: BranchTarget) -> anyhow::Result<u32> {
        let al = (cond_code::AL as u32) << 28;
        let word = match *self {
            Inst::Ldr(rd, Addr(rn, imm)) | Inst::Str(rd, Addr(rn, imm)) => {
                anyhow::ensure!(imm < 1 << 12, "memory offset {imm} exceeds 12 bits");
                let l = matches!(self, Inst::Ldr(..)) as u32;
                al | (class_code::MEM as u32) << 26
                    | l << 20
                    | (rn as u32) << 16
                    | (rd as u32) << 12
                    | imm
            }
            Inst::Op(op, rd, rn, rm) => {
                let cmd = op
                    .dp_cmd()
                    .filter(|_| op != Opcode::Mov)
                    .ok_or_else(|| anyhow::anyhow!("`{}` is not a register operation", op.mnemonic()))?;
                al | (cmd as u32) << 21 | (rn as u32) << 16 | (rd as u32) << 12 | rm as u32
            }
            Inst::Mov(rd, rm, kind, shamt) => {
                anyhow::ensure!(shamt < 32, "shift amount {shamt} exceeds 5 bits");
                let kind = match kind {
                    ShiftKind::Lsl => shift_code::LSL,
                    ShiftKind::Lsr => shift_code::LSR,
                };
                al | (dp_cmd::MOV as u32) << 21
                    | (rd as u32) << 12
                    | (shamt as u32) << 7
                    | (kind as u32) << 5
                    | rm as u32
            }
            Inst::B(cond, target) => {
                let offset = branch_target.offset(addr, target);
                anyhow::ensure!(offset % 4 == 0, "branch target {target:#x} is not word aligned");
                let imm = offset >> 2;
                anyhow::ensure!(
                    (-(1 << 23)..(1 << 23)).contains(&imm),
                    "branch target {target:#x} out of reach"
                );
                (cond.code() as u32) << 28
                    | (class_code::BRANCH as u32) << 26
                    | (imm as u32 & 0x00ff_ffff)
            }
        };
        Ok(word)
    }
}

/// Simulation result of the machine code on the standard ISA.
pub struct StandardResult {
    pub mem: MemData,
    pub zf: bool,
    pub regs: RegFile,
    pub pc: u32,
    pub n_insts: u64,
    /// Set if execution stopped on a branch to itself.
    pub idle: bool,
}

/// Execute machine code w.r.t. the ISA specification, one instruction at a
/// time. This function is used to verify the correctness of the multicycle
/// machine.
///
/// Execution stops after `max_insts` instructions, or early on a taken
/// branch to its own address.
pub fn simulate(
    mut mem: MemData,
    max_insts: u64,
    branch_target: BranchTarget,
    tty_out: bool,
) -> Result<StandardResult, SimError> {
    let original = mem.clone();
    let mut pc = 0u32;
    let mut zf = false;
    let mut regs: RegFile = [0; 16];
    let mut n_insts = 0;
    let mut idle = false;

    while n_insts < max_insts {
        let inst = decode(mem.read(pc)?)?;
        n_insts += 1;
        let (vn, vm) = (regs[inst.rn as usize], regs[inst.rm as usize]);
        let mut next_pc = pc.wrapping_add(4);
        match inst.op {
            Opcode::Ldr => {
                regs[inst.rd as usize] = mem.read(vn.wrapping_add(inst.imm12()))?;
            }
            Opcode::Str => {
                mem.write(vn.wrapping_add(inst.imm12()), regs[inst.rd as usize])?;
            }
            Opcode::B => {
                if inst.cond.holds(zf) {
                    next_pc = branch_target.resolve(pc, inst.branch_offset());
                    if next_pc == pc {
                        idle = true;
                        break;
                    }
                }
            }
            op => {
                let e = match op {
                    Opcode::And => vn & vm,
                    Opcode::Orr => vn | vm,
                    Opcode::Add => vn.wrapping_add(vm),
                    Opcode::Sub | Opcode::Cmp => vn.wrapping_sub(vm),
                    _ => inst.shift.apply(vm, inst.shamt()),
                };
                zf = e == 0;
                if op != Opcode::Cmp {
                    regs[inst.rd as usize] = e;
                }
            }
        }
        pc = next_pc;
    }

    if tty_out {
        eprintln!("total instructions: {}", n_insts);
        mem_diff(&original, &mem);
    }

    Ok(StandardResult {
        mem,
        zf,
        regs,
        pc,
        n_insts,
        idle,
    })
}
