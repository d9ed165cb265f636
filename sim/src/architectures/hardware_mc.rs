//! This module defines the hardware units of the multicycle datapath.
//! The combinational units are defined using the `define_units!` macro;
//! the register file and the data memory are clocked elements.

use crate::{
    architectures::control::{
        AdrSrc, AluControl, AluSrcA, AluSrcB, ImmSrc, Ra1Src, Ra2Src, RegSrc, ResultSrc,
    },
    define_units,
    error::{DecodeError, SimError},
    framework::{Clocked, MemData},
    isa::{self, bits, reg_code, Condition, Instruction, RegFile, ShiftKind},
    utils::format_reg_val,
};

define_units! {
    InstructionDecoder dec {
        .input(instr: u32)
        .output(
            inst: Instruction,
            /// Set if the word is outside the supported subset.
            error: Option<DecodeError>
        )
    } {
        match isa::decode(instr) {
            Ok(i) => *inst = i,
            Err(e) => *error = Some(e),
        }
    }

    /// Routes instruction fields to the register file ports.
    RegisterSelect reg_sel {
        .input(instr: u32, reg_src: RegSrc)
        .output(ra1: u8, ra2: u8, wa3: u8)
    } {
        let rn = bits(instr, 19, 16) as u8;
        let rd = bits(instr, 15, 12) as u8;
        let rm = bits(instr, 3, 0) as u8;
        *ra1 = match reg_src.ra1 {
            Ra1Src::Rn => rn,
            Ra1Src::Rm => rm,
        };
        *ra2 = match reg_src.ra2 {
            Ra2Src::Rm => rm,
            Ra2Src::Rd => rd,
        };
        *wa3 = rd;
    }

    Extend ext {
        .input(instr: u32, imm_src: ImmSrc)
        .output(ext_imm: u32)
    } {
        *ext_imm = match imm_src {
            ImmSrc::Mem12 => bits(instr, 11, 0),
            ImmSrc::Branch24 => (((instr & 0x00ff_ffff) << 8) as i32 >> 6) as u32,
            ImmSrc::Shift5 => bits(instr, 11, 7),
        };
    }

    SrcAMux src_a {
        .input(sel: AluSrcA, a: u32, pc: u32)
        .output(src_a: u32)
    } {
        *src_a = match sel {
            AluSrcA::Register => a,
            AluSrcA::Pc => pc,
            AluSrcA::Zero => 0,
        };
    }

    SrcBMux src_b {
        .input(sel: AluSrcB, write_data: u32, ext_imm: u32)
        .output(src_b: u32)
    } {
        *src_b = match sel {
            AluSrcB::Register => write_data,
            AluSrcB::ExtImm => ext_imm,
            AluSrcB::Four => 4,
        };
    }

    ArithmeticLogicUnit alu {
        .input(
            a: u32, b: u32, op: AluControl,
            /// Shift direction, taken from the instruction encoding.
            shift: ShiftKind
        )
        .output(result: u32, zero: bool)
    } {
        *result = match op {
            AluControl::Add => a.wrapping_add(b),
            AluControl::Sub => a.wrapping_sub(b),
            AluControl::And => a & b,
            AluControl::Orr => a | b,
            AluControl::Shift => shift.apply(a, b),
        };
        *zero = *result == 0;
    }

    ResultMux result_mux {
        .input(sel: ResultSrc, alu_out: u32, data: u32, alu_result: u32)
        .output(result: u32)
    } {
        *result = match sel {
            ResultSrc::AluOut => alu_out,
            ResultSrc::MemData => data,
            ResultSrc::AluResult => alu_result,
        };
    }

    AddressMux adr_mux {
        .input(sel: AdrSrc, pc: u32, result: u32)
        .output(adr: u32)
    } {
        *adr = match sel {
            AdrSrc::Pc => pc,
            AdrSrc::Result => result,
        };
    }

    CondLogic cond {
        .input(
            cond: Condition,
            zf: bool,
            /// False until the instruction is decoded; fetch and decode
            /// always proceed.
            decoded: bool
        )
        .output(cond_ex: bool)
    } {
        *cond_ex = !decoded || cond.holds(zf);
    }
}

/// Register file with two read ports and one edge-triggered write port.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    regs: RegFile,
    pending: Option<(u8, u32)>,
}

impl RegisterFile {
    pub fn read(&self, idx: u8) -> u32 {
        self.regs[idx as usize & 0xf]
    }
    /// Drive the write port. The value is committed at the next edge.
    pub fn write(&mut self, idx: u8, val: u32) {
        self.pending = Some((idx & 0xf, val));
    }
    pub fn values(&self) -> &RegFile {
        &self.regs
    }
    pub(crate) fn set(&mut self, idx: u8, val: u32) {
        self.regs[idx as usize & 0xf] = val;
    }
}

impl Clocked for RegisterFile {
    fn update(&mut self) {
        if let Some((idx, val)) = self.pending.take() {
            tracing::info!(
                "register write: {} = {}",
                reg_code::name_of(idx),
                format_reg_val(val)
            );
            self.regs[idx as usize] = val;
        }
    }
}

impl std::fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (row, chunk) in self.regs.chunks(4).enumerate() {
            for (col, val) in chunk.iter().enumerate() {
                let name = reg_code::name_of((row * 4 + col) as u8);
                write!(f, "{name:>4} {} ", format_reg_val(*val))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The memory behind the single shared port.
#[derive(Debug, Clone, Default)]
pub struct DataMemory {
    mem: MemData,
    pending: Option<(u32, u32)>,
}

impl DataMemory {
    pub fn new(mem: MemData) -> Self {
        Self { mem, pending: None }
    }
    pub fn read(&self, addr: u32) -> Result<u32, SimError> {
        self.mem.read(addr)
    }
    /// Drive the write port. The address is checked now, so a failing
    /// store never reaches the clock edge.
    pub fn write(&mut self, addr: u32, val: u32) -> Result<(), SimError> {
        MemData::index(addr)?;
        self.pending = Some((addr, val));
        Ok(())
    }
    pub fn data(&self) -> &MemData {
        &self.mem
    }
}

impl Clocked for DataMemory {
    fn update(&mut self) {
        if let Some((addr, val)) = self.pending.take() {
            tracing::info!("memory write: [{addr:#06x}] = {val:#010x}");
            if let Err(e) = self.mem.write(addr, val) {
                tracing::warn!("dropped memory write: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alu(a: u32, b: u32, op: AluControl, shift: ShiftKind) -> unit_out::ArithmeticLogicUnit {
        let mut out = unit_out::ArithmeticLogicUnit::default();
        ArithmeticLogicUnit::trigger(unit_in::ArithmeticLogicUnit { a, b, op, shift }, &mut out);
        out
    }

    #[test]
    fn alu_operations() {
        assert_eq!(alu(9, 10, AluControl::Add, ShiftKind::Lsl).result, 19);
        assert_eq!(alu(10, 9, AluControl::Sub, ShiftKind::Lsl).result, 1);
        assert_eq!(alu(0, 9, AluControl::Sub, ShiftKind::Lsl).result, 0xFFFF_FFF7);
        assert_eq!(alu(9, 10, AluControl::And, ShiftKind::Lsl).result, 8);
        assert_eq!(alu(9, 10, AluControl::Orr, ShiftKind::Lsl).result, 11);
        assert_eq!(alu(1, 2, AluControl::Shift, ShiftKind::Lsl).result, 4);
        assert_eq!(alu(26, 1, AluControl::Shift, ShiftKind::Lsr).result, 13);

        let out = alu(4, 4, AluControl::Sub, ShiftKind::Lsl);
        assert!(out.zero);
        assert!(!alu(4, 3, AluControl::Sub, ShiftKind::Lsl).zero);
    }

    #[test]
    fn extension_modes() {
        let mut out = unit_out::Extend::default();
        Extend::trigger(
            unit_in::Extend {
                instr: 0xE4112064,
                imm_src: ImmSrc::Mem12,
            },
            &mut out,
        );
        assert_eq!(out.ext_imm, 100);
        Extend::trigger(
            unit_in::Extend {
                instr: 0xE8FFFFFD,
                imm_src: ImmSrc::Branch24,
            },
            &mut out,
        );
        assert_eq!(out.ext_imm as i32, -12);
        Extend::trigger(
            unit_in::Extend {
                instr: 0xE1A07101,
                imm_src: ImmSrc::Shift5,
            },
            &mut out,
        );
        assert_eq!(out.ext_imm, 2);
    }

    #[test]
    fn register_select() {
        let mut out = unit_out::RegisterSelect::default();
        let reg_src = RegSrc {
            ra1: Ra1Src::Rn,
            ra2: Ra2Src::Rd,
        };
        // str r7, [r0, #96]
        RegisterSelect::trigger(
            unit_in::RegisterSelect {
                instr: 0xE4007060,
                reg_src,
            },
            &mut out,
        );
        assert_eq!((out.ra1, out.ra2, out.wa3), (0, 7, 7));
    }

    #[test]
    fn decoder_reports_errors() {
        let mut out = unit_out::InstructionDecoder::default();
        InstructionDecoder::trigger(unit_in::InstructionDecoder { instr: 0xEC000000 }, &mut out);
        assert!(out.error.is_some());
    }

    #[test]
    fn condition_logic() {
        let eval = |cond, zf, decoded| {
            let mut out = unit_out::CondLogic::default();
            CondLogic::trigger(unit_in::CondLogic { cond, zf, decoded }, &mut out);
            out.cond_ex
        };
        assert!(eval(Condition::Al, false, true));
        assert!(eval(Condition::Eq, true, true));
        assert!(!eval(Condition::Eq, false, true));
        assert!(eval(Condition::Eq, false, false));
    }

    #[test]
    fn register_write_is_edge_triggered() {
        let mut rf = RegisterFile::default();
        rf.write(3, 42);
        assert_eq!(rf.read(3), 0);
        rf.update();
        assert_eq!(rf.read(3), 42);
        rf.update();
        assert_eq!(rf.read(3), 42);
    }

    #[test]
    fn failing_store_is_rejected_before_the_edge() {
        let mut dm = DataMemory::new(MemData::new());
        assert!(dm.write(u32::MAX, 1).is_err());
        dm.write(96, 4).unwrap();
        assert_eq!(dm.read(96).unwrap(), 0);
        dm.update();
        assert_eq!(dm.read(96).unwrap(), 4);
    }
}
