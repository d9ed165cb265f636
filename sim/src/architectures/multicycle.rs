//! The multicycle machine.
//!
//! A cycle is simulated in two phases. First every signal is computed from
//! the values committed at the previous edge ([`McSim::propagate`]), which
//! only borrows the machine immutably and may fail without side effects.
//! Then the computed values are driven into the clocked elements and the
//! edge is applied to all of them at once.

use super::{
    control::{self, ControlSignals, State},
    hardware_mc::*,
};
use crate::{
    config::SimConfig,
    error::SimError,
    framework::{Clocked, Latch, MemData, Stat},
    isa::{Instruction, Opcode, RegFile},
    record::CycleRecord,
};

/// Architectural state: what survives between instructions.
#[derive(Debug, Clone, Default)]
struct ArchState {
    regs: RegisterFile,
    mem: DataMemory,
    pc: Latch<u32>,
    zf: Latch<bool>,
}

/// Non-architectural latches, only meaningful within one instruction.
#[derive(Debug, Clone, Default)]
struct Latches {
    state: Latch<State>,
    ir: Latch<u32>,
    /// Address of the instruction in IR.
    inst_addr: Latch<u32>,
    /// Set in decode, held until the next fetch.
    decoded: Latch<Option<Instruction>>,
    data: Latch<u32>,
    a: Latch<u32>,
    write_data: Latch<u32>,
    alu_out: Latch<u32>,
}

impl Clocked for Latches {
    fn update(&mut self) {
        self.state.update();
        self.ir.update();
        self.inst_addr.update();
        self.decoded.update();
        self.data.update();
        self.a.update();
        self.write_data.update();
        self.alu_out.update();
    }
}

impl Latches {
    /// Drive the reset values; they land at the next edge.
    fn drive_reset(&mut self) {
        self.state.drive(State::Fetch);
        self.ir.drive(0);
        self.inst_addr.drive(0);
        self.decoded.drive(None);
        self.data.drive(0);
        self.a.drive(0);
        self.write_data.drive(0);
        self.alu_out.drive(0);
    }
}

/// What a cycle drives into the clocked elements.
struct Drive {
    record: CycleRecord,
    ctrl: ControlSignals,
    decoded: Option<Instruction>,
    read_data: Option<u32>,
    /// A taken branch to its own address.
    idle: bool,
}

/// Multicycle simulator of the ARM subset.
pub struct McSim {
    arch: ArchState,
    latches: Latches,
    config: SimConfig,
    stat: Stat,
    /// The error that stopped the machine, returned again on every step.
    fault: Option<SimError>,
    cycle_count: u64,
    inst_count: u64,
}

impl McSim {
    /// Create a machine with the given memory image, reset and ready to
    /// fetch from address 0.
    pub fn new(memory: MemData, config: SimConfig) -> Self {
        let mut sim = Self {
            arch: ArchState {
                mem: DataMemory::new(memory),
                ..Default::default()
            },
            latches: Latches::default(),
            config,
            stat: Stat::Aok,
            fault: None,
            cycle_count: 0,
            inst_count: 0,
        };
        sim.reset();
        sim
    }

    /// Hold the reset line for the configured number of cycles. Each one is a
    /// clock edge: the control state returns to Fetch, PC to 0 and the
    /// internal latches are cleared. Registers, flag and memory keep their
    /// contents. Reset cycles count towards [`McSim::cycle_count`].
    pub fn reset(&mut self) {
        for _ in 0..self.config.reset_cycles {
            self.latches.drive_reset();
            self.arch.pc.drive(0);
            self.latches.update();
            self.arch.pc.update();
            self.cycle_count += 1;
        }
        self.stat = Stat::Aok;
        self.fault = None;
        tracing::debug!("reset held for {} cycle(s)", self.config.reset_cycles);
    }

    pub fn set_register(&mut self, idx: u8, val: u32) {
        self.arch.regs.set(idx, val);
    }

    /// Compute every signal of the current cycle from committed values.
    fn propagate(&self) -> Result<Drive, SimError> {
        let state = self.latches.state.sample();
        let pc = self.arch.pc.sample();
        let ir = self.latches.ir.sample();
        let zf = self.arch.zf.sample();
        let mut sig = UnitOutputSignal::default();

        // the decoder is combinational on IR; its output is only trusted
        // in decode, afterwards the cached copy is used
        let decoded = match state {
            State::Fetch => None,
            State::Decode => {
                InstructionDecoder::trigger(unit_in::InstructionDecoder { instr: ir }, &mut sig.dec);
                if let Some(e) = sig.dec.error.take() {
                    return Err(e.into());
                }
                Some(sig.dec.inst)
            }
            _ => self.latches.decoded.sample(),
        };
        let op: Option<Opcode> = decoded.map(|i| i.op);

        let ctrl = control::signals(state, op, self.config.branch_target)?;
        let next_state = control::next_state(state, op)?;

        CondLogic::trigger(
            unit_in::CondLogic {
                cond: decoded.map(|i| i.cond).unwrap_or_default(),
                zf,
                decoded: decoded.is_some(),
            },
            &mut sig.cond,
        );
        let cond_ex = sig.cond.cond_ex;
        let ctrl = ctrl.gate(cond_ex);

        RegisterSelect::trigger(
            unit_in::RegisterSelect {
                instr: ir,
                reg_src: ctrl.reg_src,
            },
            &mut sig.reg_sel,
        );
        let rd1 = self.arch.regs.read(sig.reg_sel.ra1);
        let rd2 = self.arch.regs.read(sig.reg_sel.ra2);

        Extend::trigger(
            unit_in::Extend {
                instr: ir,
                imm_src: ctrl.imm_src,
            },
            &mut sig.ext,
        );
        SrcAMux::trigger(
            unit_in::SrcAMux {
                sel: ctrl.alu_src_a,
                a: self.latches.a.sample(),
                pc,
            },
            &mut sig.src_a,
        );
        SrcBMux::trigger(
            unit_in::SrcBMux {
                sel: ctrl.alu_src_b,
                write_data: self.latches.write_data.sample(),
                ext_imm: sig.ext.ext_imm,
            },
            &mut sig.src_b,
        );
        ArithmeticLogicUnit::trigger(
            unit_in::ArithmeticLogicUnit {
                a: sig.src_a.src_a,
                b: sig.src_b.src_b,
                op: ctrl.alu_control,
                shift: decoded.map(|i| i.shift).unwrap_or_default(),
            },
            &mut sig.alu,
        );
        ResultMux::trigger(
            unit_in::ResultMux {
                sel: ctrl.result_src,
                alu_out: self.latches.alu_out.sample(),
                data: self.latches.data.sample(),
                alu_result: sig.alu.result,
            },
            &mut sig.result_mux,
        );
        let result = sig.result_mux.result;
        AddressMux::trigger(
            unit_in::AddressMux {
                sel: ctrl.adr_src,
                pc,
                result,
            },
            &mut sig.adr_mux,
        );
        let adr = sig.adr_mux.adr;

        let read_data = if ctrl.mem_port_active() && !ctrl.mem_write {
            Some(self.arch.mem.read(adr)?)
        } else {
            None
        };
        if ctrl.mem_write {
            MemData::index(adr)?;
        }

        let idle = state == State::BranchComplete
            && ctrl.pc_write
            && result == self.latches.inst_addr.sample();

        let record = CycleRecord {
            cycle: self.cycle_count + 1,
            state,
            next_state,
            pc,
            instr: ir,
            decoded,
            ra1: sig.reg_sel.ra1,
            ra2: sig.reg_sel.ra2,
            wa3: sig.reg_sel.wa3,
            rd1,
            rd2,
            src_a: sig.src_a.src_a,
            src_b: sig.src_b.src_b,
            ext_imm: sig.ext.ext_imm,
            alu_result: sig.alu.result,
            alu_zero: sig.alu.zero,
            result,
            adr,
            read_data,
            write_data: self.latches.write_data.sample(),
            ctrl,
            cond_ex,
            zero_flag: zf,
        };
        Ok(Drive {
            record,
            ctrl,
            decoded,
            read_data,
            idle,
        })
    }

    /// Drive the computed values and apply the clock edge.
    fn commit(&mut self, drive: &Drive) -> Result<(), SimError> {
        let Drive {
            record: rec,
            ctrl,
            decoded,
            read_data,
            ..
        } = drive;
        let l = &mut self.latches;
        l.state.drive(rec.next_state);
        if ctrl.ir_write {
            if let Some(word) = read_data {
                l.ir.drive(*word);
            }
            l.inst_addr.drive(rec.pc);
        }
        if rec.state == State::Decode {
            l.decoded.drive(*decoded);
        }
        if let Some(word) = read_data {
            l.data.drive(*word);
        }
        l.a.drive(rec.rd1);
        l.write_data.drive(rec.rd2);
        l.alu_out.drive(rec.alu_result);

        let a = &mut self.arch;
        if ctrl.pc_write {
            if rec.state != State::Fetch {
                tracing::info!("branch taken: pc = {:#x}", rec.result);
            }
            a.pc.drive(rec.result);
        }
        if ctrl.reg_write {
            a.regs.write(rec.wa3, rec.result);
        }
        if ctrl.mem_write {
            a.mem.write(rec.adr, rec.write_data)?;
        }
        if ctrl.flag_write {
            tracing::info!("zero flag update: {}", rec.alu_zero);
            a.zf.drive(rec.alu_zero);
        }

        self.latches.update();
        a.regs.update();
        a.mem.update();
        a.pc.update();
        a.zf.update();
        Ok(())
    }

    /// Advance one clock cycle and return what happened in it.
    ///
    /// A machine that stopped on an error refuses to advance and returns
    /// that error again. A machine that went idle keeps spinning on its
    /// branch.
    pub fn step(&mut self) -> Result<CycleRecord, SimError> {
        self.check_fault()?;
        let drive = match self.propagate() {
            Ok(d) => d,
            Err(e) => return Err(self.halt(e)),
        };
        if let Err(e) = self.commit(&drive) {
            return Err(self.halt(e));
        }
        self.cycle_count += 1;
        tracing::debug!(
            "cycle {}: {} -> {}",
            drive.record.cycle,
            drive.record.state,
            drive.record.next_state
        );
        if drive.record.next_state == State::Fetch {
            self.inst_count += 1;
        }
        if drive.idle {
            self.stat = Stat::Idle;
        }
        if self.config.tty_out {
            println!("{}", drive.record);
        }
        Ok(drive.record)
    }

    /// The cycle budget ran out. The machine itself is fine and may be run
    /// again.
    fn give_up(&self) -> SimError {
        let e = SimError::CycleLimit {
            limit: self.config.max_cycles,
        };
        tracing::warn!("{e}");
        e
    }

    fn halt(&mut self, e: SimError) -> SimError {
        tracing::warn!("machine stopped: {e}");
        self.stat = e.stat();
        self.fault = Some(e.clone());
        e
    }

    /// Run cycles until the current instruction completes, i.e. the control
    /// state is back to Fetch. Returns the records of those cycles.
    pub fn step_instruction(&mut self) -> Result<Vec<CycleRecord>, SimError> {
        let mut records = Vec::new();
        loop {
            let rec = self.step()?;
            let done = rec.next_state == State::Fetch;
            records.push(rec);
            if done {
                return Ok(records);
            }
        }
    }

    fn check_fault(&self) -> Result<(), SimError> {
        match &self.fault {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Execute `n` whole instructions, stopping early if the machine goes
    /// idle.
    pub fn run_instructions(&mut self, n: u64) -> Result<(), SimError> {
        self.check_fault()?;
        for _ in 0..n {
            if self.is_terminate() {
                break;
            }
            self.step_instruction()?;
        }
        Ok(())
    }

    /// Execute instructions until PC is `addr` at an instruction boundary.
    pub fn run_until_pc(&mut self, addr: u32) -> Result<(), SimError> {
        self.check_fault()?;
        let limit = self.cycle_count + self.config.max_cycles;
        while !self.at_boundary() || self.pc() != addr {
            if self.is_terminate() {
                break;
            }
            if self.cycle_count >= limit {
                return Err(self.give_up());
            }
            self.step()?;
        }
        Ok(())
    }

    /// Run until the machine terminates, or the cycle limit is exceeded.
    pub fn run(&mut self) -> Result<(), SimError> {
        self.check_fault()?;
        let limit = self.cycle_count + self.config.max_cycles;
        while !self.is_terminate() {
            if self.cycle_count >= limit {
                return Err(self.give_up());
            }
            self.step()?;
        }
        Ok(())
    }

    fn at_boundary(&self) -> bool {
        self.latches.state.sample() == State::Fetch
    }

    /// Whether the simulation is terminated
    pub fn is_terminate(&self) -> bool {
        self.stat.is_terminal()
    }
    pub fn stat(&self) -> Stat {
        self.stat
    }
    pub fn state(&self) -> State {
        self.latches.state.sample()
    }
    pub fn pc(&self) -> u32 {
        self.arch.pc.sample()
    }
    pub fn zero_flag(&self) -> bool {
        self.arch.zf.sample()
    }
    pub fn registers(&self) -> &RegFile {
        self.arch.regs.values()
    }
    pub fn register_file(&self) -> &RegisterFile {
        &self.arch.regs
    }
    pub fn mem(&self) -> &MemData {
        self.arch.mem.data()
    }
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }
    pub fn inst_count(&self) -> u64 {
        self.inst_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        architectures::control::{AluSrcB, ResultSrc},
        config::BranchTarget,
        error::DecodeError,
    };

    fn machine(code: &[u32], data: &[(u32, u32)]) -> McSim {
        let mut mem = MemData::new();
        mem.load(0, code).unwrap();
        for &(addr, val) in data {
            mem.write(addr, val).unwrap();
        }
        McSim::new(mem, SimConfig::default())
    }

    #[test]
    fn load_takes_five_cycles() {
        let mut sim = machine(&[0xE4112064], &[(100, 9)]);
        let recs = sim.step_instruction().unwrap();
        let states: Vec<State> = recs.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            [
                State::Fetch,
                State::Decode,
                State::MemAdr,
                State::MemRead,
                State::MemWriteback
            ]
        );
        let fetch = &recs[0];
        assert!(fetch.ctrl.ir_write);
        assert_eq!(fetch.result, 4);
        assert_eq!(fetch.read_data, Some(0xE4112064));
        let wb = &recs[4];
        assert_eq!(wb.ctrl.result_src, ResultSrc::MemData);
        assert_eq!(wb.result, 9);
        assert_eq!(sim.registers()[2], 9);
        assert_eq!(sim.pc(), 4);
        // one reset cycle, then the load
        assert_eq!((sim.cycle_count(), sim.inst_count()), (1 + 5, 1));
    }

    #[test]
    fn register_write_lands_on_the_edge() {
        // add r2, r2, r2
        let mut sim = machine(&[0xE0822002], &[]);
        sim.set_register(2, 3);
        for _ in 0..3 {
            sim.step().unwrap();
        }
        let wb = sim.step().unwrap();
        assert_eq!(wb.state, State::AluWriteback);
        assert!(wb.ctrl.reg_write);
        assert_eq!(wb.result, 6);
        // the read port still shows the old value during writeback
        assert_eq!((wb.ra1, wb.rd1), (2, 3));
        assert_eq!(sim.registers()[2], 6);
    }

    #[test]
    fn mov_shifts_by_immediate() {
        let mut sim = machine(&[0xE1A07101], &[]);
        sim.set_register(1, 1);
        let recs = sim.step_instruction().unwrap();
        assert_eq!(recs.len(), 4);
        let exec = &recs[2];
        assert_eq!(exec.state, State::ExecuteR);
        assert_eq!(exec.ctrl.alu_src_b, AluSrcB::ExtImm);
        assert_eq!((exec.src_a, exec.src_b, exec.ext_imm), (1, 2, 2));
        assert_eq!(sim.registers()[7], 4);
    }

    #[test]
    fn compare_sets_flag_only() {
        // cmp r2, r6, r5 with r6 = 11, r5 = 8
        let mut sim = machine(&[0xE1462005], &[]);
        sim.set_register(6, 11);
        sim.set_register(5, 8);
        sim.set_register(2, 77);
        let recs = sim.step_instruction().unwrap();
        assert!(recs.iter().all(|r| !r.ctrl.reg_write));
        assert!(recs[2].ctrl.flag_write);
        assert_eq!(sim.registers()[2], 77);
        assert!(!sim.zero_flag());
    }

    #[test]
    fn beq_not_taken_keeps_sequential_pc() {
        let mut sim = machine(&[0x08000014], &[]);
        let recs = sim.step_instruction().unwrap();
        let done = recs.last().unwrap();
        assert_eq!(done.state, State::BranchComplete);
        assert!(!done.cond_ex);
        assert!(!done.ctrl.pc_write);
        assert_eq!(done.result, 80);
        assert_eq!(sim.pc(), 4);
    }

    #[test]
    fn self_branch_goes_idle() {
        // b 0
        let mut sim = machine(&[0xE8000000], &[]);
        sim.run().unwrap();
        assert_eq!(sim.stat(), Stat::Idle);
        assert_eq!(sim.pc(), 0);
        assert_eq!(sim.cycle_count(), 1 + 4);
    }

    #[test]
    fn decode_error_halts_the_machine() {
        let mut sim = machine(&[0xEC000000], &[]);
        sim.step().unwrap();
        let err = sim.step().unwrap_err();
        assert!(matches!(
            err,
            SimError::Decode(DecodeError::UnsupportedClass { .. })
        ));
        assert_eq!(sim.stat(), Stat::Ins);
        assert_eq!(sim.state(), State::Decode);
        // no retry
        assert_eq!(sim.step().unwrap_err(), err);
        assert_eq!(sim.cycle_count(), 1 + 1);
        assert_eq!(sim.run().unwrap_err(), err);

        sim.reset();
        assert_eq!(sim.stat(), Stat::Aok);
        assert_eq!(sim.state(), State::Fetch);
    }

    #[test]
    fn invalid_store_address_is_atomic() {
        // str r7, [r1, #0] with r1 out of range
        let mut sim = machine(&[0xE4017000], &[]);
        sim.set_register(1, 0x0100_0000);
        sim.set_register(7, 5);
        let err = sim.run().unwrap_err();
        assert_eq!(err, SimError::InvalidAddress { addr: 0x0100_0000 });
        assert_eq!(sim.stat(), Stat::Adr);
        assert_eq!(sim.state(), State::MemWrite);
        assert_eq!(sim.cycle_count(), 1 + 3);
    }

    #[test]
    fn cycle_limit() {
        // b 4; b 0
        let mut mem = MemData::new();
        mem.load(0, &[0xE8000001, 0xE8000000]).unwrap();
        let mut sim = McSim::new(mem, SimConfig::default().set_max_cycles(100));
        assert_eq!(sim.run(), Err(SimError::CycleLimit { limit: 100 }));
        assert_eq!(sim.cycle_count(), 1 + 100);
        // running out of budget is not a fault
        assert_eq!(sim.stat(), Stat::Aok);
        assert!(!sim.is_terminate());
        sim.step_instruction().unwrap();
        assert_eq!(sim.run(), Err(SimError::CycleLimit { limit: 100 }));
        assert_eq!(sim.cycle_count(), 1 + 100 + 4 + 100);
    }

    #[test]
    fn reset_cycles_are_clock_edges() {
        let prog = [0xE4112064];
        let make = |cycles| {
            let mut mem = MemData::new();
            mem.load(0, &prog).unwrap();
            mem.write(100, 9).unwrap();
            McSim::new(mem, SimConfig::default().set_reset_cycles(cycles))
        };
        let mut short = make(1);
        let mut long = make(50);
        assert_eq!((short.cycle_count(), long.cycle_count()), (1, 50));

        short.step_instruction().unwrap();
        let recs = long.step_instruction().unwrap();
        assert_eq!(recs[0].cycle, 51);
        assert_eq!(short.registers(), long.registers());
        assert_eq!((short.cycle_count(), long.cycle_count()), (6, 55));

        // reset in the middle of an instruction restarts it
        long.set_register(2, 0);
        long.reset();
        long.step().unwrap();
        long.step().unwrap();
        assert_eq!(long.state(), State::MemAdr);
        long.reset();
        assert_eq!(long.cycle_count(), 55 + 50 + 2 + 50);
        assert_eq!((long.state(), long.pc()), (State::Fetch, 0));
        long.step_instruction().unwrap();
        assert_eq!(long.registers()[2], 9);
    }

    #[test]
    fn pc_relative_branch() {
        // at 0: b 8; at 8: b 0
        let mut mem = MemData::new();
        mem.load(0, &[0xE8000001]).unwrap();
        mem.load(8, &[0xE8FFFFFD]).unwrap();
        let config = SimConfig::default().set_branch_target(BranchTarget::PcRelative);
        let mut sim = McSim::new(mem, config);
        sim.run_until_pc(8).unwrap();
        let recs = sim.step_instruction().unwrap();
        assert_eq!(recs[2].src_a, 12);
        assert_eq!(sim.pc(), 0);
    }
}
