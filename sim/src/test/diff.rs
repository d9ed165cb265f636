//! Test the machine by comparing the simulation result with a "ground
//! truth".

use anyhow::Context;

use super::SimTester;

impl SimTester {
    /// Run at most `max_insts` instructions of `src` on both the reference
    /// interpreter and the multicycle machine and compare the architectural
    /// state.
    pub fn test_isa(&self, src: &str, max_insts: u64) -> anyhow::Result<()> {
        let mem = self.make_mem(src).context("assemble")?;
        let answer = crate::isa::simulate(mem.clone(), max_insts, self.config.branch_target(), false)?;

        let mut sim = crate::McSim::new(mem, self.config.clone());
        sim.run_instructions(max_insts)?;

        anyhow::ensure!(
            answer.n_insts == sim.inst_count(),
            "instruction count mismatch: gt = {}, sim = {}",
            answer.n_insts,
            sim.inst_count()
        );
        if &answer.regs != sim.registers() {
            anyhow::bail!(
                "registers mismatch: gt = {:x?}, sim = {:x?}",
                answer.regs,
                sim.registers()
            );
        }
        anyhow::ensure!(
            answer.zf == sim.zero_flag(),
            "zero flag mismatch: gt = {}",
            answer.zf
        );
        anyhow::ensure!(
            answer.pc == sim.pc(),
            "pc mismatch: gt = {:#x}, sim = {:#x}",
            answer.pc,
            sim.pc()
        );
        anyhow::ensure!(answer.idle == sim.stat().is_terminal(), "idle mismatch");
        if &answer.mem != sim.mem() {
            crate::utils::mem_diff(&answer.mem, sim.mem());
            anyhow::bail!("memory mismatch");
        }

        Ok(())
    }
}
