//! This module contains utilities for verifying the correctness of the
//! multicycle machine.

mod diff;

use crate::{asm::tests, config::SimConfig, framework::MemData, McSim};

pub struct SimTester {
    config: SimConfig,
}

impl SimTester {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }

    /// Assemble `src` and run it until the machine goes idle.
    fn simulate(&self, src: &str) -> anyhow::Result<McSim> {
        let mut sim = McSim::new(self.make_mem(src)?, self.config.clone());
        sim.run()?;
        Ok(sim)
    }

    fn make_mem(&self, src: &str) -> anyhow::Result<MemData> {
        let option = crate::AssembleOption::default().set_branch_target(self.config.branch_target());
        let obj = crate::assemble(src, option)?;
        Ok(obj.obj.init_mem())
    }
}

#[test]
fn test_instructions() -> anyhow::Result<()> {
    let tester = SimTester::new(SimConfig::default());
    tester.test_op()?;
    tester.test_mov()?;
    tester.test_cmp_beq()?;
    tester.test_mem()?;
    Ok(())
}

#[test]
fn test_programs_against_isa() -> anyhow::Result<()> {
    let tester = SimTester::new(SimConfig::default());
    tester.test_isa(tests::ISA_TEST, 100)?;
    // this one jumps back to 0 and never settles, so bound the run
    tester.test_isa(tests::SUBROUTINE_TEST, 500)?;
    Ok(())
}

#[test]
fn test_pc_relative_mode() -> anyhow::Result<()> {
    let config = SimConfig::default().set_branch_target(crate::BranchTarget::PcRelative);
    let tester = SimTester::new(config);
    tester.test_cmp_beq()?;
    tester.test_isa(tests::SUBROUTINE_TEST, 500)?;
    Ok(())
}
