// Whole programs on the multicycle machine

use armmc_sim::{
    assemble,
    isa::{InstrClass, Opcode},
    AssembleOption, BranchTarget, McSim, SimConfig, SimError, Stat, State,
};

const ISA_TEST: &str = include_str!("programs/isa_test.s");
const SUBROUTINE_TEST: &str = include_str!("programs/subroutine_test.s");

fn load(src: &str, branch_target: BranchTarget) -> anyhow::Result<McSim> {
    let option = AssembleOption::default().set_branch_target(branch_target);
    let obj = assemble(src, option)?;
    let config = SimConfig::default().set_branch_target(branch_target);
    Ok(McSim::new(obj.obj.init_mem(), config))
}

#[test]
fn test_isa_program() -> anyhow::Result<()> {
    let mut sim = load(ISA_TEST, BranchTarget::Absolute)?;
    sim.run()?;

    let regs = sim.registers();
    assert_eq!(regs[2], 9);
    assert_eq!(regs[3], 10);
    assert_eq!(regs[4], 19);
    assert_eq!(regs[1], 1);
    assert_eq!(regs[6], 11);
    assert_eq!(regs[5], 8);
    assert_eq!(regs[7], 4);
    assert_eq!(regs[8], 5);
    assert!(sim.zero_flag());
    assert_eq!(sim.mem().read(96)?, 4);

    assert_eq!(sim.stat(), Stat::Idle);
    assert_eq!(sim.pc(), 84);
    assert_eq!(sim.inst_count(), 15);
    // one reset cycle before the program
    assert_eq!(sim.cycle_count(), 1 + 63);
    Ok(())
}

#[test]
fn test_subroutine_program() -> anyhow::Result<()> {
    for branch_target in [BranchTarget::Absolute, BranchTarget::PcRelative] {
        let mut sim = load(SUBROUTINE_TEST, branch_target)?;
        sim.run_until_pc(164)?;

        let regs = sim.registers();
        assert_eq!(regs[2], 0xFFFF_FFF7);
        assert_eq!(regs[10], 0x81);
        assert_eq!(regs[8], 3);
        assert_eq!(regs[0], 1);
        assert_eq!(regs[3], 0);
        assert_eq!(regs[9], 0);

        // the final `b 0` restarts the program
        sim.step_instruction()?;
        assert_eq!(sim.pc(), 0);
        assert_eq!(sim.stat(), Stat::Aok);
    }
    Ok(())
}

#[test]
fn test_store_then_load() -> anyhow::Result<()> {
    let src = r#"
        ldr r1, [r0, #200]
        str r1, [r0, #64]
        ldr r2, [r0, #64]
    done:
        b done
        .pos 200
        .word 0xCAFE
    "#;
    let mut sim = load(src, BranchTarget::Absolute)?;
    sim.run()?;
    assert_eq!(sim.mem().read(64)?, 0xCAFE);
    assert_eq!(sim.registers()[2], 0xCAFE);
    // reset + ldr + str + ldr + idle branch
    assert_eq!(sim.cycle_count(), 1 + 5 + 4 + 5 + 4);
    Ok(())
}

#[test]
fn test_beq_not_taken() -> anyhow::Result<()> {
    let src = r#"
        cmp r1, r2, r3      ; 0 - 0
        ldr r4, [r0, #200]
        cmp r4, r0          ; 7 - 0
        beq away
        add r5, r4, r4
    done:
        b done
        .pos 100
    away:
        b away
        .pos 200
        .word 7
    "#;
    let mut sim = load(src, BranchTarget::Absolute)?;
    sim.run()?;
    assert!(!sim.zero_flag());
    assert_eq!(sim.registers()[5], 14);
    assert_eq!(sim.pc(), 20);
    Ok(())
}

#[test]
fn test_flag_and_write_invariants() -> anyhow::Result<()> {
    let mut sim = load(ISA_TEST, BranchTarget::Absolute)?;
    let mut zf = sim.zero_flag();
    while !sim.is_terminate() {
        let rec = sim.step()?;
        if let Some(inst) = rec.decoded {
            if inst.class() != InstrClass::DataProcessing {
                assert!(!rec.ctrl.flag_write, "cycle {}", rec.cycle);
            }
            if inst.op == Opcode::Cmp {
                assert!(!rec.ctrl.reg_write, "cycle {}", rec.cycle);
            }
        }
        if rec.state != State::ExecuteR {
            assert_eq!(sim.zero_flag(), zf, "cycle {}", rec.cycle);
        }
        zf = sim.zero_flag();
        // the memory port is never written outside MemWrite
        assert!(!rec.ctrl.mem_write || rec.state == State::MemWrite);
    }
    Ok(())
}

#[test]
fn test_fetch_out_of_memory() -> anyhow::Result<()> {
    let src = "b 0x10000";
    let mut sim = load(src, BranchTarget::Absolute)?;
    let err = sim.run().unwrap_err();
    assert_eq!(err, SimError::InvalidAddress { addr: 0x10000 });
    assert_eq!(sim.stat(), Stat::Adr);
    assert_eq!(sim.state(), State::Fetch);
    Ok(())
}
