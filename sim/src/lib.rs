//! Simulator of a multicycle processor for a small ARM subset: assembler,
//! reference interpreter and a cycle-level model of the control FSM and
//! datapath.

pub mod architectures;
mod asm;
mod config;
mod dsl;
mod error;
pub mod framework;
pub mod isa;
mod object;
mod record;
mod utils;

#[cfg(test)]
mod test;

pub use architectures::{control::State, McSim};
pub use asm::{assemble, AssembleOption};
pub use config::{BranchTarget, SimConfig};
pub use error::{DecodeError, SimError};
pub use framework::{MemData, Stat};
pub use object::{Object, ObjectExt, SourceInfo};
pub use record::CycleRecord;
pub use utils::{mem_diff, mem_print};

#[cfg(test)]
mod tests {
    use crate::{assemble, AssembleOption, McSim, SimConfig, Stat};

    #[test]
    fn test_assemble_and_run() {
        let r = assemble(crate::asm::tests::ISA_TEST, AssembleOption::default()).unwrap();
        eprintln!("{}", r);
        let mut sim = McSim::new(r.obj.init_mem(), SimConfig::default());
        sim.run().unwrap();
        assert_eq!(sim.stat(), Stat::Idle);
        eprintln!("{}", sim.register_file());
    }
}
