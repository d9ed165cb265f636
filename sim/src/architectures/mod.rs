//! The multicycle processor: control unit, datapath units and the machine
//! that clocks them.

pub mod control;
pub mod hardware_mc;
mod multicycle;

pub use multicycle::McSim;
