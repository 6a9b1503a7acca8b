//! Cycle-accurate RV32I machine with an out-of-order speculative core.
//!
//! The core is a Tomasulo-style pipeline: a bounded instruction queue feeds
//! a reservation station and a store/load buffer, results broadcast over a
//! single common data bus, a reorder buffer retires in program order, and a
//! two-level adaptive predictor speculates through branches with a full
//! squash on mispredict. Memory latency is modelled by 3-cycle delay lines
//! on each side of the RAM.
//!
//! Programs enter as plain-text hex dumps (`@addr` directives plus byte
//! tokens) and run until the HALT pattern commits; the conventional result
//! is the low byte of `x10`.

mod config;
mod loader;
mod machine;
mod memory;
mod predictor;
mod regfile;
mod rob;
mod slb;
mod station;

pub use config::MachineConfig;
pub use loader::LoadError;
pub use machine::Rv32Machine;
