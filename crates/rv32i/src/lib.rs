//! RV32I base integer instruction set.
//!
//! Pure ISA-level building blocks: bit-field extraction, instruction
//! decoding, and ALU evaluation. Nothing here is sequential; the pipeline
//! machinery lives elsewhere.

mod alu;
mod bits;
mod decode;
mod opcode;

pub use alu::{adder, eval};
pub use bits::{sext, slice};
pub use decode::{decode, Instruction, HALT_WORD};
pub use opcode::{Format, Opcode};
