//! Sequential-logic primitives for cycle-accurate simulation.
//!
//! Everything stateful is modelled as a current/next pair: stages read the
//! current view and write the next view, and a terminal `tick()` advances
//! every cell at once. Newer-stage writes become visible only in the
//! following cycle, which is what makes a single-threaded loop behave like
//! simultaneous hardware stages.

mod bus;
mod delay;
mod fifo;
mod latch;
mod tickable;

pub use bus::{Bus, OutPort};
pub use delay::DelayLine;
pub use fifo::{Fifo, SeqFifo};
pub use latch::{Counter, Latch};
pub use tickable::Tickable;
