//! Reservation station and the buffer entry it shares with the SLB.

use rv32i::Opcode;
use sim_core::{Latch, Tickable};

pub const RS_SLOTS: usize = 15;

/// A dispatched operation waiting for its operands.
///
/// A nonzero src tag means the operand will arrive from that reorder-buffer
/// slot over the CDB; a zero tag means the matching val holds the operand.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferEntry {
    pub rob_idx: u8,
    pub op: Opcode,
    pub val1: u32,
    pub val2: u32,
    pub src1: u8,
    pub src2: u8,
    pub imm: u32,
}

impl BufferEntry {
    /// Both operands present?
    pub fn ready(&self) -> bool {
        self.src1 == 0 && self.src2 == 0
    }

    /// Latch a CDB broadcast into any matching operand slot.
    pub fn apply(&mut self, tag: u8, data: u32) {
        if self.src1 == tag {
            self.src1 = 0;
            self.val1 = data;
        }
        if self.src2 == tag {
            self.src2 = 0;
            self.val2 = data;
        }
    }
}

/// Unordered pool of ALU operations waiting for operands.
///
/// No fairness guarantee: dispatch picks the first ready entry in slot
/// order. Readiness is judged on the current view; removals and operand
/// updates land on the next view.
pub struct ReservationStation {
    slots: Latch<[Option<BufferEntry>; RS_SLOTS]>,
}

impl ReservationStation {
    pub fn new() -> Self {
        Self {
            slots: Latch::new([None; RS_SLOTS]),
        }
    }

    pub fn is_full(&self) -> bool {
        self.slots.get().iter().all(Option::is_some)
    }

    /// Place an entry in any free slot. Callers gate on `is_full`.
    pub fn issue(&mut self, entry: BufferEntry) {
        let next = self.slots.next_mut();
        let slot = next
            .iter_mut()
            .find(|slot| slot.is_none())
            .expect("reservation station overflow");
        *slot = Some(entry);
    }

    /// Remove and return the first ready entry, if any.
    pub fn take_ready(&mut self) -> Option<BufferEntry> {
        let (cur, next) = self.slots.split();
        for (i, slot) in cur.iter().enumerate() {
            if let Some(entry) = slot {
                if entry.ready() {
                    next[i] = None;
                    return Some(*entry);
                }
            }
        }
        None
    }

    /// Broadcast a CDB message to every waiting operand.
    pub fn apply(&mut self, tag: u8, data: u32) {
        for entry in self.slots.next_mut().iter_mut().flatten() {
            entry.apply(tag, data);
        }
    }

    pub fn clear(&mut self) {
        *self.slots.next_mut() = [None; RS_SLOTS];
    }
}

impl Default for ReservationStation {
    fn default() -> Self {
        Self::new()
    }
}

impl Tickable for ReservationStation {
    fn tick(&mut self) {
        self.slots.tick();
    }
}
