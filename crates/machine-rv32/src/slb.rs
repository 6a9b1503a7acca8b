//! Store/load buffer.

use sim_core::{Fifo, Latch, Tickable};

use crate::station::BufferEntry;

pub const SLB_SLOTS: usize = 15;

/// In-order queue of memory operations.
///
/// Only the head may dispatch, which keeps memory in program order. A load
/// additionally waits until no executed-but-uncommitted store is pending,
/// since stores reach RAM only after they commit and drain their delay
/// line.
pub struct StoreLoadBuffer {
    queue: Latch<Fifo<BufferEntry, SLB_SLOTS>>,
}

impl StoreLoadBuffer {
    pub fn new() -> Self {
        Self {
            queue: Latch::new(Fifo::new()),
        }
    }

    pub fn is_full(&self) -> bool {
        self.queue.get().is_full()
    }

    /// Append a memory op at the tail. Callers gate on `is_full`.
    pub fn issue(&mut self, entry: BufferEntry) {
        self.queue.next_mut().push(entry);
    }

    /// Pop and return the head if it is ready and its port is eligible.
    pub fn take_ready(
        &mut self,
        store_free: bool,
        load_free: bool,
        pending_stores: u32,
    ) -> Option<BufferEntry> {
        let (cur, next) = self.queue.split();
        let head = cur.front()?;
        if !head.ready() {
            return None;
        }
        let eligible = if head.op.is_load() {
            load_free && pending_stores == 0
        } else {
            store_free
        };
        if eligible {
            let entry = *head;
            next.pop();
            Some(entry)
        } else {
            None
        }
    }

    /// Broadcast a CDB message to every waiting operand.
    pub fn apply(&mut self, tag: u8, data: u32) {
        self.queue
            .next_mut()
            .for_each_mut(|entry| entry.apply(tag, data));
    }

    pub fn clear(&mut self) {
        self.queue.next_mut().clear();
    }
}

impl Default for StoreLoadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tickable for StoreLoadBuffer {
    fn tick(&mut self) {
        self.queue.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv32i::Opcode;

    fn entry(op: Opcode, rob_idx: u8, src1: u8) -> BufferEntry {
        BufferEntry {
            rob_idx,
            op,
            src1,
            ..BufferEntry::default()
        }
    }

    #[test]
    fn only_the_head_dispatches() {
        let mut slb = StoreLoadBuffer::new();
        slb.issue(entry(Opcode::Sw, 1, 2));
        slb.issue(entry(Opcode::Lw, 2, 0));
        slb.tick();
        // Head store still waits on an operand; the ready load behind it
        // must not overtake.
        assert!(slb.take_ready(true, true, 0).is_none());
    }

    #[test]
    fn loads_wait_for_pending_stores() {
        let mut slb = StoreLoadBuffer::new();
        slb.issue(entry(Opcode::Lw, 1, 0));
        slb.tick();
        assert!(slb.take_ready(true, true, 1).is_none());
        assert!(slb.take_ready(true, false, 0).is_none());
        let got = slb.take_ready(true, true, 0).expect("load dispatches");
        assert_eq!(got.rob_idx, 1);
    }

    #[test]
    fn stores_need_only_a_free_store_port() {
        let mut slb = StoreLoadBuffer::new();
        slb.issue(entry(Opcode::Sb, 4, 0));
        slb.tick();
        assert!(slb.take_ready(false, true, 3).is_none());
        assert!(slb.take_ready(true, false, 3).is_some());
    }

    #[test]
    fn broadcast_reaches_queued_entries() {
        let mut slb = StoreLoadBuffer::new();
        slb.issue(entry(Opcode::Sw, 1, 7));
        slb.tick();
        slb.apply(7, 0xAB);
        slb.tick();
        let got = slb.take_ready(true, true, 0).expect("ready after update");
        assert_eq!(got.val1, 0xAB);
    }
}
