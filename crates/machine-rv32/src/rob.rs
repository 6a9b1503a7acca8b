//! Reorder buffer.

use rv32i::Opcode;
use sim_core::{Latch, Tickable};

/// Ring slots. Tags are 1-based slot indices; tag 0 is the "no rename"
/// sentinel, so at most `ROB_SLOTS - 1` entries are in flight at once.
pub const ROB_SLOTS: usize = 16;

/// A speculative result awaiting in-order retirement.
#[derive(Debug, Clone, Copy, Default)]
pub struct RobEntry {
    /// 1-based slot tag.
    pub idx: u8,
    pub raw: u32,
    pub op: Opcode,
    /// 1 until the result is written back, then 0.
    pub countdown: u8,
    pub dest: u8,
    pub data: u32,
    pub addr: u32,
    pub cur_pc: u32,
    pub nex_pc: u32,
    /// Recovery PC if the prediction was wrong.
    pub mis_pc: u32,
    /// Predicted-taken flag recorded at fetch.
    pub predicted: bool,
}

#[derive(Debug, Clone)]
struct RobState {
    slots: [RobEntry; ROB_SLOTS],
    head: usize,
    len: usize,
}

impl RobState {
    fn contains(&self, slot: usize) -> bool {
        let offset = (slot + ROB_SLOTS - self.head) % ROB_SLOTS;
        offset < self.len
    }
}

/// In-order queue of in-flight instructions enforcing in-order commit.
pub struct ReorderBuffer {
    state: Latch<RobState>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self {
            state: Latch::new(RobState {
                slots: [RobEntry::default(); ROB_SLOTS],
                head: 0,
                len: 0,
            }),
        }
    }

    pub fn is_full(&self) -> bool {
        self.state.get().len == ROB_SLOTS - 1
    }

    /// Reserve the next slot and return its 1-based tag.
    pub fn allocate(&mut self) -> u8 {
        let next = self.state.next_mut();
        debug_assert!(next.len < ROB_SLOTS - 1, "reorder buffer overflow");
        let slot = (next.head + next.len) % ROB_SLOTS;
        next.len += 1;
        slot as u8 + 1
    }

    /// Fill a slot reserved by `allocate` this cycle.
    pub fn issue(&mut self, tag: u8, entry: RobEntry) {
        let next = self.state.next_mut();
        let slot = usize::from(tag - 1);
        if next.contains(slot) {
            next.slots[slot] = entry;
        }
    }

    /// Has this in-flight slot already been written back?
    pub fn ready(&self, tag: u8) -> bool {
        let cur = self.state.get();
        let slot = usize::from(tag - 1);
        cur.contains(slot) && cur.slots[slot].countdown == 0
    }

    /// Written-back value of an in-flight slot.
    pub fn value(&self, tag: u8) -> u32 {
        self.state.get().slots[usize::from(tag - 1)].data
    }

    /// Record a CDB result and mark the slot resolved.
    pub fn apply(&mut self, tag: u8, data: u32, addr: u32) {
        let next = self.state.next_mut();
        let slot = usize::from(tag - 1);
        if next.contains(slot) {
            let entry = &mut next.slots[slot];
            entry.countdown -= 1;
            entry.data = data;
            entry.addr = addr;
        }
    }

    /// Pop and return the head if its result has been written back.
    pub fn commit(&mut self) -> Option<RobEntry> {
        let (cur, next) = self.state.split();
        if cur.len == 0 {
            return None;
        }
        let head = &cur.slots[cur.head];
        if head.countdown != 0 {
            return None;
        }
        let entry = *head;
        next.head = (next.head + 1) % ROB_SLOTS;
        next.len -= 1;
        Some(entry)
    }

    pub fn clear(&mut self) {
        let next = self.state.next_mut();
        next.head = 0;
        next.len = 0;
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tickable for ReorderBuffer {
    fn tick(&mut self) {
        self.state.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: u8) -> RobEntry {
        RobEntry {
            idx: tag,
            countdown: 1,
            ..RobEntry::default()
        }
    }

    #[test]
    fn tags_are_one_based_slot_indices() {
        let mut rob = ReorderBuffer::new();
        assert_eq!(rob.allocate(), 1);
        assert_eq!(rob.allocate(), 2);
    }

    #[test]
    fn head_commits_only_after_writeback() {
        let mut rob = ReorderBuffer::new();
        let tag = rob.allocate();
        rob.issue(tag, entry(tag));
        rob.tick();
        assert!(rob.commit().is_none());
        rob.apply(tag, 77, 0);
        rob.tick();
        assert!(rob.ready(tag));
        assert_eq!(rob.value(tag), 77);
        let committed = rob.commit().expect("resolved head commits");
        assert_eq!(committed.data, 77);
        rob.tick();
        assert!(rob.commit().is_none());
    }

    #[test]
    fn commit_is_in_order() {
        let mut rob = ReorderBuffer::new();
        let first = rob.allocate();
        let second = rob.allocate();
        rob.issue(first, entry(first));
        rob.issue(second, entry(second));
        rob.tick();
        // Only the younger entry has resolved; the head must still block.
        rob.apply(second, 5, 0);
        rob.tick();
        assert!(rob.commit().is_none());
        assert!(rob.ready(second));
    }

    #[test]
    fn fills_at_one_less_than_the_ring() {
        let mut rob = ReorderBuffer::new();
        for _ in 0..ROB_SLOTS - 1 {
            let tag = rob.allocate();
            rob.issue(tag, entry(tag));
        }
        rob.tick();
        assert!(rob.is_full());
    }

    #[test]
    fn tags_wrap_around_the_ring() {
        let mut rob = ReorderBuffer::new();
        for _ in 0..ROB_SLOTS - 1 {
            let tag = rob.allocate();
            rob.issue(tag, entry(tag));
        }
        rob.tick();
        rob.apply(1, 0, 0);
        rob.tick();
        assert!(rob.commit().is_some());
        rob.tick();
        rob.apply(2, 0, 0);
        rob.tick();
        assert!(rob.commit().is_some());
        rob.tick();
        // The sixteenth slot comes into play, then the freed slots recycle.
        assert_eq!(rob.allocate(), 16);
        assert_eq!(rob.allocate(), 1);
    }
}
