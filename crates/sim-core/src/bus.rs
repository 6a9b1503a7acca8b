//! Single-sender broadcast bus and functional-unit output ports.

use crate::{Latch, Tickable};

/// A single-slot broadcast bus with one-cycle latency.
///
/// A message sent during cycle N is observable as traffic during cycle N+1.
/// The slot holds at most one message; a second `send` in the same cycle is
/// dropped (arbitration is the sender's job). Receiving releases the slot
/// for the following cycle.
#[derive(Debug, Clone, Default)]
pub struct Bus<T> {
    slot: Latch<Option<T>>,
}

impl<T: Clone> Bus<T> {
    /// Is a message on the bus this cycle?
    pub fn traffic(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Claim the bus for the coming cycle. No-op if already claimed.
    pub fn send(&mut self, msg: T) {
        let next = self.slot.next_mut();
        if next.is_none() {
            *next = Some(msg);
        }
    }

    /// Read this cycle's message and release the slot. Multiple receivers
    /// in the same cycle all observe the same message.
    pub fn recv(&mut self) -> Option<T> {
        let msg = self.slot.get().clone();
        *self.slot.next_mut() = None;
        msg
    }

    /// Drop any message queued for the next cycle.
    pub fn flush(&mut self) {
        *self.slot.next_mut() = None;
    }
}

impl<T: Clone> Tickable for Bus<T> {
    fn tick(&mut self) {
        self.slot.tick();
    }
}

/// A functional unit's output register: a latched payload plus a pending
/// flag. While pending, the unit refuses new work; the flag clears when the
/// bus arbiter drains the port.
#[derive(Debug, Clone, Default)]
pub struct OutPort<T> {
    data: Latch<T>,
    pending: Latch<bool>,
}

impl<T: Clone> OutPort<T> {
    /// Is a result waiting (or reserved) in this port?
    pub fn pending(&self) -> bool {
        self.pending.read()
    }

    /// Raise or clear the pending flag for the next cycle.
    pub fn pend(&mut self, on: bool) {
        self.pending.set(on);
    }

    /// Latch a payload for the next cycle.
    pub fn write(&mut self, msg: T) {
        self.data.set(msg);
    }

    /// This cycle's payload.
    pub fn read(&self) -> T {
        self.data.get().clone()
    }

    /// Drop the pending reservation.
    pub fn flush(&mut self) {
        self.pending.set(false);
    }
}

impl<T: Clone> Tickable for OutPort<T> {
    fn tick(&mut self) {
        self.data.tick();
        self.pending.tick();
    }
}
