//! The RV32 machine: an out-of-order speculative core around a flat RAM.
//!
//! Five logical stages run each cycle in commit → write-result → execute →
//! issue → fetch order, every stage reading current state and writing next
//! state; a terminal tick advances every sequential cell at once. Running
//! the stages newest-result-first makes a result broadcast in cycle N
//! visible to consumers in cycle N+1, except for the explicit in-cycle
//! forwarding the issue stage performs on a freshly built buffer entry.

use rv32i::{adder, decode, eval, slice, Format, Instruction, Opcode, HALT_WORD};
use sim_core::{Bus, Counter, DelayLine, Latch, OutPort, SeqFifo, Tickable};
use tracing::{debug, trace};

use crate::config::MachineConfig;
use crate::loader::{self, LoadError};
use crate::memory::Ram;
use crate::predictor::BranchPredictor;
use crate::regfile::RegFile;
use crate::rob::{ReorderBuffer, RobEntry};
use crate::slb::StoreLoadBuffer;
use crate::station::{BufferEntry, ReservationStation};

/// Depth of the fetched-instruction queue.
const INST_QUEUE_DEPTH: usize = 16;
/// Depth of the CDB send queue (one slot per functional unit is enough).
const SEND_QUEUE_DEPTH: usize = 5;
/// Cycles a memory access spends in its delay line.
const MEM_DELAY: usize = 3;

/// A completed result on its way over the CDB: producing ROB tag, data,
/// and (for stores) the effective address.
#[derive(Debug, Clone, Copy, Default)]
struct CdbMessage {
    tag: u8,
    data: u32,
    addr: u32,
}

/// A committed store draining toward RAM.
#[derive(Debug, Clone, Copy, Default)]
struct StoreSignal {
    op: Opcode,
    data: u32,
    addr: u32,
}

/// A dispatched load waiting out the memory latency.
#[derive(Debug, Clone, Copy, Default)]
struct LoadSignal {
    op: Opcode,
    tag: u8,
    addr: u32,
}

/// A fetched, PC-annotated instruction waiting to issue.
#[derive(Debug, Clone, Copy, Default)]
struct FetchedInst {
    raw: u32,
    pc: u32,
    nex_pc: u32,
    mis_pc: u32,
    predicted: bool,
}

/// Functional-unit ports competing for the CDB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum PortId {
    #[default]
    Alu,
    Store,
    Load,
}

/// The machine.
pub struct Rv32Machine {
    /// Raised when HALT commits; the machine is finished.
    halted: bool,
    /// Raised at commit on a mispredicted branch; consumed by the tick.
    flush_flag: bool,
    /// Squash target recorded alongside `flush_flag`.
    jump_to: u32,
    cycles: u64,
    committed: u64,

    pc: Latch<u32>,
    regs: RegFile,
    ram: Ram,
    predictor: BranchPredictor,

    /// Fetched instructions waiting to issue.
    inst_que: SeqFifo<FetchedInst, INST_QUEUE_DEPTH>,
    rs: ReservationStation,
    slb: StoreLoadBuffer,
    rob: ReorderBuffer,

    /// The common data bus.
    cdb: Bus<CdbMessage>,
    /// Functional-unit output ports.
    alu_out: OutPort<CdbMessage>,
    store_out: OutPort<CdbMessage>,
    load_out: OutPort<CdbMessage>,
    /// Ports that produced a result and wait for CDB arbitration.
    send_que: SeqFifo<PortId, SEND_QUEUE_DEPTH>,

    /// Memory latency on each side of the RAM.
    load_delay: DelayLine<LoadSignal, MEM_DELAY>,
    store_delay: DelayLine<StoreSignal, MEM_DELAY>,
    /// Stores executed but not yet committed; loads wait for zero.
    store_cnt: Counter,
    /// Fetch stall: raised by HALT and JALR, cleared at JALR commit.
    stall: Latch<bool>,
}

impl Rv32Machine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            halted: false,
            flush_flag: false,
            jump_to: 0,
            cycles: 0,
            committed: 0,
            pc: Latch::new(0),
            regs: RegFile::new(),
            ram: Ram::new(config.mem_size),
            predictor: BranchPredictor::new(),
            inst_que: SeqFifo::default(),
            rs: ReservationStation::new(),
            slb: StoreLoadBuffer::new(),
            rob: ReorderBuffer::new(),
            cdb: Bus::default(),
            alu_out: OutPort::default(),
            store_out: OutPort::default(),
            load_out: OutPort::default(),
            send_que: SeqFifo::default(),
            load_delay: DelayLine::new(),
            store_delay: DelayLine::new(),
            store_cnt: Counter::default(),
            stall: Latch::new(false),
        }
    }

    /// Load a hex-dump program image into RAM. Execution starts at 0.
    pub fn load_hex(&mut self, text: &str) -> Result<(), LoadError> {
        loader::load_hex_dump(&mut self.ram, text)
    }

    /// Has HALT committed?
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Cycles simulated so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Instructions committed so far.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// Fraction of correctly predicted branches.
    pub fn prediction_rate(&self) -> f64 {
        self.predictor.success_rate()
    }

    /// Architectural value of a register; `x0` reads zero.
    pub fn register(&self, id: u8) -> u32 {
        self.regs.read(id)
    }

    /// The conventional program result: low byte of `x10`.
    pub fn result(&self) -> u8 {
        (self.regs.read(10) & 0xFF) as u8
    }

    /// Run until HALT commits and return the program result.
    pub fn run(&mut self) -> u8 {
        while !self.halted {
            self.step();
        }
        self.result()
    }

    /// Simulate one cycle.
    pub fn step(&mut self) {
        if self.halted {
            return;
        }
        let retired = self.commit();
        self.write_result();
        self.execute();
        self.issue();
        self.fetch();
        if let Some(op) = retired {
            self.committed += 1;
            if op == Opcode::Halt {
                // Stop before the tick: the halting cycle's next state
                // never becomes architectural.
                debug!(cycle = self.cycles, "halt committed");
                self.halted = true;
                return;
            }
        }
        self.tick();
    }

    /// Retire the ROB head if its result has been written back.
    fn commit(&mut self) -> Option<Opcode> {
        let entry = self.rob.commit()?;
        let op = entry.op;
        trace!(tag = entry.idx, %op, data = entry.data, "commit");

        if op.is_branch() {
            let taken = match op {
                Opcode::Beq => entry.data == 0,
                Opcode::Bne => entry.data != 0,
                Opcode::Blt | Opcode::Bltu => entry.data == 1,
                // BGE/BGEU invert the less-than flag.
                _ => entry.data == 0,
            };
            let mispredicted = taken != entry.predicted;
            self.predictor.feedback(entry.cur_pc, taken, mispredicted);
            if mispredicted {
                debug!(
                    pc = %format_args!("{:#010x}", entry.cur_pc),
                    target = %format_args!("{:#010x}", entry.mis_pc),
                    "mispredicted branch, squashing"
                );
                self.flush_flag = true;
                self.jump_to = entry.mis_pc;
            }
            return Some(op);
        }

        if op.is_store() {
            self.store_cnt.dec();
            self.store_delay.input(StoreSignal {
                op,
                data: entry.data,
                addr: entry.addr,
            });
            return Some(op);
        }

        if op == Opcode::Halt {
            return Some(op);
        }

        let value = if op == Opcode::Jalr {
            // The indirect target is known only now: redirect fetch and
            // lift the stall raised when the JALR was fetched.
            self.pc.set(entry.data & !1);
            self.stall.set(false);
            entry.nex_pc
        } else {
            entry.data
        };
        self.regs.write(entry.dest, value);
        self.regs.release(entry.dest, entry.idx);
        Some(op)
    }

    /// Drain the CDB or grant it to a waiting port, and move data through
    /// the memory delay lines.
    fn write_result(&mut self) {
        if self.cdb.traffic() {
            if let Some(msg) = self.cdb.recv() {
                trace!(tag = msg.tag, data = msg.data, "cdb broadcast");
                self.rob.apply(msg.tag, msg.data, msg.addr);
                self.rs.apply(msg.tag, msg.data);
                self.slb.apply(msg.tag, msg.data);
            }
        } else if let Some(&port) = self.send_que.front() {
            self.send_que.pop();
            let msg = match port {
                PortId::Alu => {
                    self.alu_out.pend(false);
                    self.alu_out.read()
                }
                PortId::Store => {
                    self.store_out.pend(false);
                    self.store_out.read()
                }
                PortId::Load => {
                    self.load_out.pend(false);
                    self.load_out.read()
                }
            };
            self.cdb.send(msg);
        }

        if let Some(sig) = self.store_delay.output() {
            match sig.op {
                Opcode::Sb => self.ram.write_byte(sig.addr, sig.data as u8),
                Opcode::Sh => self.ram.write_half(sig.addr, sig.data as u16),
                _ => self.ram.write_word(sig.addr, sig.data),
            }
        }

        if let Some(sig) = self.load_delay.output() {
            let data = match sig.op {
                Opcode::Lb => rv32i::sext(u32::from(self.ram.read_byte(sig.addr)), 8),
                Opcode::Lh => rv32i::sext(u32::from(self.ram.read_half(sig.addr)), 16),
                Opcode::Lbu => u32::from(self.ram.read_byte(sig.addr)),
                Opcode::Lhu => u32::from(self.ram.read_half(sig.addr)),
                _ => self.ram.read_word(sig.addr),
            };
            self.load_out.write(CdbMessage {
                tag: sig.tag,
                data,
                addr: sig.addr,
            });
            self.send_que.push(PortId::Load);
        }
    }

    /// Dispatch one ready ALU op and one eligible memory op.
    fn execute(&mut self) {
        if !self.alu_out.pending() {
            if let Some(item) = self.rs.take_ready() {
                let a = item.val1;
                let mut b = if item.op.takes_imm_operand() {
                    item.imm
                } else {
                    item.val2
                };
                if item.op.is_shift() {
                    b = slice(b, 0, 5);
                }
                let result = eval(item.op, a, b);
                self.alu_out.write(CdbMessage {
                    tag: item.rob_idx,
                    data: result,
                    addr: 0,
                });
                self.alu_out.pend(true);
                self.send_que.push(PortId::Alu);
            }
        }

        let store_free = !self.store_out.pending();
        let load_free = !self.load_out.pending();
        if let Some(item) = self
            .slb
            .take_ready(store_free, load_free, self.store_cnt.count())
        {
            let addr = adder(item.val1, item.imm);
            if item.op.is_load() {
                self.load_delay.input(LoadSignal {
                    op: item.op,
                    tag: item.rob_idx,
                    addr,
                });
                self.load_out.pend(true);
            } else {
                self.store_cnt.inc();
                self.store_out.write(CdbMessage {
                    tag: item.rob_idx,
                    data: item.val2,
                    addr,
                });
                self.store_out.pend(true);
                self.send_que.push(PortId::Store);
            }
        }
    }

    /// Move the instruction-queue head into the RS or SLB, allocating its
    /// ROB slot and resolving operands through the rename tags.
    fn issue(&mut self) {
        if self.rob.is_full() {
            return;
        }
        let Some(&fetched) = self.inst_que.front() else {
            return;
        };
        let inst = decode(fetched.raw);

        if inst.op.is_mem() {
            if self.slb.is_full() {
                return;
            }
        } else if self.rs.is_full() {
            return;
        }

        self.inst_que.pop();
        if inst.op == Opcode::None {
            // Unknown encodings occupy no pipeline resources.
            return;
        }

        let tag = self.rob.allocate();
        trace!(tag, op = %inst.op, pc = %format_args!("{:#010x}", fetched.pc), "issue");
        let mut item = self.buffer_entry(&inst, &fetched, tag);
        let rob_entry = self.rob_entry(&inst, &fetched, tag);

        // Forward this cycle's CDB traffic into the fresh entry before it
        // lands in a buffer, or the broadcast would be lost on it.
        if self.cdb.traffic() {
            if let Some(msg) = self.cdb.recv() {
                item.apply(msg.tag, msg.data);
            }
        }

        self.rob.issue(tag, rob_entry);
        if inst.op.is_mem() {
            self.slb.issue(item);
        } else {
            self.rs.issue(item);
        }
    }

    /// Resolve a source register to either a value or a pending ROB tag.
    fn resolve(&self, reg: u8) -> (u8, u32) {
        let tag = self.regs.tag(reg);
        if tag == 0 {
            (0, self.regs.read(reg))
        } else if self.rob.ready(tag) {
            // Written back but not yet committed: forward from the ROB.
            (0, self.rob.value(tag))
        } else {
            (tag, 0)
        }
    }

    fn buffer_entry(&self, inst: &Instruction, fetched: &FetchedInst, tag: u8) -> BufferEntry {
        let mut item = BufferEntry {
            rob_idx: tag,
            op: inst.op,
            ..BufferEntry::default()
        };
        match inst.format {
            Format::R | Format::B => {
                (item.src1, item.val1) = self.resolve(inst.rs1);
                (item.src2, item.val2) = self.resolve(inst.rs2);
            }
            Format::U => {
                item.val1 = if inst.op == Opcode::Lui { 0 } else { fetched.pc };
                item.imm = inst.imm;
            }
            Format::J => {
                item.val1 = fetched.pc;
                item.val2 = 4;
            }
            Format::I => {
                (item.src1, item.val1) = self.resolve(inst.rs1);
                item.imm = inst.imm;
            }
            Format::S => {
                (item.src1, item.val1) = self.resolve(inst.rs1);
                (item.src2, item.val2) = self.resolve(inst.rs2);
                item.imm = inst.imm;
            }
            Format::N => {}
        }
        item
    }

    fn rob_entry(&mut self, inst: &Instruction, fetched: &FetchedInst, tag: u8) -> RobEntry {
        let mut dest = 0;
        let writes_back = matches!(inst.format, Format::R | Format::I | Format::J | Format::U)
            && inst.op != Opcode::Halt;
        if writes_back {
            dest = inst.rd;
            self.regs.rename(inst.rd, tag);
        }
        RobEntry {
            idx: tag,
            raw: inst.raw,
            op: inst.op,
            countdown: 1,
            dest,
            data: 0,
            addr: 0,
            cur_pc: fetched.pc,
            nex_pc: fetched.nex_pc,
            mis_pc: fetched.mis_pc,
            predicted: fetched.predicted,
        }
    }

    /// Read the word at PC, predict the next PC, and queue the fetch.
    fn fetch(&mut self) {
        if self.inst_que.is_full() || self.stall.read() {
            return;
        }
        let pc = self.pc.read();
        let raw = self.ram.read_word(pc);
        if raw == HALT_WORD {
            self.stall.set(true);
        }

        let inst = decode(raw);
        if inst.op == Opcode::Jalr {
            // The indirect target cannot be predicted; hold fetch until
            // the JALR commits.
            self.stall.set(true);
        }

        let (taken, mis_taken) = match inst.format {
            Format::B => {
                let predicted = self.predictor.predict(pc);
                (predicted, !predicted)
            }
            Format::J => (true, true),
            _ => (false, false),
        };
        let nex_pc = adder(pc, if taken { inst.imm } else { 4 });
        let mis_pc = adder(pc, if mis_taken { inst.imm } else { 4 });

        trace!(
            pc = %format_args!("{pc:#010x}"),
            raw = %format_args!("{raw:#010x}"),
            taken,
            "fetch"
        );
        self.pc.set(nex_pc);
        self.inst_que.push(FetchedInst {
            raw,
            pc,
            nex_pc,
            mis_pc,
            predicted: taken,
        });
    }

    /// Advance every sequential cell; on a mispredict, squash all
    /// speculative state first.
    fn tick(&mut self) {
        self.cycles += 1;
        if self.flush_flag {
            self.pc.set(self.jump_to);
            self.store_cnt.reset();
            self.rs.clear();
            self.slb.clear();
            self.rob.clear();
            self.regs.clear_tags();
            self.inst_que.clear();
            self.send_que.clear();
            self.cdb.flush();
            self.alu_out.flush();
            self.store_out.flush();
            self.load_out.flush();
            // The store delay line survives: anything in it has already
            // committed and must still reach RAM.
            self.load_delay.flush();
            self.stall.set(false);
            self.flush_flag = false;
        }
        self.store_cnt.tick();
        self.stall.tick();
        self.pc.tick();
        self.regs.tick();
        self.inst_que.tick();
        self.send_que.tick();
        self.rs.tick();
        self.slb.tick();
        self.rob.tick();
        self.cdb.tick();
        self.alu_out.tick();
        self.store_out.tick();
        self.load_out.tick();
        self.load_delay.tick();
        self.store_delay.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with(words: &[u32]) -> Rv32Machine {
        let mut machine = Rv32Machine::new(MachineConfig { mem_size: 4096 });
        for (i, word) in words.iter().enumerate() {
            machine.ram.write_word(i as u32 * 4, *word);
        }
        machine
    }

    #[test]
    fn halt_alone_terminates_with_zero() {
        let mut machine = machine_with(&[HALT_WORD]);
        assert_eq!(machine.run(), 0);
        assert!(machine.halted());
    }

    #[test]
    fn addi_reaches_the_register_file() {
        // addi x10, x0, 10; halt
        let mut machine = machine_with(&[0x00A0_0513, HALT_WORD]);
        assert_eq!(machine.run(), 10);
        assert_eq!(machine.committed(), 2);
    }

    #[test]
    fn writes_to_x0_are_discarded() {
        // addi x0, x0, 7; halt
        let mut machine = machine_with(&[0x0070_0013, HALT_WORD]);
        machine.run();
        assert_eq!(machine.regs.read(0), 0);
    }

    #[test]
    fn dependent_ops_forward_over_the_cdb() {
        // addi x1, x0, 5; addi x2, x1, 6; add x10, x1, x2; halt
        let mut machine = machine_with(&[0x0050_0093, 0x0060_8113, 0x0020_8533, HALT_WORD]);
        assert_eq!(machine.run(), 16);
    }

    #[test]
    fn unknown_words_issue_no_work() {
        // A garbage word between two real instructions.
        let mut machine = machine_with(&[0x0050_0513, 0x0000_0000, HALT_WORD]);
        assert_eq!(machine.run(), 5);
        // Only the addi and the halt commit.
        assert_eq!(machine.committed(), 2);
    }
}
