//! Instruction decoding.

use crate::bits::{sext, slice};
use crate::opcode::{Format, Opcode};

/// The 32-bit pattern that terminates simulation when committed.
pub const HALT_WORD: u32 = 0x0FF0_0513;

const I_IMM_LEN: u32 = 12;
const S_IMM_LEN: u32 = 12;
const B_IMM_LEN: u32 = 13;
const J_IMM_LEN: u32 = 21;

/// A decoded instruction. Register indices are 5-bit; the immediate is
/// sign-extended to 32 bits according to the format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instruction {
    pub raw: u32,
    pub op: Opcode,
    pub format: Format,
    pub rd: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub imm: u32,
}

fn rd(word: u32) -> u8 {
    slice(word, 7, 12) as u8
}

fn rs1(word: u32) -> u8 {
    slice(word, 15, 20) as u8
}

fn rs2(word: u32) -> u8 {
    slice(word, 20, 25) as u8
}

fn funct3(word: u32) -> u32 {
    slice(word, 12, 15)
}

fn funct7(word: u32) -> u32 {
    slice(word, 25, 32)
}

fn imm_i(word: u32) -> u32 {
    sext(slice(word, 20, 32), I_IMM_LEN)
}

fn imm_s(word: u32) -> u32 {
    let imm = slice(word, 7, 12) | slice(word, 25, 32) << 5;
    sext(imm, S_IMM_LEN)
}

fn imm_b(word: u32) -> u32 {
    let imm = slice(word, 8, 12) << 1
        | slice(word, 25, 31) << 5
        | slice(word, 7, 8) << 11
        | slice(word, 31, 32) << 12;
    sext(imm, B_IMM_LEN)
}

fn imm_u(word: u32) -> u32 {
    slice(word, 12, 32) << 12
}

fn imm_j(word: u32) -> u32 {
    let imm = slice(word, 21, 31) << 1
        | slice(word, 20, 21) << 11
        | slice(word, 12, 20) << 12
        | slice(word, 31, 32) << 20;
    sext(imm, J_IMM_LEN)
}

/// Decode a 32-bit word.
///
/// Unknown major opcodes produce `Opcode::None` with format `N`. The
/// `HALT_WORD` pattern decodes to `Opcode::Halt` no matter what its fields
/// would otherwise mean.
#[must_use]
pub fn decode(word: u32) -> Instruction {
    let mut inst = Instruction {
        raw: word,
        ..Instruction::default()
    };

    if word == HALT_WORD {
        inst.op = Opcode::Halt;
        inst.format = Format::I;
        inst.rd = rd(word);
        inst.rs1 = rs1(word);
        inst.imm = imm_i(word);
        return inst;
    }

    match slice(word, 0, 7) {
        0x37 => {
            inst.op = Opcode::Lui;
            inst.format = Format::U;
            inst.rd = rd(word);
            inst.imm = imm_u(word);
        }
        0x17 => {
            inst.op = Opcode::Auipc;
            inst.format = Format::U;
            inst.rd = rd(word);
            inst.imm = imm_u(word);
        }
        0x6F => {
            inst.op = Opcode::Jal;
            inst.format = Format::J;
            inst.rd = rd(word);
            inst.imm = imm_j(word);
        }
        0x67 => {
            inst.op = Opcode::Jalr;
            inst.format = Format::I;
            inst.rd = rd(word);
            inst.rs1 = rs1(word);
            inst.imm = imm_i(word);
        }
        0x63 => {
            inst.format = Format::B;
            inst.rs1 = rs1(word);
            inst.rs2 = rs2(word);
            inst.imm = imm_b(word);
            inst.op = match funct3(word) {
                0x0 => Opcode::Beq,
                0x1 => Opcode::Bne,
                0x4 => Opcode::Blt,
                0x5 => Opcode::Bge,
                0x6 => Opcode::Bltu,
                0x7 => Opcode::Bgeu,
                _ => Opcode::None,
            };
        }
        0x03 => {
            inst.format = Format::I;
            inst.rd = rd(word);
            inst.rs1 = rs1(word);
            inst.imm = imm_i(word);
            inst.op = match funct3(word) {
                0x0 => Opcode::Lb,
                0x1 => Opcode::Lh,
                0x2 => Opcode::Lw,
                0x4 => Opcode::Lbu,
                0x5 => Opcode::Lhu,
                _ => Opcode::None,
            };
        }
        0x23 => {
            inst.format = Format::S;
            inst.rs1 = rs1(word);
            inst.rs2 = rs2(word);
            inst.imm = imm_s(word);
            inst.op = match funct3(word) {
                0x0 => Opcode::Sb,
                0x1 => Opcode::Sh,
                0x2 => Opcode::Sw,
                _ => Opcode::None,
            };
        }
        0x13 => {
            inst.format = Format::I;
            inst.rd = rd(word);
            inst.rs1 = rs1(word);
            inst.imm = imm_i(word);
            inst.op = match funct3(word) {
                0x0 => Opcode::Addi,
                0x1 => Opcode::Slli,
                0x2 => Opcode::Slti,
                0x3 => Opcode::Sltiu,
                0x4 => Opcode::Xori,
                // Shift-right splits on funct7: arithmetic when nonzero.
                0x5 => {
                    if funct7(word) == 0 {
                        Opcode::Srli
                    } else {
                        Opcode::Srai
                    }
                }
                0x6 => Opcode::Ori,
                _ => Opcode::Andi,
            };
        }
        0x33 => {
            inst.format = Format::R;
            inst.rd = rd(word);
            inst.rs1 = rs1(word);
            inst.rs2 = rs2(word);
            inst.op = match funct3(word) {
                0x0 => {
                    if funct7(word) == 0 {
                        Opcode::Add
                    } else {
                        Opcode::Sub
                    }
                }
                0x1 => Opcode::Sll,
                0x2 => Opcode::Slt,
                0x3 => Opcode::Sltu,
                0x4 => Opcode::Xor,
                0x5 => {
                    if funct7(word) == 0 {
                        Opcode::Srl
                    } else {
                        Opcode::Sra
                    }
                }
                0x6 => Opcode::Or,
                _ => Opcode::And,
            };
        }
        _ => {
            inst.op = Opcode::None;
            inst.format = Format::N;
        }
    }
    inst
}
