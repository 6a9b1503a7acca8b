//! Operation and format enumerations.

use core::fmt;

/// Instruction encoding format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
    /// Unrecognized encoding.
    #[default]
    N,
}

/// RV32I base integer operations, plus the terminating HALT pattern and a
/// `None` marker for unrecognized encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Opcode {
    #[default]
    None,
    Halt,
    Lui,
    Auipc,
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

impl Opcode {
    #[must_use]
    pub const fn is_load(self) -> bool {
        matches!(self, Self::Lb | Self::Lh | Self::Lw | Self::Lbu | Self::Lhu)
    }

    #[must_use]
    pub const fn is_store(self) -> bool {
        matches!(self, Self::Sb | Self::Sh | Self::Sw)
    }

    /// Load or store: routed through the store/load buffer.
    #[must_use]
    pub const fn is_mem(self) -> bool {
        self.is_load() || self.is_store()
    }

    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Self::Beq | Self::Bne | Self::Blt | Self::Bge | Self::Bltu | Self::Bgeu
        )
    }

    /// Shift ops mask their second operand to 5 bits.
    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(
            self,
            Self::Sll | Self::Srl | Self::Sra | Self::Slli | Self::Srli | Self::Srai
        )
    }

    /// Does the ALU take the immediate as its second operand?
    ///
    /// Covers the upper-immediate ops (0+imm / pc+imm), the immediate ALU
    /// group, JALR's target arithmetic (rs1+imm) and HALT.
    #[must_use]
    pub const fn takes_imm_operand(self) -> bool {
        matches!(
            self,
            Self::Lui
                | Self::Auipc
                | Self::Jalr
                | Self::Halt
                | Self::Addi
                | Self::Slti
                | Self::Sltiu
                | Self::Xori
                | Self::Ori
                | Self::Andi
                | Self::Slli
                | Self::Srli
                | Self::Srai
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Halt => "halt",
            Self::Lui => "lui",
            Self::Auipc => "auipc",
            Self::Jal => "jal",
            Self::Jalr => "jalr",
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blt => "blt",
            Self::Bge => "bge",
            Self::Bltu => "bltu",
            Self::Bgeu => "bgeu",
            Self::Lb => "lb",
            Self::Lh => "lh",
            Self::Lw => "lw",
            Self::Lbu => "lbu",
            Self::Lhu => "lhu",
            Self::Sb => "sb",
            Self::Sh => "sh",
            Self::Sw => "sw",
            Self::Addi => "addi",
            Self::Slti => "slti",
            Self::Sltiu => "sltiu",
            Self::Xori => "xori",
            Self::Ori => "ori",
            Self::Andi => "andi",
            Self::Slli => "slli",
            Self::Srli => "srli",
            Self::Srai => "srai",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Sll => "sll",
            Self::Slt => "slt",
            Self::Sltu => "sltu",
            Self::Xor => "xor",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Or => "or",
            Self::And => "and",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_predicates_partition_the_memory_ops() {
        assert!(Opcode::Lbu.is_load());
        assert!(!Opcode::Lbu.is_store());
        assert!(Opcode::Sh.is_store());
        assert!(Opcode::Sh.is_mem());
        assert!(!Opcode::Add.is_mem());
    }

    #[test]
    fn branch_and_shift_classes() {
        assert!(Opcode::Bgeu.is_branch());
        assert!(!Opcode::Jal.is_branch());
        assert!(Opcode::Srai.is_shift());
        assert!(!Opcode::Addi.is_shift());
    }

    #[test]
    fn register_ops_do_not_take_the_immediate() {
        assert!(Opcode::Addi.takes_imm_operand());
        assert!(Opcode::Jalr.takes_imm_operand());
        assert!(!Opcode::Add.takes_imm_operand());
        assert!(!Opcode::Jal.takes_imm_operand());
    }
}
